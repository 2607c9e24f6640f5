//! The keep's boss encounter. The boss sleeps until the player crosses a trigger region, then
//! runs an explicit phase machine: idle/chase on the ground, a committed leap-and-slam attack,
//! a post-slam cooldown, and a defeat animation once its health is exhausted.
//!
//! Every phase is a variant carrying its own elapsed time, advanced by the tick delta. Damage
//! goes through [`Boss::apply_damage`], whose internal guard makes the defeat transition fire
//! exactly once no matter how many projectiles connect.

use bevy::prelude::*;

use crate::collision::{aabb_overlap, Collider, CollisionMap, CollisionFlags, move_and_collide};
use crate::cooldown::{Cooldown, Countdown};
use crate::effects::{BurstKind, CameraShake, PlaySfx, Sfx, SpawnBurst};
use crate::fireball::Fireball;
use crate::level::{LevelEntity, LevelLayout, LevelPopulated, LevelSpawnSet};
use crate::movement::{MovementSettings, Velocity};
use crate::player::{LifeState, Player, PlayerHit};
use crate::state::{DebugSettings, GameSet, GameState, RunOutcome};

pub const BOSS_SIZE: Vec2 = Vec2::new(24.0, 28.0);
pub const BOSS_MAX_HEALTH: i32 = 100;
/// Horizontal distance under which chasing escalates into the leap attack.
const ATTACK_RANGE: f32 = 64.0;
const CHASE_SPEED: f32 = 150.0;
const LEAP_VELOCITY: f32 = 600.0;
const RISE_SECS: f32 = 0.7;
const SLAM_VELOCITY: f32 = -800.0;
const COOLDOWN_SECS: f32 = 2.0;
const DEFEAT_SECS: f32 = 1.0;
const DEFEAT_RISE_SPEED: f32 = 40.0;
const HIT_FLASH_MILLIS: u64 = 100;
const ENCOUNTER_END_MILLIS: u64 = 2000;
const WALK_SFX_MILLIS: u64 = 500;

pub struct BossPlugin;

impl Plugin for BossPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Playing),
            spawn_boss_trigger.in_set(LevelSpawnSet),
        )
            .add_systems(
                Update,
                (check_boss_trigger, update_boss, update_hit_flash, end_encounter)
                    .chain()
                    .in_set(GameSet::Ai)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(
                Update,
                boss_touch_damage
                    .in_set(GameSet::Combat)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BossPhase {
    Idle,
    Chasing,
    /// Leaping toward a horizontal target committed at launch. The player
    /// moving during the rise does not bend the arc.
    AttackRising {
        elapsed: f32,
        start_x: f32,
        target_x: f32,
    },
    AttackFalling,
    Cooldown {
        elapsed: f32,
    },
    Defeated {
        elapsed: f32,
    },
}

#[derive(Component, Debug)]
pub struct Boss {
    pub phase: BossPhase,
    pub health: i32,
    pub max_health: i32,
}

impl Default for Boss {
    fn default() -> Self {
        Self {
            phase: BossPhase::Idle,
            health: BOSS_MAX_HEALTH,
            max_health: BOSS_MAX_HEALTH,
        }
    }
}

impl Boss {
    pub fn defeated(&self) -> bool {
        matches!(self.phase, BossPhase::Defeated { .. })
    }

    /// Applies damage, returning true only on the hit that crosses zero.
    /// Further hits on a defeated boss are swallowed here.
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        if self.defeated() {
            return false;
        }
        self.health = (self.health - amount).max(0);
        if self.health == 0 {
            self.phase = BossPhase::Defeated { elapsed: 0.0 };
            return true;
        }
        false
    }

    /// Horizontal position along the committed leap arc.
    pub fn rise_x(&self) -> Option<f32> {
        match self.phase {
            BossPhase::AttackRising {
                elapsed,
                start_x,
                target_x,
            } => {
                let t = (elapsed / RISE_SECS).clamp(0.0, 1.0);
                Some(start_x + (target_x - start_x) * t)
            }
            _ => None,
        }
    }
}

/// Region entity that wakes the boss when the player enters it.
#[derive(Component)]
pub struct BossTrigger {
    pub region: Rect,
    pub spawn: Vec2,
}

/// Brief red tint after a projectile hit.
#[derive(Component)]
pub struct HitFlash(pub Countdown);

/// Rate limit for the footstep sound while chasing.
#[derive(Component)]
pub struct BossSfx {
    pub walk: Cooldown,
}

/// Countdown between the defeat animation finishing and the victory screen.
#[derive(Resource)]
pub struct EncounterEnd(pub Countdown);

fn spawn_boss_trigger(
    mut commands: Commands,
    layout: Res<LevelLayout>,
    populated: Res<LevelPopulated>,
) {
    if populated.0 {
        return;
    }
    let Some(boss) = layout.boss else {
        return;
    };
    commands.spawn((
        Name::new("BossTrigger"),
        LevelEntity,
        BossTrigger {
            region: boss.trigger,
            spawn: boss.spawn,
        },
        SpatialBundle::default(),
    ));
}

fn check_boss_trigger(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    triggers: Query<(Entity, &BossTrigger)>,
    player: Query<&Transform, With<Player>>,
) {
    let Ok(player_transform) = player.get_single() else {
        return;
    };
    let player_pos = player_transform.translation.truncate();

    for (entity, trigger) in &triggers {
        if !trigger.region.contains(player_pos) {
            continue;
        }
        // One-shot: the trigger entity goes away with the spawn.
        commands.entity(entity).despawn_recursive();
        commands.spawn((
            Name::new("Boss"),
            LevelEntity,
            Boss::default(),
            BossSfx {
                walk: Cooldown::from_millis(WALK_SFX_MILLIS),
            },
            SpriteBundle {
                texture: asset_server.load("textures/boss.png"),
                sprite: Sprite {
                    custom_size: Some(BOSS_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(trigger.spawn.extend(15.0)),
                ..default()
            },
            Velocity::default(),
            Collider::from_size(BOSS_SIZE),
        ));
        info!("Boss encounter started.");
    }
}

#[allow(clippy::type_complexity)]
fn update_boss(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    map: Res<CollisionMap>,
    mut commands: Commands,
    mut sfx: EventWriter<PlaySfx>,
    mut bursts: EventWriter<SpawnBurst>,
    mut shakes: EventWriter<CameraShake>,
    mut bosses: Query<
        (Entity, &mut Boss, &mut BossSfx, &mut Transform, &mut Velocity, &mut Sprite, &Collider),
        Without<Player>,
    >,
    player: Query<&Transform, With<Player>>,
    fireballs: Query<Entity, With<Fireball>>,
) {
    let dt = time.delta_seconds();
    let now = time.elapsed_seconds();

    let Ok((entity, mut boss, mut boss_sfx, mut transform, mut velocity, mut sprite, collider)) =
        bosses.get_single_mut()
    else {
        return;
    };

    let player_x = player
        .get_single()
        .map(|t| t.translation.x)
        .unwrap_or(transform.translation.x);

    match boss.phase.clone() {
        BossPhase::Idle => {
            velocity.x = 0.0;
            let distance = (player_x - transform.translation.x).abs();
            if distance > ATTACK_RANGE {
                boss.phase = BossPhase::Chasing;
            } else {
                start_leap(&mut boss, &mut velocity, transform.translation.x, player_x);
            }
        }
        BossPhase::Chasing => {
            let delta = player_x - transform.translation.x;
            if delta.abs() <= ATTACK_RANGE {
                start_leap(&mut boss, &mut velocity, transform.translation.x, player_x);
            } else {
                velocity.x = delta.signum() * CHASE_SPEED;
                sprite.flip_x = delta < 0.0;
                if boss_sfx.walk.try_fire(now) {
                    sfx.send(PlaySfx::new(Sfx::BossWalk, 0.3));
                }
            }
        }
        BossPhase::AttackRising { elapsed, start_x, target_x } => {
            let elapsed = elapsed + dt;
            boss.phase = if elapsed >= RISE_SECS {
                velocity.y = SLAM_VELOCITY;
                BossPhase::AttackFalling
            } else {
                BossPhase::AttackRising { elapsed, start_x, target_x }
            };
            velocity.x = 0.0;
            if let Some(x) = boss.rise_x() {
                transform.translation.x = x;
            } else {
                transform.translation.x = target_x;
            }
        }
        BossPhase::AttackFalling => {}
        BossPhase::Cooldown { elapsed } => {
            velocity.x = 0.0;
            let elapsed = elapsed + dt;
            boss.phase = if elapsed >= COOLDOWN_SECS {
                BossPhase::Idle
            } else {
                BossPhase::Cooldown { elapsed }
            };
        }
        BossPhase::Defeated { elapsed } => {
            // Rise and fade out, then clear the arena.
            let elapsed = elapsed + dt;
            transform.translation.y += DEFEAT_RISE_SPEED * dt;
            sprite.color = sprite
                .color
                .with_alpha((1.0 - elapsed / DEFEAT_SECS).clamp(0.0, 1.0));
            if elapsed >= DEFEAT_SECS {
                commands.entity(entity).despawn_recursive();
                for fireball in &fireballs {
                    commands.entity(fireball).despawn_recursive();
                }
                commands.insert_resource(EncounterEnd(Countdown::from_millis(
                    ENCOUNTER_END_MILLIS,
                )));
                info!("Boss defeated.");
            } else {
                boss.phase = BossPhase::Defeated { elapsed };
            }
            return;
        }
    }

    // Shared ground integration for the mobile phases. The rise ignores gravity
    // entirely: the arc's vertical leg is the committed leap velocity.
    let rising = matches!(boss.phase, BossPhase::AttackRising { .. });
    let flags = if rising {
        transform.translation.y += velocity.y * dt;
        CollisionFlags::default()
    } else {
        velocity.y -= settings.gravity * dt;
        let mut position = transform.translation;
        let mut vel = velocity.0;
        let flags = move_and_collide(&mut position, &mut vel, collider.half_extents, dt, &map, false);
        velocity.0 = vel;
        transform.translation = position;
        flags
    };

    if matches!(boss.phase, BossPhase::AttackFalling) && flags.down {
        boss.phase = BossPhase::Cooldown { elapsed: 0.0 };
        shakes.send(CameraShake::default());
        sfx.send(PlaySfx::new(Sfx::Impact, 0.5));
        bursts.send(SpawnBurst {
            kind: BurstKind::Impact,
            position: transform.translation.truncate() - Vec2::new(0.0, collider.half_extents.y),
            count: 8,
        });
    }
}

fn start_leap(boss: &mut Boss, velocity: &mut Velocity, boss_x: f32, player_x: f32) {
    boss.phase = BossPhase::AttackRising {
        elapsed: 0.0,
        start_x: boss_x,
        target_x: player_x,
    };
    velocity.x = 0.0;
    velocity.y = LEAP_VELOCITY;
}

fn update_hit_flash(
    time: Res<Time>,
    mut commands: Commands,
    mut query: Query<(Entity, &mut HitFlash, &mut Sprite), With<Boss>>,
) {
    let dt = time.delta_seconds();
    for (entity, mut flash, mut sprite) in &mut query {
        if flash.0.tick(dt) {
            sprite.color = Color::WHITE.with_alpha(sprite.color.alpha());
            commands.entity(entity).remove::<HitFlash>();
        } else {
            sprite.color = Color::srgb(1.0, 0.3, 0.3).with_alpha(sprite.color.alpha());
        }
    }
}

/// Touching a living boss is always lethal contact, never a stomp.
fn boss_touch_damage(
    debug: Res<DebugSettings>,
    bosses: Query<(&Boss, &Transform, &Collider), Without<Player>>,
    player: Query<(&Transform, &Collider, &LifeState), With<Player>>,
    mut hits: EventWriter<PlayerHit>,
) {
    if debug.noclip {
        return;
    }
    let Ok((boss, boss_transform, boss_collider)) = bosses.get_single() else {
        return;
    };
    if boss.defeated() {
        return;
    }
    let Ok((player_transform, player_collider, life)) = player.get_single() else {
        return;
    };
    if !matches!(life, LifeState::Alive) {
        return;
    }

    if aabb_overlap(
        player_transform.translation.truncate(),
        player_collider.half_extents,
        boss_transform.translation.truncate(),
        boss_collider.half_extents,
    ) {
        hits.send(PlayerHit::overlap());
    }
}

fn end_encounter(
    time: Res<Time>,
    mut commands: Commands,
    encounter: Option<ResMut<EncounterEnd>>,
    mut outcome: ResMut<RunOutcome>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(mut encounter) = encounter else {
        return;
    };
    if encounter.0.tick(time.delta_seconds()) {
        commands.remove_resource::<EncounterEnd>();
        *outcome = RunOutcome::Victory;
        next_state.set(GameState::GameOver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_damage_leaves_boss_standing() {
        let mut boss = Boss::default();
        for _ in 0..4 {
            assert!(!boss.apply_damage(10));
        }
        assert_eq!(boss.health, 60);
        assert!(!boss.defeated());
    }

    #[test]
    fn defeat_fires_exactly_once() {
        let mut boss = Boss::default();
        for _ in 0..9 {
            assert!(!boss.apply_damage(10));
        }
        assert!(boss.apply_damage(10));
        assert!(boss.defeated());
        // Stray hits after defeat are swallowed.
        assert!(!boss.apply_damage(10));
        assert_eq!(boss.health, 0);
    }

    #[test]
    fn leap_target_is_committed_at_launch() {
        let mut boss = Boss {
            phase: BossPhase::AttackRising {
                elapsed: 0.35,
                start_x: 0.0,
                target_x: 100.0,
            },
            ..default()
        };
        // Halfway through the rise the boss is halfway to the committed target.
        assert!((boss.rise_x().unwrap() - 50.0).abs() < 0.01);

        // The target inside the phase does not track the player.
        if let BossPhase::AttackRising { target_x, .. } = boss.phase {
            assert_eq!(target_x, 100.0);
        }
        boss.phase = BossPhase::AttackFalling;
        assert!(boss.rise_x().is_none());
    }
}
