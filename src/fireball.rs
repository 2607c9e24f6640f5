//! Fireball projectiles. Firing costs one coin and is rate limited; the cooldown is checked
//! before the coin is spent, so a blocked shot never drains the purse. Each fireball runs its own
//! bouncing integration (restitution on ground contact, capped bounce count, hard lifetime) and
//! despawns on the first terminal condition it meets each tick.

use bevy::prelude::*;

use crate::boss::{Boss, HitFlash};
use crate::collision::{aabb_overlap, Collider, CollisionMap, move_and_collide};
use crate::cooldown::{Cooldown, Countdown};
use crate::effects::{PlaySfx, Sfx};
use crate::level::LevelEntity;
use crate::movement::{Facing, Velocity};
use crate::player::{LifeState, Player};
use crate::progression::ProgressionStore;
use crate::state::{GameSet, GameState};

pub const FIREBALL_SIZE: Vec2 = Vec2::new(8.0, 8.0);
const FIRE_COOLDOWN_MILLIS: u64 = 500;
const LAUNCH_SPEED_X: f32 = 400.0;
const LAUNCH_SPEED_Y: f32 = 200.0;
const FIREBALL_GRAVITY: f32 = 400.0;
const RESTITUTION: f32 = 0.6;
const MAX_BOUNCES: u8 = 3;
const LIFETIME_SECS: f32 = 5.0;
const SPIN_RADIANS: f32 = 10.0;
const HIT_DAMAGE: i32 = 10;
const HIT_FLASH_MILLIS: u64 = 100;

pub struct FireballPlugin;

impl Plugin for FireballPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FireballCooldown>().add_systems(
            Update,
            (spawn_fireballs, update_fireballs)
                .chain()
                .in_set(GameSet::Combat)
                .run_if(in_state(GameState::Playing)),
        );
    }
}

#[derive(Component)]
pub struct Fireball {
    pub bounces: u8,
    pub age: f32,
    /// Visual spin, radians per second.
    pub spin: f32,
}

#[derive(Resource)]
pub struct FireballCooldown(pub Cooldown);

impl Default for FireballCooldown {
    fn default() -> Self {
        Self(Cooldown::from_millis(FIRE_COOLDOWN_MILLIS))
    }
}

/// Gate sequence for a shot: rate limit first, purse second. Returns true when
/// a fireball should spawn; the coin is only spent on that path.
pub fn try_fire(cooldown: &mut Cooldown, store: &mut ProgressionStore, now: f32) -> bool {
    if !cooldown.ready(now) {
        return false;
    }
    if !store.try_spend_coin() {
        // Broke: silent no-op, the cooldown is not consumed either.
        return false;
    }
    cooldown.fire(now);
    true
}

#[allow(clippy::type_complexity)]
fn spawn_fireballs(
    time: Res<Time>,
    intent: Res<crate::input::InputIntent>,
    mut cooldown: ResMut<FireballCooldown>,
    mut store: ResMut<ProgressionStore>,
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut sfx: EventWriter<PlaySfx>,
    player: Query<(&Transform, &Facing, &LifeState), With<Player>>,
    bosses: Query<&Boss>,
) {
    if !intent.fire_pressed {
        return;
    }
    let Ok((transform, facing, life)) = player.get_single() else {
        return;
    };
    if !matches!(life, LifeState::Alive) {
        return;
    }
    // No firing during the victory animation.
    if bosses.get_single().map(|b| b.defeated()).unwrap_or(false) {
        return;
    }
    if !try_fire(&mut cooldown.0, &mut store, time.elapsed_seconds()) {
        return;
    }

    commands.spawn((
        Name::new("Fireball"),
        LevelEntity,
        Fireball {
            bounces: 0,
            age: 0.0,
            spin: SPIN_RADIANS * facing.0,
        },
        SpriteBundle {
            texture: asset_server.load("textures/fireball.png"),
            sprite: Sprite {
                custom_size: Some(FIREBALL_SIZE),
                ..default()
            },
            transform: Transform::from_translation(
                (transform.translation.truncate() + Vec2::new(facing.0 * 10.0, 0.0)).extend(18.0),
            ),
            ..default()
        },
        Velocity(Vec2::new(facing.0 * LAUNCH_SPEED_X, LAUNCH_SPEED_Y)),
        Collider::from_size(FIREBALL_SIZE),
    ));
    sfx.send(PlaySfx::new(Sfx::Fireball, 0.3));
}

/// Applies an age threshold, then ground-bounce counting, to a fireball's tick.
/// Returns true when the projectile should despawn.
pub fn tick_fireball(fireball: &mut Fireball, dt: f32, landed: bool) -> bool {
    fireball.age += dt;
    if fireball.age >= LIFETIME_SECS {
        return true;
    }
    if landed {
        fireball.bounces += 1;
        if fireball.bounces >= MAX_BOUNCES {
            return true;
        }
    }
    false
}

#[allow(clippy::type_complexity)]
fn update_fireballs(
    time: Res<Time>,
    map: Res<CollisionMap>,
    mut commands: Commands,
    mut sfx: EventWriter<PlaySfx>,
    mut fireballs: Query<
        (Entity, &mut Fireball, &mut Transform, &mut Velocity, &Collider),
        Without<Boss>,
    >,
    mut bosses: Query<(Entity, &mut Boss, &Transform, &Collider, &mut Velocity), Without<Fireball>>,
) {
    let dt = time.delta_seconds();

    for (entity, mut fireball, mut transform, mut velocity, collider) in &mut fireballs {
        velocity.y -= FIREBALL_GRAVITY * dt;

        let mut position = transform.translation;
        let mut vel = velocity.0;
        let pre_impact = velocity.0;
        let flags = move_and_collide(&mut position, &mut vel, collider.half_extents, dt, &map, false);

        // Restitution: the resolver zeroes the contact component, restore a
        // damped reflection from the pre-impact velocity.
        if flags.down {
            vel.y = pre_impact.y.abs() * RESTITUTION;
        }
        if flags.left || flags.right {
            // Side ricochets are damped but never counted as bounces.
            vel.x = -pre_impact.x * RESTITUTION;
        }
        velocity.0 = vel;
        transform.translation = position;
        transform.rotate_z(fireball.spin * dt);

        if tick_fireball(&mut fireball, dt, flags.down) {
            commands.entity(entity).despawn_recursive();
            continue;
        }

        if let Ok((boss_entity, mut boss, boss_transform, boss_collider, mut boss_velocity)) =
            bosses.get_single_mut()
        {
            if boss.defeated() {
                continue;
            }
            if aabb_overlap(
                transform.translation.truncate(),
                collider.half_extents,
                boss_transform.translation.truncate(),
                boss_collider.half_extents,
            ) {
                if boss.apply_damage(HIT_DAMAGE) {
                    boss_velocity.0 = Vec2::ZERO;
                    sfx.send(PlaySfx::new(Sfx::BossDeath, 0.5));
                } else {
                    commands
                        .entity(boss_entity)
                        .insert(HitFlash(Countdown::from_millis(HIT_FLASH_MILLIS)));
                }
                commands.entity(entity).despawn_recursive();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::ProgressionStore;

    fn fresh() -> Fireball {
        Fireball {
            bounces: 0,
            age: 0.0,
            spin: SPIN_RADIANS,
        }
    }

    #[test]
    fn third_ground_bounce_destroys() {
        let mut fireball = fresh();
        assert!(!tick_fireball(&mut fireball, 0.016, true));
        assert!(!tick_fireball(&mut fireball, 0.016, true));
        assert!(tick_fireball(&mut fireball, 0.016, true));
        assert_eq!(fireball.bounces, 3);
    }

    #[test]
    fn airborne_ticks_do_not_count_bounces() {
        let mut fireball = fresh();
        for _ in 0..100 {
            assert!(!tick_fireball(&mut fireball, 0.016, false));
        }
        assert_eq!(fireball.bounces, 0);
    }

    #[test]
    fn lifetime_expiry_destroys_regardless_of_bounces() {
        let mut fireball = fresh();
        assert!(tick_fireball(&mut fireball, LIFETIME_SECS, false));
    }

    #[test]
    fn firing_spends_one_coin_only_when_ready() {
        let mut store = ProgressionStore::new_game();
        store.add_coin();
        store.add_coin();
        let mut cooldown = Cooldown::from_millis(FIRE_COOLDOWN_MILLIS);

        assert!(try_fire(&mut cooldown, &mut store, 0.0));
        assert_eq!(store.coins(), 1);

        // Inside the rate limit: no shot, no coin.
        assert!(!try_fire(&mut cooldown, &mut store, 0.1));
        assert_eq!(store.coins(), 1);

        assert!(try_fire(&mut cooldown, &mut store, 0.6));
        assert_eq!(store.coins(), 0);

        // Broke: no shot, and the cooldown window is not restarted.
        assert!(!try_fire(&mut cooldown, &mut store, 1.2));
        assert_eq!(store.coins(), 0);
    }
}
