//! Patrolling ground enemies. An enemy walks until its wall probe or ledge probe fails, then
//! turns around. Player contact resolves to either a stomp (player's feet near the enemy's head)
//! or a lethal touch, decided by one pure predicate so the two outcomes can never both fire.

use bevy::prelude::*;

use crate::collision::{aabb_overlap, Collider, CollisionMap};
use crate::effects::{DespawnAfter, PlaySfx, Sfx};
use crate::level::{LevelEntity, LevelLayout, LevelPopulated, LevelSpawnSet};
use crate::movement::{MovementState, PhysicsBody, Velocity};
use crate::player::{LifeState, Player, PlayerHit};
use crate::state::{DebugSettings, GameSet, GameState};

pub const ENEMY_SIZE: Vec2 = Vec2::new(14.0, 14.0);
const PATROL_SPEED: f32 = 50.0;
/// Feet-vs-head slack for the stomp check, in pixels.
const STOMP_TOLERANCE: f32 = 10.0;
const STOMP_BOUNCE: f32 = 200.0;
const CORPSE_MILLIS: u64 = 1000;

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Playing),
            spawn_enemies.in_set(LevelSpawnSet),
        )
            .add_systems(
                Update,
                patrol
                    .in_set(GameSet::Ai)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(
                Update,
                resolve_player_contact
                    .in_set(GameSet::Combat)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Component)]
pub struct Enemy {
    pub direction: f32,
    /// Cleared exactly once by a stomp; a dead enemy neither moves nor harms.
    pub alive: bool,
}

impl Default for Enemy {
    fn default() -> Self {
        Self {
            direction: -1.0,
            alive: true,
        }
    }
}

/// How touching an enemy resolves, from the relative heights at contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    Stomp,
    Lethal,
}

pub fn contact_outcome(player_bottom: f32, enemy_top: f32) -> ContactOutcome {
    if player_bottom >= enemy_top - STOMP_TOLERANCE {
        ContactOutcome::Stomp
    } else {
        ContactOutcome::Lethal
    }
}

fn spawn_enemies(
    mut commands: Commands,
    layout: Res<LevelLayout>,
    populated: Res<LevelPopulated>,
    asset_server: Res<AssetServer>,
) {
    if populated.0 {
        return;
    }
    for position in &layout.enemy_spawns {
        commands.spawn((
            Name::new("Enemy"),
            LevelEntity,
            Enemy::default(),
            SpriteBundle {
                texture: asset_server.load("textures/enemy.png"),
                sprite: Sprite {
                    custom_size: Some(ENEMY_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(position.extend(15.0)),
                ..default()
            },
            Velocity::default(),
            MovementState::default(),
            PhysicsBody::default(),
            Collider::from_size(ENEMY_SIZE),
        ));
    }
}

fn patrol(
    map: Res<CollisionMap>,
    mut query: Query<(
        &mut Enemy,
        &mut Velocity,
        &mut Sprite,
        &Transform,
        &Collider,
        &MovementState,
    )>,
) {
    for (mut enemy, mut velocity, mut sprite, transform, collider, state) in &mut query {
        if !enemy.alive {
            velocity.x = 0.0;
            continue;
        }
        if !state.on_ground {
            continue;
        }

        let position = transform.translation.truncate();
        let half = collider.half_extents;
        let ahead_x = position.x + enemy.direction * (half.x + 2.0);

        let wall_ahead = map.is_solid(map.world_to_tile(Vec2::new(ahead_x, position.y)));
        let ground_ahead = map.has_ground_at(Vec2::new(ahead_x, position.y - half.y - 2.0));

        if wall_ahead || !ground_ahead {
            enemy.direction = -enemy.direction;
        }

        velocity.x = enemy.direction * PATROL_SPEED;
        sprite.flip_x = enemy.direction > 0.0;
    }
}

/// Single authority over player/enemy contact. A stomp flips `alive` before any
/// further overlap can be read, so one touch yields exactly one outcome.
#[allow(clippy::type_complexity)]
fn resolve_player_contact(
    mut commands: Commands,
    debug: Res<DebugSettings>,
    mut sfx: EventWriter<PlaySfx>,
    mut hits: EventWriter<PlayerHit>,
    mut player: Query<
        (&Transform, &Collider, &mut Velocity, &LifeState),
        (With<Player>, Without<Enemy>),
    >,
    mut enemies: Query<(Entity, &Transform, &Collider, &mut Enemy, &mut Velocity, &mut Sprite)>,
) {
    if debug.noclip {
        return;
    }
    let Ok((player_transform, player_collider, mut player_velocity, life)) =
        player.get_single_mut()
    else {
        return;
    };
    if !matches!(life, LifeState::Alive) {
        return;
    }

    let player_pos = player_transform.translation.truncate();
    let player_half = player_collider.half_extents;
    let player_bottom = player_pos.y - player_half.y;

    for (entity, transform, collider, mut enemy, mut velocity, mut sprite) in &mut enemies {
        if !enemy.alive {
            continue;
        }
        let enemy_pos = transform.translation.truncate();
        if !aabb_overlap(player_pos, player_half, enemy_pos, collider.half_extents) {
            continue;
        }

        match contact_outcome(player_bottom, enemy_pos.y + collider.half_extents.y) {
            ContactOutcome::Stomp => {
                enemy.alive = false;
                velocity.0 = Vec2::ZERO;
                sprite.color = Color::srgb(1.0, 0.4, 0.4);
                sprite.flip_y = true;
                commands
                    .entity(entity)
                    .remove::<PhysicsBody>()
                    .insert(DespawnAfter::from_millis(CORPSE_MILLIS));
                player_velocity.y = STOMP_BOUNCE;
                sfx.send(PlaySfx::new(Sfx::Stomp, 0.4));
            }
            ContactOutcome::Lethal => {
                hits.send(PlayerHit::overlap());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feet_at_head_height_is_a_stomp() {
        assert_eq!(contact_outcome(100.0, 100.0), ContactOutcome::Stomp);
        assert_eq!(contact_outcome(95.0, 100.0), ContactOutcome::Stomp);
    }

    #[test]
    fn feet_below_tolerance_is_lethal() {
        assert_eq!(contact_outcome(89.0, 100.0), ContactOutcome::Lethal);
        assert_eq!(contact_outcome(50.0, 100.0), ContactOutcome::Lethal);
    }

    #[test]
    fn tolerance_boundary_favours_the_stomp() {
        assert_eq!(contact_outcome(90.0, 100.0), ContactOutcome::Stomp);
    }
}
