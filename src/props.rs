//! Level props: springs that launch the player after a short compression, and hittable blocks
//! that pop a reward when bumped from below. Blocks register themselves as solid cells in the
//! collision map, so the tile resolver handles walking on and bonking into them; the prop system
//! only detects the bonk and pops the reward once.

use bevy::prelude::*;

use crate::collision::{Collider, CollisionMap};
use crate::cooldown::Countdown;
use crate::effects::{PlaySfx, Sfx};
use crate::level::{BlockReward, LevelEntity, LevelLayout, LevelPopulated, LevelSpawnSet};
use crate::movement::{MovementState, PhysicsBody, Velocity};
use crate::pickup::{Coin, KeyPickup, COIN_SIZE, KEY_SIZE, UNTRACKED_COIN};
use crate::player::{LifeState, Player};
use crate::state::{GameSet, GameState};

pub const SPRING_SIZE: Vec2 = Vec2::new(16.0, 12.0);
pub const BLOCK_SIZE: Vec2 = Vec2::new(16.0, 16.0);
const SPRING_LAUNCH: f32 = 500.0;
const COMPRESS_MILLIS: u64 = 50;
const RECOVER_MILLIS: u64 = 300;
/// How far the reward pops above the block.
const POP_OFFSET: f32 = 18.0;
const POP_VELOCITY: f32 = 120.0;

pub struct PropsPlugin;

impl Plugin for PropsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Playing),
            spawn_props.in_set(LevelSpawnSet),
        )
            .add_systems(
                Update,
                (register_block_tiles, update_springs, bump_blocks)
                    .in_set(GameSet::Combat)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Debug, Clone)]
pub enum SpringPhase {
    Ready,
    /// Squashed under the player; launches when the delay runs out.
    Compressed(Countdown),
    Recovering(Countdown),
}

#[derive(Component)]
pub struct Spring {
    pub phase: SpringPhase,
}

#[derive(Component)]
pub struct Block {
    pub reward: BlockReward,
    /// Set on the first bump; a spent block is inert scenery.
    pub spent: bool,
}

fn spawn_props(
    mut commands: Commands,
    layout: Res<LevelLayout>,
    populated: Res<LevelPopulated>,
    asset_server: Res<AssetServer>,
) {
    if populated.0 {
        return;
    }
    for position in &layout.spring_spawns {
        commands.spawn((
            Name::new("Spring"),
            LevelEntity,
            Spring {
                phase: SpringPhase::Ready,
            },
            SpriteBundle {
                texture: asset_server.load("textures/spring.png"),
                sprite: Sprite {
                    custom_size: Some(SPRING_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(position.extend(8.0)),
                ..default()
            },
            Collider::from_size(SPRING_SIZE),
        ));
    }

    for block in &layout.block_spawns {
        commands.spawn((
            Name::new("Block"),
            LevelEntity,
            Block {
                reward: block.reward,
                spent: false,
            },
            SpriteBundle {
                texture: asset_server.load("textures/block.png"),
                sprite: Sprite {
                    custom_size: Some(BLOCK_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(block.position.extend(8.0)),
                ..default()
            },
            Collider::from_size(BLOCK_SIZE),
        ));
    }
}

/// Blocks occupy a tile in the collision map so the resolver treats them as
/// ground and ceiling. The insert is idempotent and re-applied every tick
/// because the map is rebuilt whenever a level spawns.
fn register_block_tiles(mut map: ResMut<CollisionMap>, blocks: Query<&Transform, With<Block>>) {
    if map.tile_size.x <= 0.0 {
        return;
    }
    for transform in &blocks {
        let tile = map.world_to_tile(transform.translation.truncate());
        if !map.is_solid(tile) {
            map.insert_solid(tile);
        }
    }
}

/// Whether descending feet pressed the pad band this tick. The feet are swept
/// back along the descent before comparing: a terminal-velocity fall steps
/// further than the band is tall, so the post-integration position alone can
/// miss the press entirely.
fn spring_pressed(feet: f32, descent: f32, dt: f32, pad_top: f32, pad_mid: f32) -> bool {
    if descent < 0.0 {
        return false;
    }
    let feet_before = feet + descent * dt;
    feet <= pad_top + 2.0 && feet_before >= pad_mid
}

#[allow(clippy::type_complexity)]
fn update_springs(
    time: Res<Time>,
    mut sfx: EventWriter<PlaySfx>,
    mut springs: Query<(&Transform, &Collider, &mut Spring, &mut Sprite), Without<Player>>,
    mut player: Query<
        (&Transform, &Collider, &mut Velocity, &MovementState, &LifeState),
        With<Player>,
    >,
) {
    let dt = time.delta_seconds();
    let Ok((player_transform, player_collider, mut velocity, state, life)) =
        player.get_single_mut()
    else {
        return;
    };
    let alive = matches!(life, LifeState::Alive);
    let player_pos = player_transform.translation.truncate();
    let player_half = player_collider.half_extents;
    // Landing zeroes the velocity before this system runs; the recorded impact
    // speed recovers how fast the feet actually came down.
    let descent = (-velocity.y).max(state.impact_speed);

    for (transform, collider, mut spring, mut sprite) in &mut springs {
        let spring_pos = transform.translation.truncate();
        let top = spring_pos.y + collider.half_extents.y;
        let feet = player_pos.y - player_half.y;
        let pressed = alive
            && velocity.y <= 0.0
            && (player_pos.x - spring_pos.x).abs() < player_half.x + collider.half_extents.x
            && spring_pressed(feet, descent, dt, top, spring_pos.y);

        match &mut spring.phase {
            SpringPhase::Ready => {
                if pressed {
                    spring.phase = SpringPhase::Compressed(Countdown::from_millis(COMPRESS_MILLIS));
                    sprite.flip_y = true;
                }
            }
            SpringPhase::Compressed(delay) => {
                if delay.tick(dt) {
                    if alive {
                        velocity.y = SPRING_LAUNCH;
                        sfx.send(PlaySfx::new(Sfx::Spring, 0.4));
                    }
                    spring.phase = SpringPhase::Recovering(Countdown::from_millis(RECOVER_MILLIS));
                }
            }
            SpringPhase::Recovering(delay) => {
                if delay.tick(dt) {
                    spring.phase = SpringPhase::Ready;
                    sprite.flip_y = false;
                }
            }
        }
    }
}

/// Pops a block's reward when the player's head hits its underside.
#[allow(clippy::type_complexity)]
fn bump_blocks(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut sfx: EventWriter<PlaySfx>,
    mut blocks: Query<(&Transform, &Collider, &mut Block, &mut Sprite), Without<Player>>,
    player: Query<(&Transform, &Collider, &MovementState, &LifeState), With<Player>>,
) {
    let Ok((player_transform, player_collider, state, life)) = player.get_single() else {
        return;
    };
    // The resolver zeroes upward velocity on ceiling contact, so the bump is
    // detected from the contact flag rather than the velocity.
    if !matches!(life, LifeState::Alive) || !state.hit_head {
        return;
    }

    let player_pos = player_transform.translation.truncate();
    let player_half = player_collider.half_extents;
    let head = player_pos.y + player_half.y;

    for (transform, collider, mut block, mut sprite) in &mut blocks {
        if block.spent {
            continue;
        }
        let block_pos = transform.translation.truncate();
        let bottom = block_pos.y - collider.half_extents.y;
        let hit = (player_pos.x - block_pos.x).abs() < player_half.x + collider.half_extents.x
            && head >= bottom - 2.0
            && head <= block_pos.y;
        if !hit {
            continue;
        }

        block.spent = true;
        sprite.color = Color::srgb(0.5, 0.5, 0.5);
        sfx.send(PlaySfx::new(Sfx::Block, 0.4));

        let pop_position = block_pos + Vec2::new(0.0, POP_OFFSET);
        match block.reward {
            BlockReward::Coin => {
                commands.spawn((
                    Name::new("PoppedCoin"),
                    LevelEntity,
                    Coin { id: UNTRACKED_COIN },
                    SpriteBundle {
                        texture: asset_server.load("textures/coin.png"),
                        sprite: Sprite {
                            custom_size: Some(COIN_SIZE),
                            ..default()
                        },
                        transform: Transform::from_translation(pop_position.extend(10.0)),
                        ..default()
                    },
                    Collider::from_size(COIN_SIZE),
                    Velocity(Vec2::new(0.0, POP_VELOCITY)),
                    PhysicsBody::default(),
                ));
            }
            BlockReward::Key(slot) => {
                commands.spawn((
                    Name::new("PoppedKey"),
                    LevelEntity,
                    KeyPickup { slot },
                    SpriteBundle {
                        texture: asset_server.load("textures/key.png"),
                        sprite: Sprite {
                            custom_size: Some(KEY_SIZE),
                            ..default()
                        },
                        transform: Transform::from_translation(pop_position.extend(10.0)),
                        ..default()
                    },
                    Collider::from_size(KEY_SIZE),
                    Velocity(Vec2::new(0.0, POP_VELOCITY)),
                    PhysicsBody::default(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Pad geometry: a spring centered at y = 6 with the standard size, so the
    // midline sits at 6 and the top at 12.
    const PAD_MID: f32 = 6.0;
    const PAD_TOP: f32 = 12.0;

    #[test]
    fn slow_fall_presses_inside_the_band() {
        // Feet sampled inside the band while descending at 100 px/s.
        assert!(spring_pressed(PAD_TOP - 1.0, 100.0, 1.0 / 60.0, PAD_TOP, PAD_MID));
    }

    #[test]
    fn terminal_fall_presses_even_when_it_steps_past_the_band() {
        // At 400 px/s and a 30 Hz tick the feet move 13.3 px, more than the
        // band is tall: the post-tick sample lands below the midline and only
        // the swept check catches the press.
        let dt = 1.0 / 30.0;
        let feet_after = PAD_TOP + 5.0 - 400.0 * dt;
        assert!(feet_after < PAD_MID);
        assert!(spring_pressed(feet_after, 400.0, dt, PAD_TOP, PAD_MID));
    }

    #[test]
    fn rising_feet_never_press() {
        assert!(!spring_pressed(PAD_TOP - 1.0, -300.0, 1.0 / 60.0, PAD_TOP, PAD_MID));
    }

    #[test]
    fn standing_beside_the_pad_does_not_press() {
        // Feet resting on the ground at the pad's base, with only the residual
        // one-tick gravity speed: the sweep stays below the midline.
        let base = PAD_TOP - SPRING_SIZE.y;
        assert!(!spring_pressed(base, 13.3, 1.0 / 60.0, PAD_TOP, PAD_MID));
    }
}
