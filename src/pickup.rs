//! Coins and keys. Placed coins carry the per-level id that the progression store uses to keep
//! them collected across revisits; coins popped out of blocks use a sentinel id and are never
//! persisted. Collection is overlap-driven and funnels through the store's idempotent recording.

use bevy::prelude::*;

use crate::collision::{aabb_overlap, Collider};
use crate::effects::{PlaySfx, Sfx};
use crate::level::{LevelConfig, LevelEntity, LevelLayout, LevelPopulated, LevelSpawnSet};
use crate::player::{LifeState, Player};
use crate::progression::{KeySlot, ProgressionStore};
use crate::state::{GameSet, GameState};

pub const COIN_SIZE: Vec2 = Vec2::new(10.0, 10.0);
pub const KEY_SIZE: Vec2 = Vec2::new(12.0, 12.0);
/// Id for coins popped out of blocks; they grant currency but are not recorded.
pub const UNTRACKED_COIN: i32 = -1;

pub struct PickupPlugin;

impl Plugin for PickupPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Playing),
            spawn_pickups.in_set(LevelSpawnSet),
        )
            .add_systems(
                Update,
                collect_pickups
                    .in_set(GameSet::Combat)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Component)]
pub struct Coin {
    pub id: i32,
}

#[derive(Component)]
pub struct KeyPickup {
    pub slot: KeySlot,
}

fn spawn_pickups(
    mut commands: Commands,
    layout: Res<LevelLayout>,
    config: Res<LevelConfig>,
    store: Res<ProgressionStore>,
    populated: Res<LevelPopulated>,
    asset_server: Res<AssetServer>,
) {
    if populated.0 {
        return;
    }
    for coin in &layout.coin_spawns {
        // Collected coins stay collected across deaths and revisits.
        if store.is_coin_collected(config.level, coin.id) {
            continue;
        }
        commands.spawn((
            Name::new("Coin"),
            LevelEntity,
            Coin { id: coin.id },
            SpriteBundle {
                texture: asset_server.load("textures/coin.png"),
                sprite: Sprite {
                    custom_size: Some(COIN_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(coin.position.extend(10.0)),
                ..default()
            },
            Collider::from_size(COIN_SIZE),
        ));
    }

    for key in &layout.key_spawns {
        if store.has_key(key.slot) {
            continue;
        }
        commands.spawn((
            Name::new("Key"),
            LevelEntity,
            KeyPickup { slot: key.slot },
            SpriteBundle {
                texture: asset_server.load("textures/key.png"),
                sprite: Sprite {
                    custom_size: Some(KEY_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(key.position.extend(10.0)),
                ..default()
            },
            Collider::from_size(KEY_SIZE),
        ));
    }
}

#[allow(clippy::type_complexity)]
fn collect_pickups(
    mut commands: Commands,
    config: Res<LevelConfig>,
    mut store: ResMut<ProgressionStore>,
    mut sfx: EventWriter<PlaySfx>,
    player: Query<(&Transform, &Collider, &LifeState), With<Player>>,
    coins: Query<(Entity, &Transform, &Collider, &Coin), Without<Player>>,
    keys: Query<(Entity, &Transform, &Collider, &KeyPickup), Without<Player>>,
) {
    let Ok((player_transform, player_collider, life)) = player.get_single() else {
        return;
    };
    if !matches!(life, LifeState::Alive) {
        return;
    }
    let player_pos = player_transform.translation.truncate();
    let player_half = player_collider.half_extents;

    for (entity, transform, collider, coin) in &coins {
        if !aabb_overlap(
            player_pos,
            player_half,
            transform.translation.truncate(),
            collider.half_extents,
        ) {
            continue;
        }
        if coin.id == UNTRACKED_COIN || store.mark_coin_collected(config.level, coin.id) {
            store.add_coin();
            sfx.send(PlaySfx::new(Sfx::Coin, 0.3));
        }
        commands.entity(entity).despawn_recursive();
    }

    for (entity, transform, collider, key) in &keys {
        if !aabb_overlap(
            player_pos,
            player_half,
            transform.translation.truncate(),
            collider.half_extents,
        ) {
            continue;
        }
        store.grant_key(key.slot);
        sfx.send(PlaySfx::new(Sfx::Coin, 0.4));
        commands.entity(entity).despawn_recursive();
    }
}
