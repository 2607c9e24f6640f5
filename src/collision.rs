//! Tile collision: rebuilds a sparse cell map from the LDtk IntGrid layer and provides the swept
//! AABB resolution shared by the player, enemies, the boss, and projectiles.
//!
//! IntGrid value 1 marks solid ground. Value 2 marks one-way "land" tiles that only collide from
//! above, matching the optional `land` layer of the source maps; a level without them simply has
//! no value-2 cells.

use std::collections::HashMap;

use bevy::math::IVec2;
use bevy::prelude::*;
use bevy_ecs_ldtk::prelude::*;

use crate::level::{LevelAssets, LevelConfig};

pub const SOLID: i32 = 1;
pub const ONE_WAY: i32 = 2;

pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CollisionMap>().add_systems(
            PostUpdate,
            rebuild_collision_map.after(crate::level::sync_level_spatial),
        );
    }
}

/// Axis-aligned half-extents of an entity's collision box.
#[derive(Component, Copy, Clone)]
pub struct Collider {
    pub half_extents: Vec2,
}

impl Collider {
    pub fn from_size(size: Vec2) -> Self {
        Self {
            half_extents: size * 0.5,
        }
    }
}

#[derive(Resource, Default)]
pub struct CollisionMap {
    pub tile_size: Vec2,
    pub origin: Vec2,
    pub cells: HashMap<IVec2, i32>,
}

impl CollisionMap {
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn value_at(&self, tile: IVec2) -> Option<i32> {
        self.cells.get(&tile).copied()
    }

    pub fn is_solid(&self, tile: IVec2) -> bool {
        self.value_at(tile) == Some(SOLID)
    }

    pub fn is_one_way(&self, tile: IVec2) -> bool {
        self.value_at(tile) == Some(ONE_WAY)
    }

    pub fn world_to_tile(&self, point: Vec2) -> IVec2 {
        IVec2::new(
            ((point.x - self.origin.x) / self.tile_size.x).floor() as i32,
            ((point.y - self.origin.y) / self.tile_size.y).floor() as i32,
        )
    }

    /// World-space y of a tile's upper face.
    pub fn tile_top(&self, tile: IVec2) -> f32 {
        self.origin.y + (tile.y + 1) as f32 * self.tile_size.y
    }

    /// Whether a world-space point sits inside walkable ground (solid or one-way).
    /// Used by the enemy ledge probe.
    pub fn has_ground_at(&self, point: Vec2) -> bool {
        let tile = self.world_to_tile(point);
        matches!(self.value_at(tile), Some(SOLID) | Some(ONE_WAY))
    }

    /// Inserts a synthetic solid cell. Hittable blocks register themselves so
    /// the player cannot walk through them.
    pub fn insert_solid(&mut self, tile: IVec2) {
        self.cells.insert(tile, SOLID);
    }
}

/// Which sides a body touched during resolution this tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollisionFlags {
    pub down: bool,
    pub up: bool,
    pub left: bool,
    pub right: bool,
}

/// Overlap test for two centered AABBs.
pub fn aabb_overlap(a_pos: Vec2, a_half: Vec2, b_pos: Vec2, b_half: Vec2) -> bool {
    (a_pos.x - b_pos.x).abs() < a_half.x + b_half.x
        && (a_pos.y - b_pos.y).abs() < a_half.y + b_half.y
}

const SKIN: f32 = 0.001;

/// Moves a body by `velocity * dt`, clipping against the tile map axis by axis.
/// Velocity components are zeroed on contact. One-way tiles block only a body
/// that is falling with its lower bound above the tile's upper face, and only
/// when `use_one_way` is set.
pub fn move_and_collide(
    position: &mut Vec3,
    velocity: &mut Vec2,
    half: Vec2,
    dt: f32,
    map: &CollisionMap,
    use_one_way: bool,
) -> CollisionFlags {
    let mut flags = CollisionFlags::default();
    if map.tile_size.x <= 0.0 || map.tile_size.y <= 0.0 {
        position.x += velocity.x * dt;
        position.y += velocity.y * dt;
        return flags;
    }

    resolve_horizontal(position, &mut velocity.x, half, dt, map, &mut flags);
    resolve_vertical(position, &mut velocity.y, half, dt, map, use_one_way, &mut flags);
    flags
}

fn resolve_horizontal(
    position: &mut Vec3,
    velocity: &mut f32,
    half: Vec2,
    dt: f32,
    map: &CollisionMap,
    flags: &mut CollisionFlags,
) {
    if velocity.abs() < f32::EPSILON {
        return;
    }

    let new_x = position.x + *velocity * dt;
    let dir = velocity.signum();

    let bottom = position.y - half.y + SKIN;
    let top = position.y + half.y - SKIN;

    let tile_size = map.tile_size.x;
    let min_tile_y = ((bottom - map.origin.y) / map.tile_size.y).floor() as i32;
    let max_tile_y = ((top - map.origin.y) / map.tile_size.y).floor() as i32;

    if dir > 0.0 {
        let edge = new_x + half.x;
        let tile_x = ((edge - map.origin.x) / tile_size).floor() as i32;
        for ty in min_tile_y..=max_tile_y {
            if map.is_solid(IVec2::new(tile_x, ty)) {
                let tile_left = map.origin.x + tile_x as f32 * tile_size;
                position.x = tile_left - half.x - SKIN;
                *velocity = 0.0;
                flags.right = true;
                return;
            }
        }
    } else {
        let edge = new_x - half.x;
        let tile_x = ((edge - map.origin.x) / tile_size).floor() as i32;
        for ty in min_tile_y..=max_tile_y {
            if map.is_solid(IVec2::new(tile_x, ty)) {
                let tile_right = map.origin.x + (tile_x + 1) as f32 * tile_size;
                position.x = tile_right + half.x + SKIN;
                *velocity = 0.0;
                flags.left = true;
                return;
            }
        }
    }

    position.x = new_x;
}

#[allow(clippy::too_many_arguments)]
fn resolve_vertical(
    position: &mut Vec3,
    velocity: &mut f32,
    half: Vec2,
    dt: f32,
    map: &CollisionMap,
    use_one_way: bool,
    flags: &mut CollisionFlags,
) {
    if velocity.abs() < f32::EPSILON {
        return;
    }

    let new_y = position.y + *velocity * dt;
    let dir = velocity.signum();
    let left = position.x - half.x + SKIN;
    let right = position.x + half.x - SKIN;
    let min_tile_x = ((left - map.origin.x) / map.tile_size.x).floor() as i32;
    let max_tile_x = ((right - map.origin.x) / map.tile_size.x).floor() as i32;

    if dir < 0.0 {
        let feet_before = position.y - half.y;
        let edge = new_y - half.y;
        let tile_y = ((edge - map.origin.y) / map.tile_size.y).floor() as i32;
        for tx in min_tile_x..=max_tile_x {
            let tile = IVec2::new(tx, tile_y);
            let blocks = map.is_solid(tile)
                || (use_one_way
                    && map.is_one_way(tile)
                    // One-way: only catch a body whose feet started at or above the face.
                    && feet_before >= map.tile_top(tile) - SKIN);
            if blocks {
                position.y = map.tile_top(tile) + half.y + SKIN;
                *velocity = 0.0;
                flags.down = true;
                return;
            }
        }
    } else {
        let edge = new_y + half.y;
        let tile_y = ((edge - map.origin.y) / map.tile_size.y).floor() as i32;
        for tx in min_tile_x..=max_tile_x {
            if map.is_solid(IVec2::new(tx, tile_y)) {
                let tile_bottom = map.origin.y + tile_y as f32 * map.tile_size.y;
                position.y = tile_bottom - half.y - SKIN;
                *velocity = 0.0;
                flags.up = true;
                return;
            }
        }
    }

    position.y = new_y;
}

fn rebuild_collision_map(
    mut events: EventReader<LevelEvent>,
    int_cells: Query<(&GridCoords, &IntGridCell)>,
    config: Res<LevelConfig>,
    level_assets: Res<LevelAssets>,
    mut map: ResMut<CollisionMap>,
) {
    let mut needs_rebuild = false;
    let mut should_clear = false;

    for event in events.read() {
        match event {
            LevelEvent::Spawned(_) => {
                needs_rebuild = true;
            }
            LevelEvent::Despawned(_) => {
                should_clear = true;
            }
            _ => {}
        }
    }

    if should_clear {
        map.clear();
    }

    if !needs_rebuild {
        return;
    }

    map.tile_size = Vec2::splat(config.tile_size);
    map.origin = level_assets.level_origin.unwrap_or(Vec2::ZERO);
    map.cells.clear();

    for (coords, cell) in &int_cells {
        if cell.value <= 0 {
            continue;
        }
        map.cells.insert(IVec2::new(coords.x, coords.y), cell.value);
    }

    if map.cells.is_empty() {
        warn!(
            "Collision map is empty. Ensure the LDtk IntGrid layer marks solid tiles with value 1."
        );
    } else if !map.cells.values().any(|v| *v == ONE_WAY) {
        warn!("No one-way land tiles in this level; continuing without them.");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A 16px-grid map with a floor row at tile y = 0 spanning x in 0..=9 and a
    /// wall column at x = 5 for y in 1..=3.
    pub(crate) fn test_map() -> CollisionMap {
        let mut map = CollisionMap {
            tile_size: Vec2::splat(16.0),
            origin: Vec2::ZERO,
            cells: HashMap::new(),
        };
        for x in 0..10 {
            map.cells.insert(IVec2::new(x, 0), SOLID);
        }
        for y in 1..4 {
            map.cells.insert(IVec2::new(5, y), SOLID);
        }
        map
    }

    #[test]
    fn falling_body_lands_on_floor() {
        let map = test_map();
        let mut pos = Vec3::new(24.0, 40.0, 0.0);
        let mut vel = Vec2::new(0.0, -300.0);
        let half = Vec2::splat(7.0);

        let flags = move_and_collide(&mut pos, &mut vel, half, 0.1, &map, false);
        assert!(flags.down);
        assert_eq!(vel.y, 0.0);
        // Flush on the floor top (y = 16) plus half height.
        assert!((pos.y - (16.0 + half.y)).abs() < 0.01);
    }

    #[test]
    fn wall_stops_horizontal_motion() {
        let map = test_map();
        let mut pos = Vec3::new(40.0, 24.0, 0.0);
        let mut vel = Vec2::new(400.0, 0.0);
        let half = Vec2::splat(7.0);

        let flags = move_and_collide(&mut pos, &mut vel, half, 0.1, &map, false);
        assert!(flags.right);
        assert_eq!(vel.x, 0.0);
        assert!(pos.x <= 80.0 - half.x);
    }

    #[test]
    fn one_way_tile_ignored_from_below() {
        let mut map = test_map();
        map.cells.insert(IVec2::new(2, 2), ONE_WAY);

        // Rising body passes through.
        let mut pos = Vec3::new(40.0, 24.0, 0.0);
        let mut vel = Vec2::new(0.0, 200.0);
        let flags = move_and_collide(&mut pos, &mut vel, Vec2::splat(7.0), 0.1, &map, true);
        assert!(!flags.up);
        assert!(vel.y > 0.0);

        // Falling body from above lands on it.
        let mut pos = Vec3::new(40.0, 60.0, 0.0);
        let mut vel = Vec2::new(0.0, -200.0);
        let flags = move_and_collide(&mut pos, &mut vel, Vec2::splat(7.0), 0.1, &map, true);
        assert!(flags.down);
        assert!((pos.y - (48.0 + 7.0)).abs() < 0.01);
    }

    #[test]
    fn ground_probe_sees_floor() {
        let map = test_map();
        assert!(map.has_ground_at(Vec2::new(24.0, 8.0)));
        assert!(!map.has_ground_at(Vec2::new(24.0, 40.0)));
    }
}
