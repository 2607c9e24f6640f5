//! Kinematic moving platforms. Each platform shuttles between two endpoints at constant speed and
//! carries the player while they stand on it. Attachment and detachment use explicit tolerance
//! checks every tick, so a rider that walks off or jumps away is released the same tick.

use bevy::prelude::*;

use crate::collision::Collider;
use crate::level::{LevelEntity, LevelLayout, LevelPopulated, LevelSpawnSet, PlatformPath};
use crate::movement::{MovementState, Velocity};
use crate::player::{LifeState, Player};
use crate::state::{GameSet, GameState};

pub const PLATFORM_SIZE: Vec2 = Vec2::new(48.0, 16.0);
const PLATFORM_SPEED: f32 = 30.0;
/// Vertical slack for the feet-on-surface check, in pixels.
const ATTACH_TOLERANCE: f32 = 2.0;
/// A rider drifting further than this from the platform's x span is dropped.
const DETACH_DISTANCE: f32 = 32.0;

pub struct PlatformPlugin;

impl Plugin for PlatformPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Playing),
            spawn_platforms.in_set(LevelSpawnSet),
        )
            .add_systems(
                Update,
                (move_platforms, update_rider)
                    .chain()
                    .in_set(GameSet::Platforms)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformAxis {
    Horizontal,
    Vertical,
}

#[derive(Component, Debug)]
pub struct KinematicPlatform {
    pub start: Vec2,
    pub end: Vec2,
    pub axis: PlatformAxis,
    pub speed: f32,
    /// +1 toward `end`, -1 toward `start`.
    pub direction: f32,
    /// World-space displacement applied this tick; the rider update copies it.
    pub last_delta: Vec2,
}

impl KinematicPlatform {
    pub fn new(path: PlatformPath) -> Self {
        Self {
            start: path.start,
            end: path.end,
            axis: path.axis,
            speed: PLATFORM_SPEED,
            direction: 1.0,
            last_delta: Vec2::ZERO,
        }
    }

    fn span(&self) -> (f32, f32) {
        let (a, b) = match self.axis {
            PlatformAxis::Horizontal => (self.start.x, self.end.x),
            PlatformAxis::Vertical => (self.start.y, self.end.y),
        };
        (a.min(b), a.max(b))
    }

    /// Advances one tick along the active axis, clamping to the endpoints and
    /// reversing on arrival. Returns the applied displacement.
    pub fn step(&mut self, position: &mut Vec2, dt: f32) -> Vec2 {
        let (lo, hi) = self.span();
        let before = *position;

        let coord = match self.axis {
            PlatformAxis::Horizontal => &mut position.x,
            PlatformAxis::Vertical => &mut position.y,
        };
        *coord += self.direction * self.speed * dt;
        if *coord >= hi {
            *coord = hi;
            self.direction = -1.0;
        } else if *coord <= lo {
            *coord = lo;
            self.direction = 1.0;
        }

        self.last_delta = *position - before;
        self.last_delta
    }
}

/// Which platform, if any, the player currently stands on.
#[derive(Component, Default)]
pub struct RidingPlatform(pub Option<Entity>);

/// Whether a falling body's feet can latch onto a platform top this tick.
pub fn can_attach(
    player_pos: Vec2,
    player_half: Vec2,
    player_vy: f32,
    platform_pos: Vec2,
    platform_half: Vec2,
    dt: f32,
) -> bool {
    if player_vy > 0.0 {
        return false;
    }
    let top = platform_pos.y + platform_half.y;
    let bottom = player_pos.y - player_half.y;
    let overlaps_x = (player_pos.x - platform_pos.x).abs() < player_half.x + platform_half.x;

    overlaps_x && bottom >= top - ATTACH_TOLERANCE && bottom + player_vy * dt <= top + ATTACH_TOLERANCE
}

/// Whether a rider is still standing on the platform. Ascent always releases:
/// a jump one tick old can still sit inside the surface tolerance at high tick
/// rates, and re-flushing it would cancel the jump.
pub fn still_riding(
    player_pos: Vec2,
    player_half: Vec2,
    player_vy: f32,
    platform_pos: Vec2,
    platform_half: Vec2,
) -> bool {
    if player_vy > 0.0 {
        return false;
    }
    let top = platform_pos.y + platform_half.y;
    let bottom = player_pos.y - player_half.y;
    (player_pos.x - platform_pos.x).abs() < platform_half.x + player_half.x + DETACH_DISTANCE
        && (bottom - top).abs() <= ATTACH_TOLERANCE * 2.0
}

/// Rider position after a platform tick: carried sideways by the platform's
/// displacement and flushed onto its surface.
pub fn carry_rider(
    player_pos: Vec2,
    player_half: Vec2,
    platform_pos: Vec2,
    platform_half: Vec2,
    delta: Vec2,
) -> Vec2 {
    Vec2::new(
        player_pos.x + delta.x,
        platform_pos.y + platform_half.y + player_half.y,
    )
}

fn spawn_platforms(
    mut commands: Commands,
    layout: Res<LevelLayout>,
    populated: Res<LevelPopulated>,
    asset_server: Res<AssetServer>,
) {
    if populated.0 {
        return;
    }
    for path in &layout.platform_paths {
        commands.spawn((
            Name::new("MovingPlatform"),
            LevelEntity,
            KinematicPlatform::new(*path),
            SpriteBundle {
                texture: asset_server.load("textures/platform.png"),
                sprite: Sprite {
                    custom_size: Some(PLATFORM_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(path.start.extend(5.0)),
                ..default()
            },
            Collider::from_size(PLATFORM_SIZE),
        ));
    }
}

fn move_platforms(time: Res<Time>, mut query: Query<(&mut KinematicPlatform, &mut Transform)>) {
    let dt = time.delta_seconds();
    for (mut platform, mut transform) in &mut query {
        let mut position = transform.translation.truncate();
        platform.step(&mut position, dt);
        transform.translation.x = position.x;
        transform.translation.y = position.y;
    }
}

/// Attaches, carries, and releases the player. Runs after platform motion so
/// the rider is flushed onto the surface after it has moved.
#[allow(clippy::type_complexity)]
fn update_rider(
    time: Res<Time>,
    platforms: Query<(Entity, &Transform, &Collider, &KinematicPlatform), Without<Player>>,
    mut player: Query<
        (
            &mut Transform,
            &mut Velocity,
            &mut MovementState,
            &mut RidingPlatform,
            &Collider,
            &LifeState,
        ),
        With<Player>,
    >,
) {
    let dt = time.delta_seconds();
    let Ok((mut transform, mut velocity, mut state, mut riding, collider, life)) =
        player.get_single_mut()
    else {
        return;
    };

    if !matches!(life, LifeState::Alive) {
        riding.0 = None;
        return;
    }

    let player_half = collider.half_extents;

    // Validate the current ride before carrying.
    if let Some(current) = riding.0 {
        match platforms.get(current) {
            Ok((_, platform_transform, platform_collider, platform)) => {
                let platform_pos = platform_transform.translation.truncate();
                if still_riding(
                    transform.translation.truncate(),
                    player_half,
                    velocity.y,
                    platform_pos,
                    platform_collider.half_extents,
                ) {
                    let carried = carry_rider(
                        transform.translation.truncate(),
                        player_half,
                        platform_pos,
                        platform_collider.half_extents,
                        platform.last_delta,
                    );
                    transform.translation.x = carried.x;
                    transform.translation.y = carried.y;
                    velocity.y = 0.0;
                    state.on_ground = true;
                    state.jumping = false;
                    return;
                }
                riding.0 = None;
            }
            Err(_) => riding.0 = None,
        }
    }

    // Not riding: look for a platform to latch onto.
    for (entity, platform_transform, platform_collider, platform) in &platforms {
        let platform_pos = platform_transform.translation.truncate();
        if can_attach(
            transform.translation.truncate(),
            player_half,
            velocity.y,
            platform_pos,
            platform_collider.half_extents,
            dt,
        ) {
            riding.0 = Some(entity);
            let carried = carry_rider(
                transform.translation.truncate(),
                player_half,
                platform_pos,
                platform_collider.half_extents,
                platform.last_delta,
            );
            transform.translation.x = carried.x;
            transform.translation.y = carried.y;
            velocity.y = 0.0;
            state.on_ground = true;
            state.jumping = false;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizontal_platform() -> KinematicPlatform {
        KinematicPlatform::new(PlatformPath {
            start: Vec2::new(0.0, 0.0),
            end: Vec2::new(60.0, 0.0),
            axis: PlatformAxis::Horizontal,
        })
    }

    #[test]
    fn platform_reverses_at_endpoints_without_overshoot() {
        let mut platform = horizontal_platform();
        let mut position = platform.start;

        // Drive well past the travel time for one leg.
        for _ in 0..300 {
            platform.step(&mut position, 1.0 / 60.0);
            assert!(position.x >= 0.0 && position.x <= 60.0);
        }
        // After 5 seconds at 30 px/s the platform has turned around at least once.
        assert!(platform.direction != 0.0);
    }

    #[test]
    fn step_reports_applied_delta() {
        let mut platform = horizontal_platform();
        let mut position = platform.start;
        let delta = platform.step(&mut position, 0.1);
        assert!((delta.x - 3.0).abs() < 1e-4);
        assert_eq!(delta.y, 0.0);
    }

    #[test]
    fn attach_requires_descent_and_overlap() {
        let platform_pos = Vec2::new(0.0, 0.0);
        let platform_half = PLATFORM_SIZE * 0.5;
        let player_half = Vec2::new(7.0, 8.0);

        // Feet just above the top, falling: attaches.
        let feet_above = Vec2::new(0.0, platform_half.y + player_half.y + 1.0);
        assert!(can_attach(feet_above, player_half, -50.0, platform_pos, platform_half, 1.0 / 60.0));

        // Rising: never attaches.
        assert!(!can_attach(feet_above, player_half, 100.0, platform_pos, platform_half, 1.0 / 60.0));

        // No horizontal overlap: never attaches.
        let off_side = Vec2::new(100.0, platform_half.y + player_half.y + 1.0);
        assert!(!can_attach(off_side, player_half, -50.0, platform_pos, platform_half, 1.0 / 60.0));
    }

    #[test]
    fn rider_released_when_far_from_surface() {
        let platform_pos = Vec2::ZERO;
        let platform_half = PLATFORM_SIZE * 0.5;
        let player_half = Vec2::new(7.0, 8.0);

        let seated = Vec2::new(0.0, platform_half.y + player_half.y);
        assert!(still_riding(seated, player_half, 0.0, platform_pos, platform_half));

        let jumped = seated + Vec2::new(0.0, 20.0);
        assert!(!still_riding(jumped, player_half, 0.0, platform_pos, platform_half));

        let walked_off = seated + Vec2::new(platform_half.x + player_half.x + DETACH_DISTANCE + 1.0, 0.0);
        assert!(!still_riding(walked_off, player_half, 0.0, platform_pos, platform_half));
    }

    #[test]
    fn jump_releases_rider_even_at_high_tick_rates() {
        let platform_pos = Vec2::ZERO;
        let platform_half = PLATFORM_SIZE * 0.5;
        let player_half = Vec2::new(7.0, 8.0);

        // One 120 Hz tick of a 330 px/s jump lifts the rider only 2.75 px,
        // still inside the surface tolerance. The ascent check alone must
        // release, or the flush would cancel the jump.
        let jump_speed = 330.0;
        let one_tick_up = Vec2::new(0.0, platform_half.y + player_half.y + jump_speed / 120.0);
        assert!(!still_riding(one_tick_up, player_half, jump_speed, platform_pos, platform_half));

        // The same position while descending stays attached.
        assert!(still_riding(one_tick_up, player_half, -10.0, platform_pos, platform_half));
    }

    #[test]
    fn carried_rider_follows_sideways_and_stays_flush() {
        let platform_half = PLATFORM_SIZE * 0.5;
        let player_half = Vec2::new(7.0, 8.0);
        let platform_pos = Vec2::new(100.0, 50.0);

        let seated = Vec2::new(102.0, platform_pos.y + platform_half.y + player_half.y + 1.5);
        let carried = carry_rider(seated, player_half, platform_pos, platform_half, Vec2::new(0.5, 0.0));

        // Sideways displacement is copied; the feet are flushed onto the surface.
        assert!((carried.x - 102.5).abs() < 1e-4);
        assert!((carried.y - (platform_pos.y + platform_half.y + player_half.y)).abs() < 1e-4);
    }
}
