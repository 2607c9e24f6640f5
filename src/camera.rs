//! Camera follow and shake. The camera tracks the player with a lerp, clamped to the level
//! bounds; [`CameraShake`] events add a decaying random offset on top of the follow position.

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::effects::CameraShake;
use crate::level::LevelAssets;
use crate::player::Player;
use crate::state::GameState;

const FOLLOW_LERP: f32 = 5.0;

pub struct GameCameraPlugin;

impl Plugin for GameCameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ShakeState>()
            .add_systems(Startup, spawn_camera)
            .add_systems(
                Update,
                (collect_shakes, follow_player)
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Component)]
pub struct FollowCamera;

/// Remaining shake time and strength; refreshed by [`CameraShake`] events.
#[derive(Resource, Default)]
pub struct ShakeState {
    pub remaining: f32,
    pub duration: f32,
    pub intensity: f32,
}

impl ShakeState {
    /// Current offset magnitude, tapering linearly to zero.
    fn amplitude(&self) -> f32 {
        if self.remaining <= 0.0 || self.duration <= 0.0 {
            return 0.0;
        }
        self.intensity * (self.remaining / self.duration)
    }
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn((Camera2dBundle::default(), FollowCamera));
}

fn collect_shakes(mut state: ResMut<ShakeState>, mut events: EventReader<CameraShake>) {
    for shake in events.read() {
        state.remaining = shake.duration.max(state.remaining);
        state.duration = shake.duration;
        state.intensity = shake.intensity.max(state.intensity);
    }
}

#[allow(clippy::type_complexity)]
fn follow_player(
    time: Res<Time>,
    level_assets: Res<LevelAssets>,
    mut shake: ResMut<ShakeState>,
    player: Query<&Transform, (With<Player>, Without<FollowCamera>)>,
    mut camera: Query<
        (&mut Transform, &OrthographicProjection),
        (With<FollowCamera>, Without<Player>),
    >,
) {
    let dt = time.delta_seconds();
    let Ok(player_transform) = player.get_single() else {
        return;
    };
    let Ok((mut camera_transform, projection)) = camera.get_single_mut() else {
        return;
    };

    let mut target = player_transform.translation.truncate();

    // Keep the view inside the level.
    if let (Some(origin), Some(size)) = (level_assets.level_origin, level_assets.level_size) {
        let viewport = projection.area.size();
        let half = viewport * 0.5;
        if size.x > viewport.x {
            target.x = target.x.clamp(origin.x + half.x, origin.x + size.x - half.x);
        } else {
            target.x = origin.x + size.x * 0.5;
        }
        if size.y > viewport.y {
            target.y = target.y.clamp(origin.y + half.y, origin.y + size.y - half.y);
        } else {
            target.y = origin.y + size.y * 0.5;
        }
    }

    let current = camera_transform.translation.truncate();
    let mut position = current.lerp(target, (FOLLOW_LERP * dt).min(1.0));

    if shake.remaining > 0.0 {
        shake.remaining = (shake.remaining - dt).max(0.0);
        let amplitude = shake.amplitude();
        if amplitude > 0.0 {
            let mut rng = SmallRng::from_entropy();
            position += Vec2::new(
                rng.gen_range(-amplitude..amplitude),
                rng.gen_range(-amplitude..amplitude),
            );
        }
        if shake.remaining == 0.0 {
            shake.intensity = 0.0;
        }
    }

    camera_transform.translation.x = position.x;
    camera_transform.translation.y = position.y;
}
