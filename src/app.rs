//! Top-level plugin: registers every gameplay plugin and pins the system set
//! order for one simulation tick.

use bevy::prelude::*;

use crate::audio::GameAudioPlugin;
use crate::boss::BossPlugin;
use crate::camera::GameCameraPlugin;
use crate::collision::CollisionPlugin;
use crate::effects::EffectsPlugin;
use crate::enemy::EnemyPlugin;
use crate::fireball::FireballPlugin;
use crate::hazard::HazardPlugin;
use crate::input::InputPlugin;
use crate::level::LevelPlugin;
use crate::movement::MovementPlugin;
use crate::npc::NpcPlugin;
use crate::pickup::PickupPlugin;
use crate::platform::PlatformPlugin;
use crate::player::PlayerPlugin;
use crate::props::PropsPlugin;
use crate::state::{toggle_noclip, toggle_pause, DebugSettings, GameSet, GameState, RunOutcome};
use crate::transition::{simulation_running, TransitionPlugin};
use crate::ui::UiPlugin;

pub struct AlienGauntletPlugin;

impl Plugin for AlienGauntletPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .init_resource::<RunOutcome>()
            .init_resource::<DebugSettings>()
            .init_resource::<crate::progression::ProgressionStore>()
            .configure_sets(
                Update,
                (
                    GameSet::Input,
                    GameSet::Movement,
                    GameSet::Platforms,
                    GameSet::Ai,
                    GameSet::Combat,
                    GameSet::Effects,
                )
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            // The transition fade freezes the simulation but input and
            // presentation keep running.
            .configure_sets(
                Update,
                (
                    GameSet::Movement,
                    GameSet::Platforms,
                    GameSet::Ai,
                    GameSet::Combat,
                )
                    .run_if(simulation_running),
            )
            .add_plugins((
                InputPlugin,
                LevelPlugin,
                CollisionPlugin,
                MovementPlugin,
                PlayerPlugin,
                PlatformPlugin,
                EnemyPlugin,
                BossPlugin,
                FireballPlugin,
                PickupPlugin,
                PropsPlugin,
                NpcPlugin,
                HazardPlugin,
            ))
            .add_plugins((
                TransitionPlugin,
                EffectsPlugin,
                GameAudioPlugin,
                GameCameraPlugin,
                UiPlugin,
            ))
            .add_systems(Update, (toggle_pause, toggle_noclip));
    }
}
