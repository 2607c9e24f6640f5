//! Global game state definitions. States are stored by Bevy in a stack; switching states simply
//! updates an enum value and triggers on-enter/on-exit schedules. No heap allocations occur when
//! toggling states.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

/// High-level state machine for the game loop.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum GameState {
    #[default]
    Loading,
    Playing,
    Paused,
    /// Terminal screen for both defeat and victory; [`RunOutcome`] decides the wording.
    GameOver,
}

/// Named system sets that structure one simulation tick. Chained in `app.rs` so
/// input resolution, platform kinematics, AI, and collision resolution always
/// execute in the same order within a frame.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameSet {
    Input,
    Movement,
    Platforms,
    Ai,
    Combat,
    Effects,
}

/// How the current run ended. Read by the game-over screen.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunOutcome {
    #[default]
    Defeat,
    Victory,
}

/// Developer toggles. `noclip` suspends gravity and every damage path for the
/// player; gameplay systems check it instead of sprinkling key reads around.
#[derive(Resource, Debug, Default)]
pub struct DebugSettings {
    pub noclip: bool,
}

/// Toggles between Playing and Paused when `ESC` is pressed. The `State` resource is a read-only
/// snapshot; `NextState` writes the pending transition which Bevy applies at the end of the frame.
pub fn toggle_pause(
    keyboard: Res<ButtonInput<KeyCode>>,
    state: Res<State<GameState>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if !keyboard.just_pressed(KeyCode::Escape) {
        return;
    }

    match state.get() {
        GameState::Playing => next_state.set(GameState::Paused),
        GameState::Paused => next_state.set(GameState::Playing),
        GameState::Loading | GameState::GameOver => {}
    }
}

/// Flips noclip on F3.
pub fn toggle_noclip(keyboard: Res<ButtonInput<KeyCode>>, mut settings: ResMut<DebugSettings>) {
    if keyboard.just_pressed(KeyCode::F3) {
        settings.noclip = !settings.noclip;
        info!("noclip: {}", settings.noclip);
    }
}
