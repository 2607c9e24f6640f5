//! Logical input intents. Raw keyboard state is resolved once per tick into an [`InputIntent`]
//! resource; every other system consumes the intent, never the device. Press events are
//! edge-triggered here so downstream consumers cannot double-handle a key by polling it twice.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

use crate::state::{GameSet, GameState};

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InputIntent>().add_systems(
            Update,
            gather_input
                .in_set(GameSet::Input)
                .run_if(in_state(GameState::Playing)),
        );
    }
}

/// One tick's worth of player intent.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct InputIntent {
    /// -1.0 left, 0.0 rest, 1.0 right.
    pub move_axis: f32,
    /// Edge: jump key went down this tick.
    pub jump_pressed: bool,
    /// Level: jump key is held (drives the jump-cut check).
    pub jump_held: bool,
    pub up_held: bool,
    pub down_held: bool,
    /// Edge: fire key went down this tick.
    pub fire_pressed: bool,
    /// Edge: interact key went down this tick.
    pub interact_pressed: bool,
}

fn gather_input(keyboard: Res<ButtonInput<KeyCode>>, mut intent: ResMut<InputIntent>) {
    let mut axis = 0.0;
    if keyboard.pressed(KeyCode::KeyA) || keyboard.pressed(KeyCode::ArrowLeft) {
        axis -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyD) || keyboard.pressed(KeyCode::ArrowRight) {
        axis += 1.0;
    }

    *intent = InputIntent {
        move_axis: axis,
        jump_pressed: keyboard.just_pressed(KeyCode::Space),
        jump_held: keyboard.pressed(KeyCode::Space),
        up_held: keyboard.pressed(KeyCode::KeyW) || keyboard.pressed(KeyCode::ArrowUp),
        down_held: keyboard.pressed(KeyCode::KeyS) || keyboard.pressed(KeyCode::ArrowDown),
        fire_pressed: keyboard.just_pressed(KeyCode::KeyF),
        interact_pressed: keyboard.just_pressed(KeyCode::KeyE),
    };
}
