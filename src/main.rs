//! Application entry point: composes the Bevy runtime, core plugins, and window configuration,
//! then defers to the `AlienGauntletPlugin` defined in `app.rs`.

mod app;
mod audio;
mod boss;
mod camera;
mod collision;
mod cooldown;
mod effects;
mod enemy;
mod fireball;
mod hazard;
mod input;
mod level;
mod movement;
mod npc;
mod pickup;
mod platform;
mod player;
mod progression;
mod props;
mod state;
mod transition;
mod ui;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod wasm;

use app::AlienGauntletPlugin;
use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::render::texture::ImagePlugin;
use bevy::window::{Window, WindowResizeConstraints, WindowResolution};

fn main() {
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    wasm::set_panic_hook();

    // Logical resolution stays at 1280x720 so LDtk's pixel grid maps 1:1 to Bevy world units.
    // Resizing is allowed but constrained so the window cannot collapse to unusable sizes.
    let primary_window = Window {
        title: "Alien Gauntlet".to_string(),
        resolution: WindowResolution::new(1280.0, 720.0),
        resizable: true,
        resize_constraints: WindowResizeConstraints {
            min_width: 640.0,
            min_height: 360.0,
            max_width: f32::INFINITY,
            max_height: f32::INFINITY,
        },
        canvas: cfg!(all(target_arch = "wasm32", feature = "web"))
            .then(|| "#bevy-canvas".to_owned()),
        ..default()
    };

    // Nearest-neighbor sampling keeps the pixel art crisp; asset settings differ between desktop
    // (hot reload on) and web (off).
    let mut default_plugins = DefaultPlugins
        .set(WindowPlugin {
            primary_window: Some(primary_window),
            ..default()
        })
        .set(ImagePlugin::default_nearest());

    #[cfg(not(target_arch = "wasm32"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(true),
            ..default()
        });
    }

    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(false),
            ..default()
        });
    }

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.05, 0.05, 0.12)))
        .add_plugins(default_plugins)
        .add_plugins(AlienGauntletPlugin)
        .run();
}
