//! Audio playback. Handles for every sound effect are loaded once during the first level load;
//! [`PlaySfx`] events become fire-and-forget audio entities that despawn when playback ends.

use std::collections::HashMap;

use bevy::audio::{PlaybackSettings, Volume};
use bevy::prelude::*;

use crate::effects::{PlaySfx, Sfx};
use crate::state::GameState;

pub struct GameAudioPlugin;

impl Plugin for GameAudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AudioHandles>()
            .add_systems(OnEnter(GameState::Loading), load_audio)
            .add_systems(Update, play_sfx);
    }
}

#[derive(Resource, Default)]
pub struct AudioHandles {
    map: HashMap<Sfx, Handle<AudioSource>>,
}

fn load_audio(asset_server: Res<AssetServer>, mut handles: ResMut<AudioHandles>) {
    // Loading fires on every level swap; the handles only need to load once.
    if !handles.map.is_empty() {
        return;
    }

    let sounds = [
        (Sfx::Coin, "audio/coin.ogg"),
        (Sfx::Block, "audio/block.ogg"),
        (Sfx::Walk, "audio/walk.ogg"),
        (Sfx::Jump, "audio/jump.ogg"),
        (Sfx::Stomp, "audio/stomp.ogg"),
        (Sfx::Death, "audio/death.ogg"),
        (Sfx::Spring, "audio/spring.ogg"),
        (Sfx::Fireball, "audio/fireball.ogg"),
        (Sfx::BossWalk, "audio/boss_walk.ogg"),
        (Sfx::BossDeath, "audio/boss_death.ogg"),
        (Sfx::Impact, "audio/impact.ogg"),
        (Sfx::Click, "audio/click.ogg"),
    ];
    for (sfx, path) in sounds {
        handles.map.insert(sfx, asset_server.load(path));
    }
}

fn play_sfx(mut commands: Commands, handles: Res<AudioHandles>, mut events: EventReader<PlaySfx>) {
    for event in events.read() {
        let Some(source) = handles.map.get(&event.sound) else {
            warn!("No audio handle for {:?}; skipping playback.", event.sound);
            continue;
        };
        commands.spawn(AudioBundle {
            source: source.clone(),
            settings: PlaybackSettings::DESPAWN.with_volume(Volume::new(event.volume)),
        });
    }
}
