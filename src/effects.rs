//! Presentation events and small visual effects. Gameplay systems emit [`PlaySfx`],
//! [`SpawnBurst`], and [`CameraShake`] events; the systems here (and in the audio and camera
//! modules) turn them into sounds, particles, and shake offsets. Gameplay never touches the
//! presentation layer directly.

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::cooldown::Countdown;
use crate::level::LevelEntity;
use crate::state::{GameSet, GameState};

pub struct EffectsPlugin;

impl Plugin for EffectsPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PlaySfx>()
            .add_event::<SpawnBurst>()
            .add_event::<CameraShake>()
            .add_systems(
                Update,
                (spawn_bursts, update_particles, tick_despawns)
                    .in_set(GameSet::Effects)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Every sound effect in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sfx {
    Coin,
    Block,
    Walk,
    Jump,
    Stomp,
    Death,
    Spring,
    Fireball,
    BossWalk,
    BossDeath,
    Impact,
    Click,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct PlaySfx {
    pub sound: Sfx,
    pub volume: f32,
}

impl PlaySfx {
    pub fn new(sound: Sfx, volume: f32) -> Self {
        Self { sound, volume }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstKind {
    /// Small grey puffs under a running player's heels.
    Dust,
    /// The debris ring of the boss slam.
    Impact,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct SpawnBurst {
    pub kind: BurstKind,
    pub position: Vec2,
    pub count: u32,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct CameraShake {
    pub duration: f32,
    pub intensity: f32,
}

impl Default for CameraShake {
    fn default() -> Self {
        Self {
            duration: 0.3,
            intensity: 4.0,
        }
    }
}

/// Short-lived cosmetic quad.
#[derive(Component)]
pub struct Particle {
    pub velocity: Vec2,
    pub life: Countdown,
}

/// Removes the entity when the countdown elapses. Used for enemy corpses and
/// anything else that lingers briefly.
#[derive(Component)]
pub struct DespawnAfter(pub Countdown);

impl DespawnAfter {
    pub fn from_millis(ms: u64) -> Self {
        Self(Countdown::from_millis(ms))
    }
}

fn spawn_bursts(mut commands: Commands, mut bursts: EventReader<SpawnBurst>) {
    let mut rng = SmallRng::from_entropy();

    for burst in bursts.read() {
        let (size, color, speed, life_ms) = match burst.kind {
            BurstKind::Dust => (3.0, Color::srgba(0.8, 0.8, 0.7, 0.8), 20.0, 300),
            BurstKind::Impact => (4.0, Color::srgba(0.9, 0.6, 0.3, 0.9), 60.0, 500),
        };

        for _ in 0..burst.count {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let magnitude = speed * rng.gen_range(0.5..1.5);
            commands.spawn((
                Name::new("Particle"),
                LevelEntity,
                Particle {
                    velocity: Vec2::from_angle(angle) * magnitude,
                    life: Countdown::from_millis(life_ms),
                },
                SpriteBundle {
                    sprite: Sprite {
                        color,
                        custom_size: Some(Vec2::splat(size)),
                        ..default()
                    },
                    transform: Transform::from_translation(burst.position.extend(25.0)),
                    ..default()
                },
            ));
        }
    }
}

fn update_particles(
    time: Res<Time>,
    mut commands: Commands,
    mut particles: Query<(Entity, &mut Particle, &mut Transform, &mut Sprite)>,
) {
    let dt = time.delta_seconds();
    for (entity, mut particle, mut transform, mut sprite) in &mut particles {
        transform.translation.x += particle.velocity.x * dt;
        transform.translation.y += particle.velocity.y * dt;
        particle.velocity *= 0.9;
        sprite.color = sprite.color.with_alpha((sprite.color.alpha() - dt * 2.0).max(0.0));
        if particle.life.tick(dt) {
            commands.entity(entity).despawn_recursive();
        }
    }
}

fn tick_despawns(
    time: Res<Time>,
    mut commands: Commands,
    mut query: Query<(Entity, &mut DespawnAfter)>,
) {
    let dt = time.delta_seconds();
    for (entity, mut despawn) in &mut query {
        if despawn.0.tick(dt) {
            commands.entity(entity).despawn_recursive();
        }
    }
}
