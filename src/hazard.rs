//! Rotating chain hazards. Each pivot from the level layout anchors a chain of links swinging in
//! a circle; touching any link is lethal contact. Chains get slightly randomized speeds so
//! adjacent ones drift out of phase.

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::collision::{aabb_overlap, Collider};
use crate::level::{LevelEntity, LevelLayout, LevelPopulated, LevelSpawnSet};
use crate::player::{LifeState, Player, PlayerHit};
use crate::state::{DebugSettings, GameSet, GameState};

const LINK_COUNT: u32 = 6;
const LINK_SPACING: f32 = 12.0;
const LINK_SIZE: Vec2 = Vec2::new(10.0, 10.0);
const BASE_SPEED: f32 = 2.0;

pub struct HazardPlugin;

impl Plugin for HazardPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Playing),
            spawn_spinners.in_set(LevelSpawnSet),
        )
            .add_systems(
                Update,
                (rotate_spinners, check_spinner_contact)
                    .chain()
                    .in_set(GameSet::Ai)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Component)]
pub struct SpinnerChain {
    pub pivot: Vec2,
    pub angle: f32,
    /// Radians per second; negative chains swing the other way.
    pub speed: f32,
}

/// One lethal segment of a chain, at a fixed radius from the pivot.
#[derive(Component)]
pub struct SpinnerLink {
    pub radius: f32,
}

fn spawn_spinners(
    mut commands: Commands,
    layout: Res<LevelLayout>,
    populated: Res<LevelPopulated>,
    asset_server: Res<AssetServer>,
) {
    if populated.0 {
        return;
    }
    let mut rng = SmallRng::from_entropy();

    for pivot in &layout.snake_pivots {
        // Jitter the speed per chain, and reverse every third one.
        let mut speed = BASE_SPEED * rng.gen_range(0.8..1.2);
        if pivot.index % 3 == 2 {
            speed = -speed;
        }

        commands
            .spawn((
                Name::new("SpinnerChain"),
                LevelEntity,
                SpinnerChain {
                    pivot: pivot.position,
                    angle: rng.gen_range(0.0..std::f32::consts::TAU),
                    speed,
                },
                SpatialBundle::from_transform(Transform::from_translation(
                    pivot.position.extend(12.0),
                )),
            ))
            .with_children(|parent| {
                for link in 1..=LINK_COUNT {
                    parent.spawn((
                        SpinnerLink {
                            radius: link as f32 * LINK_SPACING,
                        },
                        SpriteBundle {
                            texture: asset_server.load("textures/spinner.png"),
                            sprite: Sprite {
                                custom_size: Some(LINK_SIZE),
                                ..default()
                            },
                            ..default()
                        },
                        Collider::from_size(LINK_SIZE),
                    ));
                }
            });
    }
}

fn rotate_spinners(
    time: Res<Time>,
    mut chains: Query<(&mut SpinnerChain, &Children)>,
    mut links: Query<(&SpinnerLink, &mut Transform)>,
) {
    let dt = time.delta_seconds();
    for (mut chain, children) in &mut chains {
        chain.angle += chain.speed * dt;
        let (sin, cos) = chain.angle.sin_cos();
        for child in children {
            let Ok((link, mut transform)) = links.get_mut(*child) else {
                continue;
            };
            transform.translation.x = cos * link.radius;
            transform.translation.y = sin * link.radius;
        }
    }
}

fn check_spinner_contact(
    debug: Res<DebugSettings>,
    links: Query<(&GlobalTransform, &Collider), With<SpinnerLink>>,
    player: Query<(&Transform, &Collider, &LifeState), With<Player>>,
    mut hits: EventWriter<PlayerHit>,
) {
    if debug.noclip {
        return;
    }
    let Ok((player_transform, player_collider, life)) = player.get_single() else {
        return;
    };
    if !matches!(life, LifeState::Alive) {
        return;
    }
    let player_pos = player_transform.translation.truncate();

    for (transform, collider) in &links {
        if aabb_overlap(
            player_pos,
            player_collider.half_extents,
            transform.translation().truncate(),
            collider.half_extents,
        ) {
            hits.send(PlayerHit::overlap());
            return;
        }
    }
}
