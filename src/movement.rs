//! Kinematics and player locomotion. One integration system moves every gravity-affected body
//! through the tile map; the control system on top of it translates [`InputIntent`] into
//! acceleration, jumps, and the cosmetic walk/jump effects.

use bevy::prelude::*;

use crate::collision::{move_and_collide, Collider, CollisionMap};
use crate::cooldown::Cooldown;
use crate::effects::{BurstKind, PlaySfx, Sfx, SpawnBurst};
use crate::input::InputIntent;
use crate::player::{LifeState, Player};
use crate::state::{DebugSettings, GameSet, GameState};

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MovementSettings>().add_systems(
            Update,
            (apply_player_control, debug_fly, apply_kinematics)
                .chain()
                .in_set(GameSet::Movement)
                .run_if(in_state(GameState::Playing)),
        );
    }
}

#[derive(Resource)]
pub struct MovementSettings {
    pub gravity: f32,
    pub terminal_velocity: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            gravity: 800.0,
            terminal_velocity: -400.0,
        }
    }
}

#[derive(Component, Default, Deref, DerefMut)]
pub struct Velocity(pub Vec2);

/// Marks an entity as integrated by [`apply_kinematics`]: gravity, terminal
/// velocity, and tile clipping. Projectiles run their own integration because
/// of restitution.
#[derive(Component)]
pub struct PhysicsBody {
    pub gravity_scale: f32,
    /// Whether one-way land tiles catch this body from above.
    pub use_one_way: bool,
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self {
            gravity_scale: 1.0,
            use_one_way: true,
        }
    }
}

#[derive(Component)]
pub struct PlayerController {
    pub acceleration: f32,
    pub drag: f32,
    pub max_speed: f32,
    pub jump_velocity: f32,
    /// Per-tick damping applied while ascending with the jump key released.
    pub jump_cut: f32,
    /// Below this speed a released stick snaps to rest instead of jittering.
    pub rest_threshold: f32,
}

impl Default for PlayerController {
    fn default() -> Self {
        Self {
            acceleration: 800.0,
            drag: 750.0,
            max_speed: 150.0,
            jump_velocity: 330.0,
            jump_cut: 0.85,
            rest_threshold: 10.0,
        }
    }
}

#[derive(Component, Default)]
pub struct MovementState {
    pub on_ground: bool,
    pub jumping: bool,
    /// The body hit a ceiling this tick. Consumed by the block-bump check,
    /// which runs after the resolver has already zeroed the upward velocity.
    pub hit_head: bool,
    /// Downward speed at the moment of landing this tick, zero otherwise. The
    /// resolver zeroes the velocity on contact, so anything that cares how
    /// fast the body came down reads this instead.
    pub impact_speed: f32,
}

/// Horizontal facing as ±1.0; drives sprite flip and projectile direction.
#[derive(Component)]
pub struct Facing(pub f32);

impl Default for Facing {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Cooldowns that rate-limit walk/jump presentation independently of the physics tick.
#[derive(Component)]
pub struct EffectTimers {
    pub walk_sfx: Cooldown,
    pub jump_sfx: Cooldown,
    pub dust: Cooldown,
}

impl Default for EffectTimers {
    fn default() -> Self {
        Self {
            walk_sfx: Cooldown::from_millis(150),
            jump_sfx: Cooldown::from_millis(500),
            dust: Cooldown::from_millis(100),
        }
    }
}

#[allow(clippy::type_complexity)]
fn apply_player_control(
    time: Res<Time>,
    intent: Res<InputIntent>,
    debug: Res<DebugSettings>,
    mut sfx: EventWriter<PlaySfx>,
    mut bursts: EventWriter<SpawnBurst>,
    mut query: Query<
        (
            &PlayerController,
            &LifeState,
            &Transform,
            &Collider,
            &mut Velocity,
            &mut MovementState,
            &mut Facing,
            &mut Sprite,
            &mut EffectTimers,
        ),
        With<Player>,
    >,
) {
    if debug.noclip {
        return;
    }
    let dt = time.delta_seconds();
    let now = time.elapsed_seconds();

    for (
        controller,
        life,
        transform,
        collider,
        mut velocity,
        mut state,
        mut facing,
        mut sprite,
        mut timers,
    ) in &mut query
    {
        // Input is ignored for the whole death/respawn choreography.
        if !matches!(life, LifeState::Alive) {
            continue;
        }

        let axis = intent.move_axis;
        if axis != 0.0 {
            velocity.x = (velocity.x + axis * controller.acceleration * dt)
                .clamp(-controller.max_speed, controller.max_speed);
            facing.0 = axis.signum();
            sprite.flip_x = facing.0 < 0.0;

            if state.on_ground {
                if timers.walk_sfx.try_fire(now) {
                    sfx.send(PlaySfx::new(Sfx::Walk, 0.2));
                }
                if timers.dust.try_fire(now) {
                    bursts.send(SpawnBurst {
                        kind: BurstKind::Dust,
                        position: transform.translation.truncate()
                            - Vec2::new(facing.0 * collider.half_extents.x, collider.half_extents.y),
                        count: 3,
                    });
                }
            }
        } else {
            let drag = controller.drag * dt;
            if velocity.x.abs() <= drag.max(controller.rest_threshold) {
                velocity.x = 0.0;
            } else {
                velocity.x -= velocity.x.signum() * drag;
            }
        }

        if intent.jump_pressed && state.on_ground && !state.jumping {
            velocity.y = controller.jump_velocity;
            state.jumping = true;
            state.on_ground = false;
            if timers.jump_sfx.try_fire(now) {
                sfx.send(PlaySfx::new(Sfx::Jump, 0.3));
            }
        }

        // Releasing jump while still ascending cuts the arc short.
        if !intent.jump_held && velocity.y > 0.0 {
            velocity.y *= controller.jump_cut;
        }
    }
}

/// Free-flight movement while noclip is on; gravity and collision are skipped entirely.
fn debug_fly(
    time: Res<Time>,
    intent: Res<InputIntent>,
    debug: Res<DebugSettings>,
    mut query: Query<&mut Transform, With<Player>>,
) {
    if !debug.noclip {
        return;
    }
    let speed = 300.0 * time.delta_seconds();
    for mut transform in &mut query {
        transform.translation.x += intent.move_axis * speed;
        if intent.up_held {
            transform.translation.y += speed;
        }
        if intent.down_held {
            transform.translation.y -= speed;
        }
    }
}

#[allow(clippy::type_complexity)]
fn apply_kinematics(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    debug: Res<DebugSettings>,
    collision_map: Res<CollisionMap>,
    mut query: Query<(
        &mut Transform,
        &mut Velocity,
        &Collider,
        &PhysicsBody,
        Option<&mut MovementState>,
        Option<&LifeState>,
        Option<&Player>,
    )>,
) {
    let dt = time.delta_seconds();

    for (mut transform, mut velocity, collider, body, state, life, player) in &mut query {
        // The death choreography owns the player's transform; noclip owns it in debug flight.
        if let Some(life) = life {
            if !matches!(life, LifeState::Alive) {
                continue;
            }
        }
        if player.is_some() && debug.noclip {
            continue;
        }

        velocity.y -= settings.gravity * body.gravity_scale * dt;
        if velocity.y < settings.terminal_velocity {
            velocity.y = settings.terminal_velocity;
        }

        let mut position = transform.translation;
        let mut vel = velocity.0;
        let falling_speed = (-vel.y).max(0.0);
        let flags = move_and_collide(
            &mut position,
            &mut vel,
            collider.half_extents,
            dt,
            &collision_map,
            body.use_one_way,
        );
        velocity.0 = vel;
        transform.translation = position;

        if let Some(mut state) = state {
            state.on_ground = flags.down;
            state.hit_head = flags.up;
            state.impact_speed = if flags.down { falling_speed } else { 0.0 };
            if flags.down {
                state.jumping = false;
            }
        }
    }
}
