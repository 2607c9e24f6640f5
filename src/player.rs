//! Player lifecycle: spawning from the level layout, the Alive/Dying/Respawning state machine,
//! invulnerability, and the fall-death threshold.
//!
//! The death and respawn choreography is a plain phase + elapsed-time sequence advanced by the
//! tick delta (never deferred callbacks), so the whole arc is unit-testable by feeding it
//! synthetic deltas. Damage is delivered through [`PlayerHit`] events and funnelled through one
//! guarded handler, which is what makes re-entrant death attempts no-ops.

use bevy::prelude::*;

use crate::collision::Collider;
use crate::cooldown::Countdown;
use crate::effects::{PlaySfx, Sfx};
use crate::level::{LevelAssets, LevelEntity, LevelLayout, LevelPopulated, LevelSpawnSet};
use crate::movement::{EffectTimers, Facing, MovementState, PhysicsBody, PlayerController, Velocity};
use crate::platform::RidingPlatform;
use crate::state::{DebugSettings, GameSet, GameState, RunOutcome};

pub const PLAYER_SIZE: Vec2 = Vec2::new(14.0, 16.0);
/// How far below the level's lower edge the player may fall before dying.
const DEATH_PLANE_MARGIN: f32 = 32.0;
const RESPAWN_FADE_SECS: f32 = 0.5;
const INVULNERABLE_MILLIS: u64 = 2000;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PlayerHit>()
            .add_systems(
                OnEnter(GameState::Playing),
                spawn_player.in_set(LevelSpawnSet),
            )
            .add_systems(
                Update,
                (check_death_plane, apply_player_damage, advance_life_states)
                    .chain()
                    .in_set(GameSet::Combat)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Marker component used by many systems (camera follow, collision queries) to identify the
/// player entity.
#[derive(Component)]
pub struct Player;

/// A damaging overlap or threshold crossing. `pierce_invulnerability` is set by
/// the fall-death check: leaving the level bounds kills even a flashing player.
#[derive(Event, Debug, Clone, Copy)]
pub struct PlayerHit {
    pub pierce_invulnerability: bool,
}

impl PlayerHit {
    pub fn overlap() -> Self {
        Self {
            pierce_invulnerability: false,
        }
    }

    pub fn fall() -> Self {
        Self {
            pierce_invulnerability: true,
        }
    }
}

/// Post-respawn damage immunity window.
#[derive(Component)]
pub struct Invulnerability(pub Countdown);

/// Phases of the death tumble, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeathPhase {
    /// Brief freeze so the hit reads before the body launches.
    Freeze,
    /// Upward pop with a spin.
    Launch,
    /// Accelerated plunge off the bottom of the screen.
    Plunge,
    /// Off-screen hold before the respawn fade.
    Wait,
}

#[derive(Debug, Clone)]
pub struct DeathSequence {
    phase: DeathPhase,
    elapsed: f32,
    /// No lives remain; the sequence ends in game over instead of a respawn.
    fatal: bool,
    finished: bool,
}

impl DeathSequence {
    const FREEZE_SECS: f32 = 0.1;
    const LAUNCH_SECS: f32 = 0.7;
    const PLUNGE_SECS: f32 = 0.5;
    const WAIT_SECS: f32 = 1.0;

    pub fn new(fatal: bool) -> Self {
        Self {
            phase: DeathPhase::Freeze,
            elapsed: 0.0,
            fatal,
            finished: false,
        }
    }

    /// Vertical speed the choreography imposes in the current phase.
    pub fn vertical_velocity(&self) -> f32 {
        match self.phase {
            DeathPhase::Freeze | DeathPhase::Wait => 0.0,
            DeathPhase::Launch => 140.0,
            DeathPhase::Plunge => -600.0,
        }
    }

    /// Spin rate in radians per second while tumbling.
    pub fn spin(&self) -> f32 {
        match self.phase {
            DeathPhase::Launch | DeathPhase::Plunge => std::f32::consts::PI * 2.0,
            _ => 0.0,
        }
    }

    fn phase_duration(&self) -> f32 {
        match self.phase {
            DeathPhase::Freeze => Self::FREEZE_SECS,
            DeathPhase::Launch => Self::LAUNCH_SECS,
            DeathPhase::Plunge => Self::PLUNGE_SECS,
            DeathPhase::Wait => Self::WAIT_SECS,
        }
    }

    /// Advances the sequence, returning true exactly once when the final phase
    /// completes. A finished sequence stays finished.
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.finished {
            return false;
        }
        self.elapsed += dt;
        while self.elapsed >= self.phase_duration() {
            self.elapsed -= self.phase_duration();
            self.phase = match self.phase {
                DeathPhase::Freeze => DeathPhase::Launch,
                DeathPhase::Launch => DeathPhase::Plunge,
                DeathPhase::Plunge => DeathPhase::Wait,
                DeathPhase::Wait => {
                    self.finished = true;
                    return true;
                }
            };
        }
        false
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

/// The player's life-state machine. At most one of Dying/Respawning at a time
/// by construction; all transitions run through [`advance_life_states`] and the
/// guarded damage handler.
#[derive(Component, Debug, Clone)]
pub enum LifeState {
    Alive,
    Dying(DeathSequence),
    Respawning { elapsed: f32 },
}

/// Outcome of advancing a life state by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeTick {
    None,
    /// The death tumble finished; the body has been moved to the spawn point.
    StartRespawn,
    /// The respawn fade finished; control returns and invulnerability starts.
    BecomeAlive,
    /// The fatal death tumble finished.
    GameOver,
}

/// Pure tick function for the life-state machine (world effects are applied by
/// the calling system).
pub fn tick_life_state(state: &mut LifeState, dt: f32) -> LifeTick {
    match state {
        LifeState::Alive => LifeTick::None,
        LifeState::Dying(sequence) => {
            if !sequence.advance(dt) {
                return LifeTick::None;
            }
            if sequence.is_fatal() {
                LifeTick::GameOver
            } else {
                *state = LifeState::Respawning { elapsed: 0.0 };
                LifeTick::StartRespawn
            }
        }
        LifeState::Respawning { elapsed } => {
            *elapsed += dt;
            if *elapsed >= RESPAWN_FADE_SECS {
                *state = LifeState::Alive;
                LifeTick::BecomeAlive
            } else {
                LifeTick::None
            }
        }
    }
}

/// Whether a hit may start the death sequence right now.
pub fn can_take_damage(state: &LifeState, invulnerable: bool, pierce: bool) -> bool {
    matches!(state, LifeState::Alive) && (pierce || !invulnerable)
}

pub(crate) fn spawn_player(
    mut commands: Commands,
    layout: Res<LevelLayout>,
    populated: Res<LevelPopulated>,
    asset_server: Res<AssetServer>,
) {
    // Re-entering `Playing` after a pause must not spawn a second player.
    if populated.0 {
        return;
    }
    let Some(spawn) = layout.player_spawn else {
        // Fatal setup error; the level loader already refused to enter play
        // without a spawn point, so this is a second line of defence.
        error!("No player spawn point in level layout; player not spawned.");
        return;
    };

    commands.spawn((
        Name::new("Player"),
        Player,
        LevelEntity,
        SpriteBundle {
            texture: asset_server.load("textures/player.png"),
            sprite: Sprite {
                custom_size: Some(PLAYER_SIZE),
                ..default()
            },
            transform: Transform::from_translation(spawn.extend(20.0)),
            ..default()
        },
        LifeState::Alive,
        Velocity::default(),
        MovementState::default(),
        Facing::default(),
        PlayerController::default(),
        PhysicsBody::default(),
        Collider::from_size(PLAYER_SIZE),
        RidingPlatform::default(),
        EffectTimers::default(),
    ));
}

/// Kills the player when they fall past the level's lower edge.
fn check_death_plane(
    level_assets: Res<LevelAssets>,
    query: Query<&Transform, With<Player>>,
    mut hits: EventWriter<PlayerHit>,
) {
    let Some(origin) = level_assets.level_origin else {
        return;
    };
    let Ok(transform) = query.get_single() else {
        return;
    };

    if transform.translation.y < origin.y - DEATH_PLANE_MARGIN {
        hits.send(PlayerHit::fall());
    }
}

/// Single guarded entry point for all damage. Duplicate hits in one tick, hits
/// while dying, and hits during invulnerability all fall through without effect.
#[allow(clippy::type_complexity)]
fn apply_player_damage(
    mut hits: EventReader<PlayerHit>,
    debug: Res<DebugSettings>,
    mut store: ResMut<crate::progression::ProgressionStore>,
    mut sfx: EventWriter<PlaySfx>,
    mut query: Query<
        (
            &mut LifeState,
            &mut Velocity,
            &mut RidingPlatform,
            Option<&Invulnerability>,
        ),
        With<Player>,
    >,
) {
    let Ok((mut life, mut velocity, mut riding, invulnerability)) = query.get_single_mut() else {
        hits.clear();
        return;
    };

    for hit in hits.read() {
        if debug.noclip {
            continue;
        }
        let invulnerable = invulnerability.map(|i| !i.0.finished()).unwrap_or(false);
        if !can_take_damage(&life, invulnerable, hit.pierce_invulnerability) {
            continue;
        }

        let remaining = store.take_life();
        *life = LifeState::Dying(DeathSequence::new(remaining == 0));
        velocity.0 = Vec2::ZERO;
        riding.0 = None;
        sfx.send(PlaySfx::new(Sfx::Death, 0.5));
    }
}

#[allow(clippy::type_complexity)]
fn advance_life_states(
    time: Res<Time>,
    layout: Res<LevelLayout>,
    mut commands: Commands,
    mut next_state: ResMut<NextState<GameState>>,
    mut outcome: ResMut<RunOutcome>,
    mut query: Query<
        (
            Entity,
            &mut LifeState,
            &mut Transform,
            &mut Sprite,
            Option<&mut Invulnerability>,
        ),
        With<Player>,
    >,
) {
    let dt = time.delta_seconds();
    let Ok((entity, mut life, mut transform, mut sprite, invulnerability)) =
        query.get_single_mut()
    else {
        return;
    };

    // The immunity window ticks independently of the life state.
    if let Some(mut invulnerability) = invulnerability {
        if invulnerability.0.tick(dt) {
            commands.entity(entity).remove::<Invulnerability>();
            sprite.color = sprite.color.with_alpha(1.0);
        }
    }

    // Choreographed motion while dying: the physics integration skips non-Alive
    // players, so the sequence owns the transform.
    if let LifeState::Dying(sequence) = &*life {
        transform.translation.y += sequence.vertical_velocity() * dt;
        transform.rotate_z(sequence.spin() * dt);
    }
    if let LifeState::Respawning { elapsed } = &*life {
        sprite.color = sprite
            .color
            .with_alpha((elapsed / RESPAWN_FADE_SECS).clamp(0.0, 1.0));
    }

    match tick_life_state(&mut life, dt) {
        LifeTick::None => {}
        LifeTick::StartRespawn => {
            if let Some(spawn) = layout.player_spawn {
                transform.translation = spawn.extend(transform.translation.z);
            }
            transform.rotation = Quat::IDENTITY;
            sprite.color = sprite.color.with_alpha(0.0);
        }
        LifeTick::BecomeAlive => {
            sprite.color = sprite.color.with_alpha(1.0);
            commands
                .entity(entity)
                .insert(Invulnerability(Countdown::from_millis(INVULNERABLE_MILLIS)));
        }
        LifeTick::GameOver => {
            *outcome = RunOutcome::Defeat;
            next_state.set(GameState::GameOver);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(state: &mut LifeState, total: f32, step: f32) -> Vec<LifeTick> {
        let mut events = Vec::new();
        let mut t = 0.0;
        while t < total {
            let tick = tick_life_state(state, step);
            if tick != LifeTick::None {
                events.push(tick);
            }
            t += step;
        }
        events
    }

    #[test]
    fn death_runs_through_respawn_to_alive() {
        let mut state = LifeState::Dying(DeathSequence::new(false));
        let events = drain(&mut state, 4.0, 1.0 / 60.0);
        assert_eq!(events, vec![LifeTick::StartRespawn, LifeTick::BecomeAlive]);
        assert!(matches!(state, LifeState::Alive));
    }

    #[test]
    fn fatal_death_routes_to_game_over_without_respawn() {
        let mut state = LifeState::Dying(DeathSequence::new(true));
        let events = drain(&mut state, 4.0, 1.0 / 60.0);
        assert_eq!(events, vec![LifeTick::GameOver]);
        // Terminal: never enters Respawning.
        assert!(matches!(state, LifeState::Dying(_)));
    }

    #[test]
    fn dying_player_cannot_die_again() {
        let state = LifeState::Dying(DeathSequence::new(false));
        assert!(!can_take_damage(&state, false, false));
        assert!(!can_take_damage(&state, false, true));
    }

    #[test]
    fn invulnerability_blocks_overlap_damage_but_not_falls() {
        let state = LifeState::Alive;
        assert!(!can_take_damage(&state, true, false));
        assert!(can_take_damage(&state, true, true));
        assert!(can_take_damage(&state, false, false));
    }

    #[test]
    fn death_sequence_phases_run_in_order() {
        let mut sequence = DeathSequence::new(false);
        assert_eq!(sequence.vertical_velocity(), 0.0);

        sequence.advance(0.15); // past Freeze
        assert!(sequence.vertical_velocity() > 0.0);

        sequence.advance(0.7); // past Launch
        assert!(sequence.vertical_velocity() < 0.0);

        sequence.advance(0.5); // past Plunge
        assert_eq!(sequence.vertical_velocity(), 0.0);

        assert!(sequence.advance(1.0)); // Wait elapses, sequence completes
    }
}
