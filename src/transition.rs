//! Level transitions. Overlapping an exit region while holding its direction key starts a
//! departure: the player slides out while the screen fades, the destination level is loaded, and
//! on the other side an entry animation slides the player in from the matching edge.
//!
//! Both halves are phases of one [`TransitionState`] resource advanced by the tick delta. While a
//! transition is active the simulation system sets are paused via [`simulation_running`], so no
//! damage, AI, or physics runs mid-fade.

use bevy::prelude::*;

use crate::level::{ExitAction, ExitSpawn, LevelConfig, LevelId, LevelLayout};
use crate::movement::Velocity;
use crate::player::{LifeState, Player};
use crate::progression::{ProgressionStore, ReentryContext};
use crate::state::{GameSet, GameState};

const TRANSITION_SECS: f32 = 1.0;
/// How far the player slides during each half of a transition.
const SLIDE_PX: f32 = 32.0;

pub struct TransitionPlugin;

impl Plugin for TransitionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TransitionState>()
            .add_systems(Startup, spawn_fade_overlay)
            .add_systems(
                OnEnter(GameState::Playing),
                begin_entry.after(crate::player::spawn_player),
            )
            .add_systems(
                Update,
                check_exit_triggers
                    .in_set(GameSet::Combat)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(
                Update,
                (advance_transition, update_fade_overlay)
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPhase {
    Idle,
    /// Sliding out of the current level; loads `to` when the timer elapses.
    Departing { elapsed: f32, to: LevelId, downward: bool },
    /// Sliding into a freshly loaded level.
    Entering { elapsed: f32, downward: bool },
}

#[derive(Resource)]
pub struct TransitionState {
    pub phase: TransitionPhase,
}

impl Default for TransitionState {
    fn default() -> Self {
        Self {
            phase: TransitionPhase::Idle,
        }
    }
}

impl TransitionState {
    pub fn active(&self) -> bool {
        self.phase != TransitionPhase::Idle
    }

    /// Overlay opacity for the current phase: ramps up while departing, down
    /// while entering.
    pub fn fade_alpha(&self) -> f32 {
        match &self.phase {
            TransitionPhase::Idle => 0.0,
            TransitionPhase::Departing { elapsed, .. } => (elapsed / TRANSITION_SECS).clamp(0.0, 1.0),
            TransitionPhase::Entering { elapsed, .. } => {
                1.0 - (elapsed / TRANSITION_SECS).clamp(0.0, 1.0)
            }
        }
    }
}

/// Gate for the simulation system sets: everything pauses while a transition
/// plays.
pub fn simulation_running(transition: Res<TransitionState>) -> bool {
    !transition.active()
}

/// Full-screen quad faded in and out by the transition phases.
#[derive(Component)]
pub struct FadeOverlay;

fn spawn_fade_overlay(mut commands: Commands) {
    commands.spawn((
        Name::new("FadeOverlay"),
        FadeOverlay,
        SpriteBundle {
            sprite: Sprite {
                color: Color::srgba(0.0, 0.0, 0.0, 0.0),
                custom_size: Some(Vec2::splat(10_000.0)),
                ..default()
            },
            transform: Transform::from_xyz(0.0, 0.0, 900.0),
            ..default()
        },
    ));
}

fn exit_satisfied(exit: &ExitSpawn, down_held: bool, up_held: bool, store: &ProgressionStore) -> bool {
    let held = match exit.action {
        ExitAction::DownHeld => down_held,
        ExitAction::UpHeld => up_held,
    };
    held && exit.requires.map(|slot| store.has_key(slot)).unwrap_or(true)
}

/// Where the destination level places the player: a fixed entry point if the
/// exit names one, the player's own coordinates if it carries them, otherwise
/// the destination's spawn point decides.
fn reentry_position(exit: &ExitSpawn, player_pos: Vec2) -> Option<Vec2> {
    if exit.entry.is_some() {
        return exit.entry;
    }
    exit.keep_position.then_some(player_pos)
}

#[allow(clippy::type_complexity)]
fn check_exit_triggers(
    intent: Res<crate::input::InputIntent>,
    layout: Res<LevelLayout>,
    mut store: ResMut<ProgressionStore>,
    mut transition: ResMut<TransitionState>,
    mut player: Query<(&Transform, &LifeState, &mut Velocity), With<Player>>,
) {
    if transition.active() {
        return;
    }
    let Ok((transform, life, mut velocity)) = player.get_single_mut() else {
        return;
    };
    if !matches!(life, LifeState::Alive) {
        return;
    }
    let position = transform.translation.truncate();

    for exit in &layout.exits {
        if !exit.rect.contains(position) {
            continue;
        }
        if !exit_satisfied(exit, intent.down_held, intent.up_held, &store) {
            continue;
        }

        let downward = exit.action == ExitAction::DownHeld;
        // The destination enters from the side matching this exit's direction.
        store.set_reentry(
            exit.destination,
            ReentryContext {
                drop_from_above: downward,
                position: reentry_position(exit, position),
            },
        );
        transition.phase = TransitionPhase::Departing {
            elapsed: 0.0,
            to: exit.destination,
            downward,
        };
        velocity.0 = Vec2::ZERO;
        info!("Departing for {:?}.", exit.destination);
        return;
    }
}

/// Arms the entry animation when the freshly spawned level has a pending
/// re-entry context. Runs after the player spawner so the slide offset lands on
/// a real transform.
fn begin_entry(
    config: Res<LevelConfig>,
    mut store: ResMut<ProgressionStore>,
    mut transition: ResMut<TransitionState>,
    layout: Res<LevelLayout>,
    mut player: Query<(&mut Transform, &mut Sprite), With<Player>>,
) {
    // Consume-once: a pause/resume cycle finds no context and changes nothing.
    let Some(context) = store.take_reentry(config.level) else {
        return;
    };
    let Ok((mut transform, mut sprite)) = player.get_single_mut() else {
        return;
    };

    let anchor = context
        .position
        .or(layout.player_spawn)
        .unwrap_or(transform.translation.truncate());
    // Entering downward means the player drops in from above the anchor.
    let offset = if context.drop_from_above { SLIDE_PX } else { -SLIDE_PX };
    transform.translation.x = anchor.x;
    transform.translation.y = anchor.y + offset;
    sprite.color = sprite.color.with_alpha(0.0);

    transition.phase = TransitionPhase::Entering {
        elapsed: 0.0,
        downward: context.drop_from_above,
    };
}

#[allow(clippy::type_complexity)]
fn advance_transition(
    time: Res<Time>,
    mut transition: ResMut<TransitionState>,
    mut config: ResMut<LevelConfig>,
    mut next_state: ResMut<NextState<GameState>>,
    mut player: Query<(&mut Transform, &mut Sprite), With<Player>>,
) {
    let dt = time.delta_seconds();

    match transition.phase.clone() {
        TransitionPhase::Idle => {}
        TransitionPhase::Departing { elapsed, to, downward } => {
            if let Ok((mut transform, _)) = player.get_single_mut() {
                let slide = SLIDE_PX / TRANSITION_SECS * dt;
                transform.translation.y += if downward { -slide } else { slide };
            }
            let elapsed = elapsed + dt;
            if elapsed >= TRANSITION_SECS {
                config.level = to;
                next_state.set(GameState::Loading);
                // begin_entry rearms the phase on the destination side.
                transition.phase = TransitionPhase::Idle;
            } else {
                transition.phase = TransitionPhase::Departing { elapsed, to, downward };
            }
        }
        TransitionPhase::Entering { elapsed, downward } => {
            let elapsed = elapsed + dt;
            if let Ok((mut transform, mut sprite)) = player.get_single_mut() {
                let slide = SLIDE_PX / TRANSITION_SECS * dt;
                transform.translation.y += if downward { -slide } else { slide };
                sprite.color = sprite
                    .color
                    .with_alpha((elapsed / TRANSITION_SECS).clamp(0.0, 1.0));
            }
            if elapsed >= TRANSITION_SECS {
                if let Ok((_, mut sprite)) = player.get_single_mut() {
                    sprite.color = sprite.color.with_alpha(1.0);
                }
                transition.phase = TransitionPhase::Idle;
            } else {
                transition.phase = TransitionPhase::Entering { elapsed, downward };
            }
        }
    }
}

fn update_fade_overlay(
    transition: Res<TransitionState>,
    mut overlays: Query<&mut Sprite, With<FadeOverlay>>,
) {
    for mut sprite in &mut overlays {
        sprite.color = sprite.color.with_alpha(transition.fade_alpha());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::KeySlot;

    fn exit(action: ExitAction, requires: Option<KeySlot>) -> ExitSpawn {
        ExitSpawn {
            rect: Rect::from_center_size(Vec2::ZERO, Vec2::splat(16.0)),
            destination: LevelId::Hollow,
            requires,
            action,
            entry: None,
            keep_position: false,
        }
    }

    #[test]
    fn exit_needs_its_direction_held() {
        let store = ProgressionStore::new_game();
        let down_exit = exit(ExitAction::DownHeld, None);
        assert!(exit_satisfied(&down_exit, true, false, &store));
        assert!(!exit_satisfied(&down_exit, false, true, &store));

        let up_exit = exit(ExitAction::UpHeld, None);
        assert!(exit_satisfied(&up_exit, false, true, &store));
        assert!(!exit_satisfied(&up_exit, true, false, &store));
    }

    #[test]
    fn locked_exit_needs_the_key() {
        let mut store = ProgressionStore::new_game();
        let locked = exit(ExitAction::DownHeld, Some(KeySlot::One));
        assert!(!exit_satisfied(&locked, true, false, &store));
        store.grant_key(KeySlot::One);
        assert!(exit_satisfied(&locked, true, false, &store));
    }

    #[test]
    fn exit_chooses_the_destination_anchor() {
        let player_pos = Vec2::new(512.0, 96.0);

        // A named entry point wins outright.
        let mut fixed = exit(ExitAction::UpHeld, None);
        fixed.entry = Some(Vec2::new(1038.0, 64.0));
        fixed.keep_position = true;
        assert_eq!(reentry_position(&fixed, player_pos), Some(Vec2::new(1038.0, 64.0)));

        // Without one, an exit that keeps position carries the player's own coordinates.
        let mut carried = exit(ExitAction::DownHeld, None);
        carried.keep_position = true;
        assert_eq!(reentry_position(&carried, player_pos), Some(player_pos));

        // A plain exit defers to the destination's spawn point.
        let plain = exit(ExitAction::DownHeld, None);
        assert_eq!(reentry_position(&plain, player_pos), None);
    }

    #[test]
    fn fade_ramps_up_then_down() {
        let mut state = TransitionState::default();
        assert_eq!(state.fade_alpha(), 0.0);

        state.phase = TransitionPhase::Departing {
            elapsed: 0.5,
            to: LevelId::Hollow,
            downward: true,
        };
        assert!((state.fade_alpha() - 0.5).abs() < 1e-5);
        assert!(state.active());

        state.phase = TransitionPhase::Entering {
            elapsed: 0.75,
            downward: true,
        };
        assert!((state.fade_alpha() - 0.25).abs() < 1e-5);
    }
}
