//! HUD and menu overlays: lives/coins/keys readout, the boss health bar, the pause veil, and the
//! end-of-run screen. All of it is plain Bevy UI driven by the progression store and run state.

use bevy::prelude::*;

use crate::boss::Boss;
use crate::level::{LevelConfig, LevelId};
use crate::progression::{KeySlot, ProgressionStore};
use crate::state::{GameState, RunOutcome};

const HUD_FONT_SIZE: f32 = 20.0;
const HEALTH_BAR_WIDTH: f32 = 200.0;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Playing), spawn_hud)
            .add_systems(OnExit(GameState::Playing), despawn::<Hud>)
            .add_systems(
                Update,
                (update_hud, attach_boss_bar, update_boss_bar)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(OnEnter(GameState::Paused), spawn_pause_overlay)
            .add_systems(OnExit(GameState::Paused), despawn::<PauseOverlay>)
            .add_systems(OnEnter(GameState::GameOver), spawn_game_over)
            .add_systems(OnExit(GameState::GameOver), despawn::<GameOverScreen>)
            .add_systems(
                Update,
                restart_input.run_if(in_state(GameState::GameOver)),
            );
    }
}

#[derive(Component)]
struct Hud;

#[derive(Component)]
struct HudText;

#[derive(Component)]
struct BossBar;

#[derive(Component)]
struct BossBarFill;

#[derive(Component)]
struct PauseOverlay;

#[derive(Component)]
struct GameOverScreen;

fn despawn<T: Component>(mut commands: Commands, query: Query<Entity, With<T>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

fn hud_line(store: &ProgressionStore) -> String {
    let mut line = format!("Lives: {}   Coins: {}", store.lives(), store.coins());
    if store.has_key(KeySlot::One) {
        line.push_str("   Key I");
    }
    if store.has_key(KeySlot::Two) {
        line.push_str("   Key II");
    }
    line
}

fn spawn_hud(mut commands: Commands, store: Res<ProgressionStore>) {
    commands
        .spawn((
            Hud,
            Name::new("Hud"),
            NodeBundle {
                style: Style {
                    position_type: PositionType::Absolute,
                    top: Val::Px(8.0),
                    left: Val::Px(8.0),
                    ..default()
                },
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn((
                HudText,
                TextBundle::from_section(
                    hud_line(&store),
                    TextStyle {
                        font_size: HUD_FONT_SIZE,
                        color: Color::WHITE,
                        ..default()
                    },
                ),
            ));
        });
}

fn update_hud(store: Res<ProgressionStore>, mut query: Query<&mut Text, With<HudText>>) {
    if !store.is_changed() {
        return;
    }
    for mut text in &mut query {
        text.sections[0].value = hud_line(&store);
    }
}

/// Builds the health bar whenever a boss exists without one. The HUD is
/// rebuilt after a pause, so this re-attaches rather than keying off `Added`.
fn attach_boss_bar(
    mut commands: Commands,
    bosses: Query<(), With<Boss>>,
    bars: Query<(), With<BossBar>>,
    hud: Query<Entity, With<Hud>>,
) {
    if bosses.is_empty() || !bars.is_empty() {
        return;
    }
    let Ok(hud_entity) = hud.get_single() else {
        return;
    };

    commands.entity(hud_entity).with_children(|parent| {
        parent
            .spawn((
                BossBar,
                NodeBundle {
                    style: Style {
                        position_type: PositionType::Absolute,
                        top: Val::Px(30.0),
                        left: Val::Px(0.0),
                        width: Val::Px(HEALTH_BAR_WIDTH),
                        height: Val::Px(10.0),
                        ..default()
                    },
                    background_color: Color::srgb(0.2, 0.2, 0.2).into(),
                    ..default()
                },
            ))
            .with_children(|bar| {
                bar.spawn((
                    BossBarFill,
                    NodeBundle {
                        style: Style {
                            width: Val::Percent(100.0),
                            height: Val::Percent(100.0),
                            ..default()
                        },
                        background_color: Color::srgb(0.8, 0.2, 0.2).into(),
                        ..default()
                    },
                ));
            });
    });
}

fn update_boss_bar(
    mut commands: Commands,
    bosses: Query<&Boss>,
    bars: Query<Entity, With<BossBar>>,
    mut fills: Query<&mut Style, With<BossBarFill>>,
) {
    match bosses.get_single() {
        Ok(boss) => {
            let percent = boss.health as f32 / boss.max_health as f32 * 100.0;
            for mut style in &mut fills {
                style.width = Val::Percent(percent);
            }
        }
        Err(_) => {
            for entity in &bars {
                commands.entity(entity).despawn_recursive();
            }
        }
    }
}

fn spawn_pause_overlay(mut commands: Commands) {
    commands
        .spawn((
            PauseOverlay,
            Name::new("PauseOverlay"),
            NodeBundle {
                style: Style {
                    position_type: PositionType::Absolute,
                    width: Val::Percent(100.0),
                    height: Val::Percent(100.0),
                    align_items: AlignItems::Center,
                    justify_content: JustifyContent::Center,
                    ..default()
                },
                background_color: Color::srgba(0.0, 0.0, 0.0, 0.6).into(),
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section(
                "PAUSED\nPress Escape to resume",
                TextStyle {
                    font_size: 32.0,
                    color: Color::WHITE,
                    ..default()
                },
            ));
        });
}

fn spawn_game_over(mut commands: Commands, outcome: Res<RunOutcome>) {
    let (title, color) = match *outcome {
        RunOutcome::Victory => ("YOU WIN", Color::srgb(0.9, 0.8, 0.2)),
        RunOutcome::Defeat => ("GAME OVER", Color::srgb(0.9, 0.2, 0.2)),
    };

    commands
        .spawn((
            GameOverScreen,
            Name::new("GameOverScreen"),
            NodeBundle {
                style: Style {
                    position_type: PositionType::Absolute,
                    width: Val::Percent(100.0),
                    height: Val::Percent(100.0),
                    flex_direction: FlexDirection::Column,
                    align_items: AlignItems::Center,
                    justify_content: JustifyContent::Center,
                    row_gap: Val::Px(12.0),
                    ..default()
                },
                background_color: Color::srgba(0.0, 0.0, 0.0, 0.8).into(),
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section(
                title,
                TextStyle {
                    font_size: 48.0,
                    color,
                    ..default()
                },
            ));
            parent.spawn(TextBundle::from_section(
                "Press Enter to play again",
                TextStyle {
                    font_size: 20.0,
                    color: Color::WHITE,
                    ..default()
                },
            ));
        });
}

/// Restart: wipe the run and reload the first stage.
fn restart_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut store: ResMut<ProgressionStore>,
    mut config: ResMut<LevelConfig>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Enter) {
        store.reset();
        config.level = LevelId::Meadow;
        next_state.set(GameState::Loading);
    }
}
