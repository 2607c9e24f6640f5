//! The meadow guide: a friendly NPC near the spawn point who walks new players through the
//! controls. Standing close shows a talk prompt; the interact key opens a dialog box and steps
//! through the lines one press at a time. Walking away closes the conversation.

use bevy::prelude::*;

use crate::effects::{PlaySfx, Sfx};
use crate::input::InputIntent;
use crate::level::{LevelConfig, LevelEntity, LevelId, LevelLayout, LevelPopulated, LevelSpawnSet};
use crate::player::Player;
use crate::state::{GameSet, GameState};

/// How far from the player's spawn point the guide stands.
const NPC_OFFSET_X: f32 = 128.0;
/// Within this distance the prompt shows and the interact key works.
const TALK_RANGE: f32 = 50.0;
pub const NPC_SIZE: Vec2 = Vec2::new(16.0, 16.0);

const DIALOG_LINES: [&str; 7] = [
    "Hey, you made it! Welcome to the meadow.",
    "Move with A and D. Space jumps, and a short tap jumps lower.",
    "Coins are scattered everywhere. The counter up top keeps score.",
    "Bump blocks from below to pop what's inside. A few hide keys.",
    "Locked exits only open once you carry the matching key.",
    "Moving platforms carry you along while you stand on them.",
    "Press F to throw a fireball. Each throw costs a coin, so stock up!",
];

pub struct NpcPlugin;

impl Plugin for NpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DialogState>()
            .add_systems(OnEnter(GameState::Playing), spawn_npc.in_set(LevelSpawnSet))
            .add_systems(OnExit(GameState::Playing), close_dialog_box)
            .add_systems(
                Update,
                (track_talk_range, handle_interaction)
                    .chain()
                    .in_set(GameSet::Combat)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(
                Update,
                sync_dialog_box.run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Component)]
pub struct Npc;

/// The floating "E to talk" hint above the guide.
#[derive(Component)]
struct TalkPrompt;

#[derive(Component)]
struct DialogBox;

#[derive(Component)]
struct DialogText;

/// Result of one interact press against the dialog state.
#[derive(Debug, PartialEq, Eq)]
pub enum DialogStep {
    Opened,
    Advanced,
    Closed,
    Ignored,
}

#[derive(Resource, Default)]
pub struct DialogState {
    pub in_range: bool,
    pub active: bool,
    pub index: usize,
}

impl DialogState {
    /// Applies one interact press: opens in range, steps through the lines,
    /// and closes after the last one.
    pub fn interact(&mut self, line_count: usize) -> DialogStep {
        if self.active {
            if self.index + 1 < line_count {
                self.index += 1;
                DialogStep::Advanced
            } else {
                self.active = false;
                self.index = 0;
                DialogStep::Closed
            }
        } else if self.in_range && line_count > 0 {
            self.active = true;
            self.index = 0;
            DialogStep::Opened
        } else {
            DialogStep::Ignored
        }
    }

    /// Walking out of range drops the conversation.
    pub fn leave_range(&mut self) {
        self.in_range = false;
        if self.active {
            self.active = false;
            self.index = 0;
        }
    }
}

fn spawn_npc(
    mut commands: Commands,
    layout: Res<LevelLayout>,
    populated: Res<LevelPopulated>,
    config: Res<LevelConfig>,
    asset_server: Res<AssetServer>,
    mut dialog: ResMut<DialogState>,
) {
    if populated.0 {
        return;
    }
    *dialog = DialogState::default();

    // The guide only lives in the first stage.
    if config.level != LevelId::Meadow {
        return;
    }
    let Some(spawn) = layout.player_spawn else {
        return;
    };

    commands
        .spawn((
            Name::new("Guide"),
            Npc,
            LevelEntity,
            SpriteBundle {
                texture: asset_server.load("textures/guide.png"),
                sprite: Sprite {
                    custom_size: Some(NPC_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(
                    (spawn + Vec2::new(NPC_OFFSET_X, 0.0)).extend(9.0),
                ),
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn((
                TalkPrompt,
                Text2dBundle {
                    text: Text::from_section(
                        "E to talk",
                        TextStyle {
                            font_size: 12.0,
                            color: Color::WHITE,
                            ..default()
                        },
                    ),
                    transform: Transform::from_xyz(0.0, NPC_SIZE.y + 4.0, 1.0)
                        .with_scale(Vec3::splat(0.5)),
                    visibility: Visibility::Hidden,
                    ..default()
                },
            ));
        });
}

fn track_talk_range(
    npcs: Query<&Transform, With<Npc>>,
    player: Query<&Transform, With<Player>>,
    mut dialog: ResMut<DialogState>,
    mut prompts: Query<&mut Visibility, With<TalkPrompt>>,
) {
    let Ok(npc_transform) = npcs.get_single() else {
        return;
    };
    let Ok(player_transform) = player.get_single() else {
        return;
    };

    let distance = npc_transform
        .translation
        .truncate()
        .distance(player_transform.translation.truncate());

    if distance <= TALK_RANGE {
        dialog.in_range = true;
    } else if dialog.in_range {
        dialog.leave_range();
    }

    let prompt_visibility = if dialog.in_range && !dialog.active {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    for mut visibility in &mut prompts {
        *visibility = prompt_visibility;
    }
}

fn handle_interaction(
    intent: Res<InputIntent>,
    mut dialog: ResMut<DialogState>,
    mut sfx: EventWriter<PlaySfx>,
) {
    if !intent.interact_pressed {
        return;
    }
    if dialog.interact(DIALOG_LINES.len()) == DialogStep::Opened {
        sfx.send(PlaySfx::new(Sfx::Click, 0.4));
    }
}

/// Keeps the dialog box in sync with the state: spawned while a conversation
/// is active, text tracking the current line, gone otherwise.
fn sync_dialog_box(
    mut commands: Commands,
    dialog: Res<DialogState>,
    boxes: Query<Entity, With<DialogBox>>,
    mut texts: Query<&mut Text, With<DialogText>>,
) {
    if !dialog.active {
        for entity in &boxes {
            commands.entity(entity).despawn_recursive();
        }
        return;
    }

    let line = DIALOG_LINES.get(dialog.index).copied().unwrap_or("");
    if boxes.is_empty() {
        commands
            .spawn((
                DialogBox,
                Name::new("DialogBox"),
                NodeBundle {
                    style: Style {
                        position_type: PositionType::Absolute,
                        bottom: Val::Px(24.0),
                        left: Val::Percent(10.0),
                        width: Val::Percent(80.0),
                        padding: UiRect::all(Val::Px(12.0)),
                        ..default()
                    },
                    background_color: Color::srgba(0.0, 0.0, 0.0, 0.75).into(),
                    ..default()
                },
            ))
            .with_children(|parent| {
                parent.spawn((
                    DialogText,
                    TextBundle::from_section(
                        line,
                        TextStyle {
                            font_size: 18.0,
                            color: Color::WHITE,
                            ..default()
                        },
                    ),
                ));
            });
        return;
    }

    for mut text in &mut texts {
        if text.sections[0].value != line {
            text.sections[0].value = line.to_owned();
        }
    }
}

fn close_dialog_box(mut commands: Commands, boxes: Query<Entity, With<DialogBox>>) {
    for entity in &boxes {
        commands.entity(entity).despawn_recursive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interact_only_opens_in_range() {
        let mut dialog = DialogState::default();
        assert_eq!(dialog.interact(7), DialogStep::Ignored);
        assert!(!dialog.active);

        dialog.in_range = true;
        assert_eq!(dialog.interact(7), DialogStep::Opened);
        assert!(dialog.active);
        assert_eq!(dialog.index, 0);
    }

    #[test]
    fn conversation_steps_through_and_closes() {
        let mut dialog = DialogState {
            in_range: true,
            ..default()
        };
        assert_eq!(dialog.interact(3), DialogStep::Opened);
        assert_eq!(dialog.interact(3), DialogStep::Advanced);
        assert_eq!(dialog.interact(3), DialogStep::Advanced);
        assert_eq!(dialog.index, 2);

        // Past the last line the next press ends the conversation.
        assert_eq!(dialog.interact(3), DialogStep::Closed);
        assert!(!dialog.active);
        assert_eq!(dialog.index, 0);

        // Still in range, so it can be reopened from the start.
        assert_eq!(dialog.interact(3), DialogStep::Opened);
        assert_eq!(dialog.index, 0);
    }

    #[test]
    fn walking_away_drops_the_conversation() {
        let mut dialog = DialogState {
            in_range: true,
            ..default()
        };
        dialog.interact(7);
        dialog.interact(7);
        assert!(dialog.active);

        dialog.leave_range();
        assert!(!dialog.active);
        assert!(!dialog.in_range);
        assert_eq!(dialog.interact(7), DialogStep::Ignored);
    }
}
