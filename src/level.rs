//! LDtk level orchestration: loads the project for the configured level, caches its metadata, and
//! extracts the named object layers into a [`LevelLayout`] that the gameplay spawners consume.
//!
//! Layer contract: `player` holds the required `spawn` point; a level without one is a fatal
//! setup error and never enters play. `enemyspawn`, `springspawn`,
//! `blockspawn`, `coin`, `keys`, `nextlevel`, `boss`, `movingland`, `movinglandup` and `snake`
//! are all optional; absent layers are skipped with a warning and the level runs without that
//! feature.

use bevy::asset::LoadState;
use bevy::math::IVec2;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_ecs_ldtk::ldtk::{EntityInstance, FieldValue, LayerInstance};
use bevy_ecs_ldtk::prelude::*;
use bevy_ecs_ldtk::utils::ldtk_pixel_coords_to_translation;
use bevy_ecs_ldtk::LevelIid;

use crate::platform::PlatformAxis;
use crate::progression::KeySlot;
use crate::state::GameState;

/// Registers LDtk asset plumbing, layout extraction, and camera synchronisation.
pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(LevelConfig::default())
            .init_resource::<LevelAssets>()
            .init_resource::<LevelLayout>()
            .insert_resource(LevelSelection::index(0))
            .insert_resource(LdtkSettings {
                level_spawn_behavior: LevelSpawnBehavior::UseWorldTranslation {
                    load_level_neighbors: false,
                },
                set_clear_color: SetClearColor::FromLevelBackground,
                ..default()
            })
            .add_plugins(LdtkPlugin)
            .init_resource::<LevelPopulated>()
            .add_systems(
                OnEnter(GameState::Loading),
                (despawn_level_entities, spawn_world).chain(),
            )
            .add_systems(
                OnEnter(GameState::Playing),
                mark_populated.after(LevelSpawnSet),
            )
            .add_systems(OnEnter(GameState::GameOver), despawn_level_entities)
            .add_systems(
                Update,
                monitor_level_loading.run_if(in_state(GameState::Loading)),
            )
            .add_systems(
                PostUpdate,
                (
                    cache_level_transform,
                    sync_level_spatial.after(cache_level_transform),
                ),
            );
    }
}

/// The four stages of the campaign, in progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelId {
    Meadow,
    Hollow,
    Ridge,
    Keep,
}

impl LevelId {
    pub fn project_path(self) -> &'static str {
        match self {
            LevelId::Meadow => "levels/meadow.ldtk",
            LevelId::Hollow => "levels/hollow.ldtk",
            LevelId::Ridge => "levels/ridge.ldtk",
            LevelId::Keep => "levels/keep.ldtk",
        }
    }

    /// Parses an exit's `destination` field.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "meadow" => Some(LevelId::Meadow),
            "hollow" => Some(LevelId::Hollow),
            "ridge" => Some(LevelId::Ridge),
            "keep" => Some(LevelId::Keep),
            _ => None,
        }
    }
}

/// Which level to load next and how to frame it. Rewritten by the transition
/// orchestrator before it flips the state back to `Loading`.
#[derive(Resource, Clone)]
pub struct LevelConfig {
    pub level: LevelId,
    pub tile_size: f32,
    pub camera_zoom: f32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            level: LevelId::Meadow,
            tile_size: 16.0,
            camera_zoom: 0.5,
        }
    }
}

/// Mirror of the currently loaded level's metadata. Optional fields become `Some` once assets are
/// available. Other systems (camera/collision) read this without owning the LDtk structures.
#[derive(Resource, Default)]
pub struct LevelAssets {
    pub project: Option<Handle<LdtkProject>>,
    pub level_identifier: Option<String>,
    pub level_iid: Option<String>,
    pub level_origin: Option<Vec2>,
    pub level_size: Option<Vec2>,
    pub level_center: Option<Vec2>,
}

/// Marker on the LDtk world entity so we can despawn it before loading another level.
#[derive(Component)]
pub struct LevelRoot;

/// Marker for every gameplay entity owned by the current level instance
/// (player, enemies, platforms, pickups, triggers, HUD). Swapping levels or
/// ending the run despawns them wholesale.
#[derive(Component)]
pub struct LevelEntity;

/// Set containing every `OnEnter(Playing)` gameplay spawner. Needed because
/// `Playing` is also re-entered when a pause ends; [`LevelPopulated`] flips
/// after the set so the spawners run once per level instance.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelSpawnSet;

/// Whether the current level instance already has its gameplay entities.
#[derive(Resource, Default)]
pub struct LevelPopulated(pub bool);

fn mark_populated(mut populated: ResMut<LevelPopulated>) {
    populated.0 = true;
}

/// Held direction required for an exit to fire while overlapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    DownHeld,
    UpHeld,
}

/// What a hittable block pops when bumped from below.
#[derive(Debug, Clone, Copy)]
pub enum BlockReward {
    Coin,
    Key(KeySlot),
}

#[derive(Debug, Clone, Copy)]
pub struct BlockSpawn {
    pub position: Vec2,
    pub reward: BlockReward,
}

#[derive(Debug, Clone, Copy)]
pub struct CoinSpawn {
    pub id: i32,
    pub position: Vec2,
}

#[derive(Debug, Clone, Copy)]
pub struct KeySpawn {
    pub position: Vec2,
    pub slot: KeySlot,
}

#[derive(Debug, Clone, Copy)]
pub struct ExitSpawn {
    pub rect: Rect,
    pub destination: LevelId,
    pub requires: Option<KeySlot>,
    pub action: ExitAction,
    /// Fixed world position the destination level places the player at.
    pub entry: Option<Vec2>,
    /// Carry the player's own coordinates across instead; used by exits that
    /// return into a larger level at the spot the player left from.
    pub keep_position: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PlatformPath {
    pub start: Vec2,
    pub end: Vec2,
    pub axis: PlatformAxis,
}

#[derive(Debug, Clone, Copy)]
pub struct SnakePivot {
    pub index: i32,
    pub position: Vec2,
}

#[derive(Debug, Clone, Copy)]
pub struct BossLayout {
    pub spawn: Vec2,
    pub trigger: Rect,
}

/// Everything the gameplay spawners need from the level's object layers,
/// already converted into world coordinates.
#[derive(Resource, Default)]
pub struct LevelLayout {
    pub player_spawn: Option<Vec2>,
    pub enemy_spawns: Vec<Vec2>,
    pub spring_spawns: Vec<Vec2>,
    pub block_spawns: Vec<BlockSpawn>,
    pub coin_spawns: Vec<CoinSpawn>,
    pub key_spawns: Vec<KeySpawn>,
    pub exits: Vec<ExitSpawn>,
    pub platform_paths: Vec<PlatformPath>,
    pub snake_pivots: Vec<SnakePivot>,
    pub boss: Option<BossLayout>,
}

/// Fatal problems that keep a level from entering play.
#[derive(Debug)]
pub enum SetupError {
    /// The project was saved with external level files; layer data is unavailable.
    MissingLayerData,
    MissingPlayerSpawn,
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::MissingLayerData => write!(f, "level has no embedded layer data"),
            SetupError::MissingPlayerSpawn => {
                write!(f, "required 'player' layer has no 'spawn' point")
            }
        }
    }
}

fn despawn_level_entities(mut commands: Commands, query: Query<Entity, With<LevelEntity>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

fn spawn_world(
    mut commands: Commands,
    world: Query<Entity, With<LevelRoot>>,
    asset_server: Res<AssetServer>,
    config: Res<LevelConfig>,
    mut level_assets: ResMut<LevelAssets>,
    mut selection: ResMut<LevelSelection>,
    mut populated: ResMut<LevelPopulated>,
) {
    for entity in &world {
        commands.entity(entity).despawn_recursive();
    }
    populated.0 = false;

    let project_handle: Handle<LdtkProject> =
        asset_server.load(config.level.project_path().to_owned());
    *level_assets = LevelAssets {
        project: Some(project_handle.clone()),
        ..default()
    };
    *selection = LevelSelection::index(0);

    commands.spawn((
        LevelRoot,
        Name::new("LevelRoot"),
        LdtkWorldBundle {
            ldtk_handle: project_handle,
            ..default()
        },
    ));
}

fn monitor_level_loading(
    asset_server: Res<AssetServer>,
    mut level_assets: ResMut<LevelAssets>,
    mut layout: ResMut<LevelLayout>,
    projects: Res<Assets<LdtkProject>>,
    config: Res<LevelConfig>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(project_handle) = level_assets.project.as_ref() else {
        return;
    };

    match asset_server.get_load_state(project_handle.id()) {
        Some(LoadState::Loaded) => {
            let Some(project) = projects.get(project_handle) else {
                return;
            };
            let Some(level) = project.json_data().levels.first() else {
                error!(
                    "LDtk project '{}' contains no levels; level cannot run.",
                    config.level.project_path()
                );
                return;
            };

            let origin = ldtk_pixel_coords_to_translation(
                IVec2::new(level.world_x, level.world_y + level.px_hei),
                0,
            );
            let size = Vec2::new(level.px_wid as f32, level.px_hei as f32);

            level_assets.level_identifier = Some(level.identifier.clone());
            level_assets.level_iid = Some(level.iid.clone());
            level_assets.level_origin = Some(origin);
            level_assets.level_size = Some(size);
            level_assets.level_center = Some(origin + size * 0.5);

            match extract_layout(level, origin) {
                Ok(extracted) => {
                    *layout = extracted;
                    next_state.set(GameState::Playing);
                }
                Err(err) => {
                    // Fatal: report and leave the level non-functional rather than crash.
                    error!(
                        "Setup failed for '{}': {err}. The level will not start.",
                        config.level.project_path()
                    );
                }
            }
        }
        Some(LoadState::Failed(_)) => {
            error!(
                "Unable to load LDtk project at '{}'; the level will not start.",
                config.level.project_path()
            );
        }
        _ => {}
    }
}

/// Converts an entity's pixel rect (top-left based, y-down) into a world-space center.
fn entity_center(origin: Vec2, level_px_hei: i32, entity: &EntityInstance) -> Vec2 {
    origin
        + Vec2::new(
            entity.px.x as f32 + entity.width as f32 * 0.5,
            (level_px_hei - entity.px.y) as f32 - entity.height as f32 * 0.5,
        )
}

fn field_str<'a>(entity: &'a EntityInstance, name: &str) -> Option<&'a str> {
    entity.field_instances.iter().find_map(|field| {
        if field.identifier != name {
            return None;
        }
        match &field.value {
            FieldValue::String(value) => value.as_deref(),
            _ => None,
        }
    })
}

fn field_int(entity: &EntityInstance, name: &str) -> Option<i32> {
    entity.field_instances.iter().find_map(|field| {
        if field.identifier != name {
            return None;
        }
        match field.value {
            FieldValue::Int(value) => value,
            _ => None,
        }
    })
}

fn field_bool(entity: &EntityInstance, name: &str) -> Option<bool> {
    entity.field_instances.iter().find_map(|field| {
        if field.identifier != name {
            return None;
        }
        match field.value {
            FieldValue::Bool(value) => Some(value),
            _ => None,
        }
    })
}

fn key_slot_from_int(value: i32) -> KeySlot {
    if value == 2 {
        KeySlot::Two
    } else {
        KeySlot::One
    }
}

fn extract_layout(
    level: &bevy_ecs_ldtk::ldtk::Level,
    origin: Vec2,
) -> Result<LevelLayout, SetupError> {
    let layers: &Vec<LayerInstance> = level
        .layer_instances
        .as_ref()
        .ok_or(SetupError::MissingLayerData)?;
    let px_hei = level.px_hei;
    let center = |entity: &EntityInstance| entity_center(origin, px_hei, entity);

    let mut layout = LevelLayout::default();
    let mut platform_points: Vec<(PlatformAxis, Vec2, Vec2)> = Vec::new();

    let find_layer = |name: &str| layers.iter().find(|layer| layer.identifier == name);

    match find_layer("player") {
        Some(layer) => {
            layout.player_spawn = layer
                .entity_instances
                .iter()
                .find(|e| e.identifier == "spawn")
                .map(center);
        }
        None => return Err(SetupError::MissingPlayerSpawn),
    }
    if layout.player_spawn.is_none() {
        return Err(SetupError::MissingPlayerSpawn);
    }

    if let Some(layer) = find_layer("enemyspawn") {
        layout.enemy_spawns = layer.entity_instances.iter().map(center).collect();
    } else {
        warn!("No 'enemyspawn' layer; level runs without enemies.");
    }

    if let Some(layer) = find_layer("springspawn") {
        layout.spring_spawns = layer.entity_instances.iter().map(center).collect();
    }

    if let Some(layer) = find_layer("blockspawn") {
        for entity in &layer.entity_instances {
            let reward = match entity.identifier.as_str() {
                "itemblock" => BlockReward::Key(key_slot_from_int(
                    field_int(entity, "slot").unwrap_or(1),
                )),
                _ => BlockReward::Coin,
            };
            layout.block_spawns.push(BlockSpawn {
                position: center(entity),
                reward,
            });
        }
    }

    if let Some(layer) = find_layer("coin") {
        for (index, entity) in layer.entity_instances.iter().enumerate() {
            layout.coin_spawns.push(CoinSpawn {
                id: field_int(entity, "id").unwrap_or(index as i32),
                position: center(entity),
            });
        }
    }

    if let Some(layer) = find_layer("keys") {
        for entity in &layer.entity_instances {
            layout.key_spawns.push(KeySpawn {
                position: center(entity),
                slot: key_slot_from_int(field_int(entity, "slot").unwrap_or(1)),
            });
        }
    }

    if let Some(layer) = find_layer("nextlevel") {
        for entity in &layer.entity_instances {
            let Some(destination) =
                field_str(entity, "destination").and_then(LevelId::from_name)
            else {
                warn!(
                    "Exit '{}' has no valid destination field; skipping it.",
                    entity.identifier
                );
                continue;
            };
            let action = match field_str(entity, "action") {
                Some("up") => ExitAction::UpHeld,
                _ => ExitAction::DownHeld,
            };
            let requires = field_int(entity, "requires").and_then(|v| match v {
                1 => Some(KeySlot::One),
                2 => Some(KeySlot::Two),
                _ => None,
            });
            let entry = match (field_int(entity, "entry_x"), field_int(entity, "entry_y")) {
                (Some(x), Some(y)) => Some(Vec2::new(x as f32, y as f32)),
                _ => None,
            };
            layout.exits.push(ExitSpawn {
                rect: Rect::from_center_size(
                    center(entity),
                    Vec2::new(entity.width as f32, entity.height as f32),
                ),
                destination,
                requires,
                action,
                entry,
                keep_position: field_bool(entity, "keep_position").unwrap_or(false),
            });
        }
    }

    for (layer_name, axis) in [
        ("movingland", PlatformAxis::Horizontal),
        ("movinglandup", PlatformAxis::Vertical),
    ] {
        let Some(layer) = find_layer(layer_name) else {
            continue;
        };
        let start = layer
            .entity_instances
            .iter()
            .find(|e| e.identifier == "start")
            .map(center);
        let end = layer
            .entity_instances
            .iter()
            .find(|e| e.identifier == "end")
            .map(center);
        match (start, end) {
            (Some(start), Some(end)) => platform_points.push((axis, start, end)),
            _ => warn!("Layer '{layer_name}' is missing a 'start'/'end' pair; skipping it."),
        }
    }
    layout.platform_paths = platform_points
        .into_iter()
        .map(|(axis, start, end)| PlatformPath { start, end, axis })
        .collect();

    if let Some(layer) = find_layer("snake") {
        for entity in &layer.entity_instances {
            let Some(index) = entity
                .identifier
                .strip_prefix("point")
                .and_then(|digits| digits.parse::<i32>().ok())
            else {
                continue;
            };
            layout.snake_pivots.push(SnakePivot {
                index,
                position: center(entity),
            });
        }
    }

    if let Some(layer) = find_layer("boss") {
        let spawn = layer
            .entity_instances
            .iter()
            .find(|e| e.identifier == "spawn")
            .map(center);
        let trigger = layer
            .entity_instances
            .iter()
            .find(|e| e.identifier == "trigger");
        match (spawn, trigger) {
            (Some(spawn), Some(trigger_entity)) => {
                layout.boss = Some(BossLayout {
                    spawn,
                    trigger: Rect::from_center_size(
                        center(trigger_entity),
                        Vec2::new(trigger_entity.width as f32, trigger_entity.height as f32),
                    ),
                });
            }
            _ => warn!("Boss layer present but missing 'spawn' or 'trigger'; no encounter."),
        }
    }

    Ok(layout)
}

fn cache_level_transform(
    mut level_assets: ResMut<LevelAssets>,
    level_query: Query<(&GlobalTransform, &LevelIid), Added<LevelIid>>,
) {
    // When LDtk instantiates a level entity, capture its world transform so other systems know
    // where the level origin sits in Bevy coordinates.
    for (transform, iid) in &level_query {
        let matches_current_level = level_assets
            .level_iid
            .as_ref()
            .map(|target| target == iid.get())
            .unwrap_or(true);

        if matches_current_level {
            let origin = transform.translation().truncate();
            level_assets.level_origin = Some(origin);

            if let Some(size) = level_assets.level_size {
                level_assets.level_center = Some(origin + size * 0.5);
            }
        }
    }
}

pub fn sync_level_spatial(
    level_assets: Res<LevelAssets>,
    config: Res<LevelConfig>,
    mut camera_query: Query<(&mut Transform, &mut OrthographicProjection), With<Camera2d>>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    if !level_assets.is_changed() {
        return;
    }

    let (Some(center), Some(size)) = (level_assets.level_center, level_assets.level_size) else {
        return;
    };

    let Ok((mut camera_transform, mut projection)) = camera_query.get_single_mut() else {
        return;
    };

    if let Ok(window) = windows.get_single() {
        let window_size = window.resolution.size();
        if window_size.x > 0.0 && window_size.y > 0.0 {
            let width_ratio = size.x / window_size.x;
            let height_ratio = size.y / window_size.y;
            let base_scale = width_ratio.max(height_ratio).max(0.0001);
            projection.scale = (base_scale * config.camera_zoom).max(0.0001);
        }
    }

    camera_transform.translation.x = center.x;
    camera_transform.translation.y = center.y;
}
