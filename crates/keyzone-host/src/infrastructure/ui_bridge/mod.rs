//! UI command bridge: exposes application-layer operations to a GUI.
//!
//! Every function here takes the shared [`AppState`] and returns a
//! [`CommandResult`].  A GUI shell (Tauri, egui, a local HTTP server) only
//! needs to route its command names to these functions; the mapping pipeline
//! itself never imports this module.
//!
//! # What the GUI can do (for beginners)
//!
//! - **Zones** – list, create, edit, delete and reorder zones.  The GUI holds
//!   a zone *id*, never the zone itself; every edit goes through the engine so
//!   invariants (unique keys, clamped ranges) are enforced in one place.
//! - **Aliases** – create, rename and remove alias names, bind a device
//!   directly, or run the "press a key on each device" wizard.
//! - **MIDI output** – enumerate devices, pick one, change delay mode and the
//!   pitch-bend range.
//! - **Learning** – capture keys into a zone, or learn a new MIDI-mode hot-key.
//! - **Persistence** – write everything back to `config.toml`.
//!
//! # Data Transfer Objects (DTOs)
//!
//! [`ZoneDto`] and [`SettingsDto`] contain only JSON-friendly fields and derive
//! `Serialize`/`Deserialize`, so a frontend can exchange them as JSON.
//!
//! # `CommandResult<T>` wrapper
//!
//! All commands return `CommandResult<T>` rather than `Result<T, E>`, so every
//! response has the same shape: `{ success: bool, data: T | null, error: string | null }`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, RwLock};

use keyzone_core::{key_code_from_name, key_name, DeviceId, KeyCode, LayoutStrategy, ScaleType, Zone, ZoneId};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::application::{
    assign_devices::DeviceAssignmentSession,
    dispatch_midi::{Clock, MidiDispatcher, MidiOutputPort},
    manage_aliases::DeviceAliasRegistry,
    map_input::{LearnMode, ZoneMappingEngine},
    settings::{RuntimeSettings, SettingsStore},
};
use crate::infrastructure::{
    input_capture::{EventFanout, InputListener},
    storage::config::{save_config_to, AppConfig},
};

// ── Shared application state ──────────────────────────────────────────────────

/// Everything the GUI and the binary share.
///
/// `config` is the last loaded or saved file content and sits behind an async
/// mutex because commands run on the Tokio runtime.  The engine and the alias
/// registry use `std::sync` locks: they are also taken on the input thread,
/// which is not async.
pub struct AppState {
    pub config: Mutex<AppConfig>,
    pub config_path: PathBuf,
    pub engine: Arc<StdMutex<ZoneMappingEngine>>,
    pub aliases: Arc<RwLock<DeviceAliasRegistry>>,
    pub settings: SettingsStore,
    pub dispatcher: MidiDispatcher,
    pub fanout: Arc<EventFanout>,
    wizard: StdMutex<Option<Arc<DeviceAssignmentSession>>>,
}

impl AppState {
    /// Builds the whole pipeline from a loaded configuration.
    ///
    /// The engine is registered on `fanout` as its first listener.  If the
    /// configuration names an output device that still exists it is reopened.
    pub fn build(
        config: AppConfig,
        config_path: PathBuf,
        port: Box<dyn MidiOutputPort>,
        clock: Arc<dyn Clock>,
        runtime: Option<Handle>,
    ) -> Arc<Self> {
        let settings = SettingsStore::new(config.runtime_settings());
        let dispatcher = MidiDispatcher::new(port, clock, settings.subscribe(), runtime);
        let aliases = Arc::new(RwLock::new(DeviceAliasRegistry::with_aliases(
            config.aliases.iter().cloned(),
        )));

        let mut engine = ZoneMappingEngine::new(
            config.zone_manager(),
            Arc::clone(&aliases),
            dispatcher.clone(),
            settings.subscribe(),
        );
        engine.set_toggle_key(config.general.toggle_key);
        engine.set_pointer_cc(config.pointer_cc_map());
        let engine = Arc::new(StdMutex::new(engine));

        let fanout = Arc::new(EventFanout::new());
        let listener: Arc<dyn InputListener> = Arc::clone(&engine) as Arc<dyn InputListener>;
        fanout.add_listener(&listener);

        if let Some(name) = &config.midi.output_device {
            if dispatcher.set_output_device_by_name(name).is_none() {
                warn!(device = %name, "configured MIDI output not available");
            }
        }

        Arc::new(Self {
            config: Mutex::new(config),
            config_path,
            engine,
            aliases,
            settings,
            dispatcher,
            fanout,
            wizard: StdMutex::new(None),
        })
    }

    pub fn engine(&self) -> MutexGuard<'_, ZoneMappingEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Silences everything and delivers pending delayed messages.
    pub fn panic_and_flush(&self) {
        self.engine().release_all_notes();
        self.dispatcher.all_notes_off();
        self.dispatcher.flush_all();
    }

    fn wizard(&self) -> MutexGuard<'_, Option<Arc<DeviceAssignmentSession>>> {
        self.wizard.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Data Transfer Objects ─────────────────────────────────────────────────────

/// A zone as exchanged with the GUI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoneDto {
    /// Ignored on create.
    #[serde(default)]
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub layer: i32,
    pub target_alias: String,
    pub scale: ScaleType,
    pub root_note: i32,
    #[serde(default)]
    pub chromatic_offset: i32,
    #[serde(default)]
    pub degree_offset: i32,
    #[serde(default)]
    pub transpose_locked: bool,
    pub layout: LayoutStrategy,
    #[serde(default)]
    pub grid_interval: i32,
    #[serde(default)]
    pub grid_columns: u8,
    pub keys: Vec<KeyCode>,
    /// Display names of `keys`; output only.
    #[serde(default)]
    pub key_names: Vec<String>,
}

impl ZoneDto {
    pub fn from_zone(id: ZoneId, zone: &Zone) -> Self {
        Self {
            id: id.0,
            name: zone.name().to_string(),
            layer: i32::from(zone.layer()),
            target_alias: zone.target_alias().to_string(),
            scale: zone.scale(),
            root_note: i32::from(zone.root_note()),
            chromatic_offset: i32::from(zone.chromatic_offset()),
            degree_offset: i32::from(zone.degree_offset()),
            transpose_locked: zone.is_transpose_locked(),
            layout: zone.layout(),
            grid_interval: i32::from(zone.grid_interval()),
            grid_columns: zone.grid_columns(),
            keys: zone.input_key_codes().to_vec(),
            key_names: zone.input_key_codes().iter().map(|c| key_name(*c)).collect(),
        }
    }

    /// Writes every editable field through the zone's clamping setters.
    pub fn apply_to(&self, zone: &mut Zone) {
        zone.set_name(self.name.clone());
        zone.set_layer(self.layer);
        zone.set_target_alias(&self.target_alias);
        zone.set_scale(self.scale);
        zone.set_root_note(self.root_note);
        zone.set_chromatic_offset(self.chromatic_offset);
        zone.set_degree_offset(self.degree_offset);
        zone.set_transpose_locked(self.transpose_locked);
        zone.set_layout(self.layout);
        zone.set_grid_interval(self.grid_interval);
        zone.set_grid_columns(self.grid_columns);
        zone.set_keys(self.keys.iter().copied());
    }
}

/// Runtime MIDI settings as shown in the GUI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsDto {
    pub version: u64,
    pub midi_channel: u8,
    pub pitch_bend_range: u8,
    pub delay_enabled: bool,
    pub delay_seconds: u8,
    pub midi_mode: bool,
    pub toggle_key: KeyCode,
    pub toggle_key_name: String,
    pub output_device: Option<String>,
}

/// Unified response wrapper used by every command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

impl<T: Serialize, E: std::fmt::Display> From<Result<T, E>> for CommandResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

// ── Zone commands ─────────────────────────────────────────────────────────────

/// Returns every zone in matching order.
pub async fn get_zones(state: Arc<AppState>) -> CommandResult<Vec<ZoneDto>> {
    let engine = state.engine();
    let zones = engine
        .zones()
        .iter()
        .map(|(id, zone)| ZoneDto::from_zone(id, zone))
        .collect();
    CommandResult::ok(zones)
}

/// Appends a zone built from `dto`.  Returns its id.
pub async fn add_zone(state: Arc<AppState>, dto: ZoneDto) -> CommandResult<u32> {
    let mut zone = Zone::new(dto.name.clone());
    dto.apply_to(&mut zone);
    let id = state.engine().add_zone(zone);
    CommandResult::ok(id.0)
}

pub async fn update_zone(state: Arc<AppState>, id: u32, dto: ZoneDto) -> CommandResult<ZoneDto> {
    let mut engine = state.engine();
    let id = ZoneId(id);
    let result = engine.update_zone(id, |zone| {
        dto.apply_to(zone);
        ZoneDto::from_zone(id, zone)
    });
    result.into()
}

pub async fn remove_zone(state: Arc<AppState>, id: u32) -> CommandResult<()> {
    state.engine().remove_zone(ZoneId(id)).map(|_| ()).into()
}

/// Moves a zone to `index` in matching order.
pub async fn move_zone(state: Arc<AppState>, id: u32, index: usize) -> CommandResult<()> {
    state.engine().move_zone(ZoneId(id), index).into()
}

/// Shifts every unlocked zone by `semitones`.
pub async fn transpose(state: Arc<AppState>, semitones: i32) -> CommandResult<()> {
    state.engine().transpose_zones(semitones);
    CommandResult::ok(())
}

/// Moves every unlocked zone `steps` degrees along its own scale.
pub async fn shift_zone_degrees(state: Arc<AppState>, steps: i32) -> CommandResult<()> {
    state.engine().shift_zone_degrees(steps);
    CommandResult::ok(())
}

/// Unbinds every key from a zone.
pub async fn clear_zone_keys(state: Arc<AppState>, id: u32) -> CommandResult<ZoneDto> {
    let mut engine = state.engine();
    let id = ZoneId(id);
    let result = engine.update_zone(id, |zone| {
        zone.clear_keys();
        ZoneDto::from_zone(id, zone)
    });
    result.into()
}

// ── Alias commands ────────────────────────────────────────────────────────────

/// Wildcard first, then user aliases in order.
pub async fn get_aliases(state: Arc<AppState>) -> CommandResult<Vec<String>> {
    let registry = state.aliases.read().unwrap_or_else(PoisonError::into_inner);
    CommandResult::ok(registry.all_alias_names())
}

pub async fn create_alias(state: Arc<AppState>, name: String) -> CommandResult<()> {
    let mut registry = state.aliases.write().unwrap_or_else(PoisonError::into_inner);
    registry.create_alias(&name).into()
}

/// Renames an alias; zones targeting it follow.
pub async fn rename_alias(state: Arc<AppState>, from: String, to: String) -> CommandResult<()> {
    let renamed = state
        .aliases
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .rename_alias(&from, &to);
    if let Err(e) = renamed {
        return CommandResult::err(e.to_string());
    }
    state.engine().retarget_alias(&from, to.trim());
    CommandResult::ok(())
}

pub async fn remove_alias(state: Arc<AppState>, name: String) -> CommandResult<()> {
    let mut registry = state.aliases.write().unwrap_or_else(PoisonError::into_inner);
    registry.remove_alias(&name).into()
}

/// Binds a device to an alias directly, bypassing the wizard.
pub async fn assign_hardware(state: Arc<AppState>, alias: String, device: u64) -> CommandResult<()> {
    let mut registry = state.aliases.write().unwrap_or_else(PoisonError::into_inner);
    registry.assign_hardware(&alias, DeviceId(device)).into()
}

/// Starts the device-assignment wizard over `targets` (every user alias when empty).
///
/// Returns the first alias waiting for a key press.  A wizard already running is cancelled.
pub async fn start_device_assignment(
    state: Arc<AppState>,
    targets: Vec<String>,
) -> CommandResult<Option<String>> {
    let targets = if targets.is_empty() {
        let registry = state.aliases.read().unwrap_or_else(PoisonError::into_inner);
        registry.user_aliases().to_vec()
    } else {
        targets
    };

    let mut wizard = state.wizard();
    if let Some(previous) = wizard.take() {
        previous.cancel();
    }
    let session =
        DeviceAssignmentSession::start(targets, Arc::clone(&state.aliases), &state.fanout);
    let first = session.current_target();
    *wizard = Some(session);
    CommandResult::ok(first)
}

/// Alias the wizard is waiting for, or `None` when no wizard is running.
pub async fn get_assignment_target(state: Arc<AppState>) -> CommandResult<Option<String>> {
    let wizard = state.wizard();
    CommandResult::ok(wizard.as_ref().and_then(|session| session.current_target()))
}

pub async fn cancel_device_assignment(state: Arc<AppState>) -> CommandResult<()> {
    if let Some(session) = state.wizard().take() {
        session.cancel();
    }
    CommandResult::ok(())
}

// ── MIDI output commands ──────────────────────────────────────────────────────

pub async fn get_output_devices(state: Arc<AppState>) -> CommandResult<Vec<String>> {
    CommandResult::ok(state.dispatcher.device_names())
}

/// Opens entry `index` of the last device listing.  Out of range changes nothing.
pub async fn set_output_device(state: Arc<AppState>, index: usize) -> CommandResult<Option<String>> {
    let opened = state.dispatcher.set_output_device(index);
    if let Some(name) = &opened {
        state.config.lock().await.midi.output_device = Some(name.clone());
    }
    CommandResult::ok(opened)
}

pub async fn get_settings(state: Arc<AppState>) -> CommandResult<SettingsDto> {
    CommandResult::ok(settings_dto(&state))
}

/// Seconds are clamped to 1–10.
pub async fn set_delay(state: Arc<AppState>, enabled: bool, seconds: i32) -> CommandResult<SettingsDto> {
    state.settings.update(|s| {
        s.delay_enabled = enabled;
        s.delay_seconds = seconds.clamp(1, 10) as u8;
    });
    if !enabled {
        // Anything still waiting is delivered now rather than dropped.
        state.dispatcher.flush_all();
    }
    CommandResult::ok(settings_dto(&state))
}

/// Clamped to 1–96.  The new range is sent to the open device.
pub async fn set_pitch_bend_range(state: Arc<AppState>, semitones: i32) -> CommandResult<SettingsDto> {
    state.settings.set_pitch_bend_range(semitones);
    let current = state.settings.current();
    state
        .dispatcher
        .send_pitch_bend_range_rpn(current.midi_channel, current.pitch_bend_range);
    CommandResult::ok(settings_dto(&state))
}

pub async fn set_midi_channel(state: Arc<AppState>, channel: i32) -> CommandResult<SettingsDto> {
    state.engine().release_all_notes();
    state.settings.set_midi_channel(channel);
    CommandResult::ok(settings_dto(&state))
}

pub async fn set_midi_mode(state: Arc<AppState>, enabled: bool) -> CommandResult<()> {
    state.engine().set_midi_mode(enabled);
    CommandResult::ok(())
}

// ── Learn commands ────────────────────────────────────────────────────────────

pub async fn begin_key_capture(state: Arc<AppState>, zone: u32) -> CommandResult<()> {
    state.engine().begin_key_capture(ZoneId(zone)).into()
}

/// Returns the zone that was capturing, if any.
pub async fn end_key_capture(state: Arc<AppState>) -> CommandResult<Option<u32>> {
    CommandResult::ok(state.engine().end_key_capture().map(|id| id.0))
}

pub async fn begin_toggle_key_learn(state: Arc<AppState>) -> CommandResult<()> {
    state.engine().begin_toggle_key_learn();
    CommandResult::ok(())
}

/// `"idle"`, `"capture"` or `"toggle_key"`.
pub async fn get_learn_mode(state: Arc<AppState>) -> CommandResult<String> {
    let mode = match state.engine().learn_mode() {
        LearnMode::Idle => "idle",
        LearnMode::KeyCapture(_) => "capture",
        LearnMode::ToggleKey => "toggle_key",
    };
    CommandResult::ok(mode.to_string())
}

pub async fn get_key_name(code: KeyCode) -> CommandResult<String> {
    CommandResult::ok(key_name(code))
}

/// Rebinds the MIDI-mode hot-key by display name, e.g. `"F12"`.  Returns its code.
pub async fn set_toggle_key(state: Arc<AppState>, name: String) -> CommandResult<KeyCode> {
    let Some(code) = key_code_from_name(&name) else {
        return CommandResult::err(format!("unknown key name: {name}"));
    };
    state.engine().set_toggle_key(code);
    info!(code, key = %name, "toggle key set");
    CommandResult::ok(code)
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Writes aliases, zones and settings to the config file.
pub async fn save_settings(state: Arc<AppState>) -> CommandResult<()> {
    let mut config = state.config.lock().await;
    config.aliases = state
        .aliases
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .user_aliases()
        .to_vec();
    {
        let engine = state.engine();
        config.apply_zones(engine.zones());
        config.general.toggle_key = engine.toggle_key();
    }
    config.apply_runtime_settings(&state.settings.current());
    if let Some(device) = state.dispatcher.current_device() {
        config.midi.output_device = Some(device);
    }

    if let Err(e) = save_config_to(&state.config_path, &config) {
        return CommandResult::err(format!("failed to save config: {e}"));
    }
    info!(path = %state.config_path.display(), "configuration saved");
    CommandResult::ok(())
}

fn settings_dto(state: &AppState) -> SettingsDto {
    let RuntimeSettings {
        version,
        midi_channel,
        pitch_bend_range,
        delay_enabled,
        delay_seconds,
    } = state.settings.current();
    let (midi_mode, toggle_key) = {
        let engine = state.engine();
        (engine.is_midi_mode(), engine.toggle_key())
    };
    SettingsDto {
        version,
        midi_channel,
        pitch_bend_range,
        delay_enabled,
        delay_seconds,
        midi_mode,
        toggle_key,
        toggle_key_name: key_name(toggle_key),
        output_device: state.dispatcher.current_device(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatch_midi::ManualClock;
    use crate::infrastructure::midi_output::RecordingOutputPort;
    use crate::infrastructure::storage::config::load_config_from;
    use keyzone_core::ANY_ALIAS;

    /// Creates an AppState that writes only inside a temporary directory.
    fn make_state(dir: &tempfile::TempDir) -> (Arc<AppState>, RecordingOutputPort) {
        let port = RecordingOutputPort::with_ports(["Synth A", "Synth B"]);
        let state = AppState::build(
            AppConfig::default(),
            dir.path().join("config.toml"),
            Box::new(port.clone()),
            Arc::new(ManualClock::default()),
            None,
        );
        (state, port)
    }

    fn dto(name: &str, keys: &[KeyCode]) -> ZoneDto {
        ZoneDto {
            id: 0,
            name: name.to_string(),
            layer: 0,
            target_alias: ANY_ALIAS.to_string(),
            scale: ScaleType::Major,
            root_note: 60,
            chromatic_offset: 0,
            degree_offset: 0,
            transpose_locked: false,
            layout: LayoutStrategy::Linear,
            grid_interval: 5,
            grid_columns: 0,
            keys: keys.to_vec(),
            key_names: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_get_zones_returns_empty_list_initially() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);

        // Act
        let result = get_zones(state).await;

        // Assert
        assert!(result.success);
        assert!(result.data.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_then_update_zone_clamps_fields() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);
        let id = add_zone(Arc::clone(&state), dto("Lead", &[0x41])).await.data.unwrap();
        let mut edit = dto("Lead", &[0x41, 0x41, 0x53]);
        edit.root_note = 300;

        // Act
        let result = update_zone(Arc::clone(&state), id, edit).await;

        // Assert
        let zone = result.data.unwrap();
        assert_eq!(zone.root_note, 127);
        assert_eq!(zone.keys, vec![0x41, 0x53]);
        assert_eq!(zone.key_names, vec!["A".to_string(), "S".to_string()]);
    }

    #[tokio::test]
    async fn test_update_unknown_zone_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);

        let result = update_zone(state, 99, dto("x", &[])).await;

        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_rename_alias_retargets_zones() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);
        create_alias(Arc::clone(&state), "Pad".to_string()).await;
        let mut zone = dto("Drums", &[0x41]);
        zone.target_alias = "Pad".to_string();
        add_zone(Arc::clone(&state), zone).await;

        // Act
        let result = rename_alias(Arc::clone(&state), "Pad".to_string(), "Drums".to_string()).await;

        // Assert
        assert!(result.success);
        let zones = get_zones(state).await.data.unwrap();
        assert_eq!(zones[0].target_alias, "Drums");
    }

    #[tokio::test]
    async fn test_set_output_device_out_of_range_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (state, port) = make_state(&dir);
        get_output_devices(Arc::clone(&state)).await;

        let result = set_output_device(Arc::clone(&state), 7).await;

        assert!(result.success);
        assert_eq!(result.data.unwrap(), None);
        assert_eq!(port.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_set_delay_clamps_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);

        let settings = set_delay(state, true, 42).await.data.unwrap();

        assert!(settings.delay_enabled);
        assert_eq!(settings.delay_seconds, 10);
    }

    #[tokio::test]
    async fn test_learn_mode_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);
        let id = add_zone(Arc::clone(&state), dto("Lead", &[])).await.data.unwrap();

        begin_key_capture(Arc::clone(&state), id).await;
        let capturing = get_learn_mode(Arc::clone(&state)).await.data.unwrap();
        begin_toggle_key_learn(Arc::clone(&state)).await;
        let learning = get_learn_mode(Arc::clone(&state)).await.data.unwrap();

        assert_eq!(capturing, "capture");
        assert_eq!(learning, "toggle_key");
    }

    #[tokio::test]
    async fn test_wizard_start_reports_first_target() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);
        create_alias(Arc::clone(&state), "Left".to_string()).await;
        create_alias(Arc::clone(&state), "Right".to_string()).await;

        let first = start_device_assignment(Arc::clone(&state), Vec::new()).await;

        assert_eq!(first.data.unwrap().as_deref(), Some("Left"));
        assert_eq!(state.fanout.listener_count(), 2);
        cancel_device_assignment(Arc::clone(&state)).await;
        assert_eq!(state.fanout.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_save_settings_writes_config_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);
        create_alias(Arc::clone(&state), "Pad".to_string()).await;
        add_zone(Arc::clone(&state), dto("Lead", &[0x41])).await;
        get_output_devices(Arc::clone(&state)).await;
        set_output_device(Arc::clone(&state), 1).await;
        set_pitch_bend_range(Arc::clone(&state), 12).await;

        // Act
        let result = save_settings(Arc::clone(&state)).await;

        // Assert
        assert!(result.success, "save failed: {:?}", result.error);
        let loaded = load_config_from(&state.config_path).unwrap();
        assert_eq!(loaded.aliases, vec!["Pad".to_string()]);
        assert_eq!(loaded.zones.len(), 1);
        assert_eq!(loaded.midi.pitch_bend_range, 12);
        assert_eq!(loaded.midi.output_device.as_deref(), Some("Synth B"));
    }

    #[tokio::test]
    async fn test_shift_zone_degrees_moves_along_scale() {
        // Arrange: C major, keys play C D E ...
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);
        let id = add_zone(Arc::clone(&state), dto("Lead", &[0x41, 0x53])).await.data.unwrap();

        // Act
        let result = shift_zone_degrees(Arc::clone(&state), 6).await;

        // Assert: degree 6 is B, degree 7 wraps to the next C
        assert!(result.success);
        let zones = get_zones(Arc::clone(&state)).await.data.unwrap();
        assert_eq!(zones[0].degree_offset, 6);
        let engine = state.engine();
        assert_eq!(engine.resolve(DeviceId(1), 0x41).unwrap().note, 71);
        assert_eq!(engine.resolve(DeviceId(1), 0x53).unwrap().note, 72);
        assert_eq!(engine.zone(ZoneId(id)).unwrap().degree_offset(), 6);
    }

    #[tokio::test]
    async fn test_clear_zone_keys_empties_key_list() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);
        let id = add_zone(Arc::clone(&state), dto("Lead", &[0x41, 0x53])).await.data.unwrap();

        let zone = clear_zone_keys(Arc::clone(&state), id).await.data.unwrap();

        assert!(zone.keys.is_empty());
        assert!(!clear_zone_keys(state, 99).await.success);
    }

    #[tokio::test]
    async fn test_set_toggle_key_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = make_state(&dir);

        let code = set_toggle_key(Arc::clone(&state), "Space".to_string()).await;
        let unknown = set_toggle_key(Arc::clone(&state), "Nope".to_string()).await;

        assert_eq!(code.data, Some(0x20));
        assert!(!unknown.success);
        assert_eq!(state.engine().toggle_key(), 0x20);
    }

    #[tokio::test]
    async fn test_get_key_name_falls_back_for_unknown_codes() {
        let result = get_key_name(0x0FFF).await;
        assert_eq!(result.data.unwrap(), "Unknown Key (4095)");
    }

    #[test]
    fn test_zone_dto_json_shape() {
        // Arrange: a frontend payload without the optional fields
        let json = r#"{
            "name": "Pad",
            "target_alias": "Any / Master",
            "scale": "PentatonicMinor",
            "root_note": 48,
            "layout": "Grid",
            "keys": [65, 83]
        }"#;

        // Act
        let parsed: ZoneDto = serde_json::from_str(json).expect("deserialize");
        let mut zone = Zone::new("tmp");
        parsed.apply_to(&mut zone);
        let back = serde_json::to_value(ZoneDto::from_zone(ZoneId(3), &zone)).expect("serialize");

        // Assert
        assert_eq!(zone.scale(), ScaleType::PentatonicMinor);
        assert_eq!(back["id"], 3);
        assert_eq!(back["key_names"][1], "S");
    }

    #[test]
    fn test_command_result_ok_sets_success_true() {
        let r: CommandResult<i32> = CommandResult::ok(42);
        assert!(r.success);
        assert_eq!(r.data.unwrap(), 42);
        assert!(r.error.is_none());
    }

    #[test]
    fn test_command_result_err_sets_success_false() {
        let r: CommandResult<i32> = CommandResult::err("something went wrong");
        assert!(!r.success);
        assert!(r.data.is_none());
        assert_eq!(r.error.unwrap(), "something went wrong");
    }
}
