//! Integration tests for the input-to-MIDI pipeline.
//!
//! These tests exercise keyzone-host end-to-end: native input injected through
//! `MockCaptureBackend` flows through the fan-out, the zone mapping engine and
//! the MIDI dispatcher into a `RecordingOutputPort`.

use std::sync::Arc;
use std::time::Duration;

use keyzone_core::{
    DeviceId, KeyCode, LayoutStrategy, MidiMessage, ScaleType, Zone, ANY_ALIAS, SCROLL_UP,
};
use keyzone_host::application::dispatch_midi::{Clock, ManualClock, TokioClock};
use keyzone_host::infrastructure::input_capture::mock::MockCaptureBackend;
use keyzone_host::infrastructure::input_capture::{InputCapture, NativeInput, WindowHandle};
use keyzone_host::infrastructure::midi_output::RecordingOutputPort;
use keyzone_host::infrastructure::storage::config::AppConfig;
use keyzone_host::infrastructure::ui_bridge::{self, AppState};

// ── Harness ───────────────────────────────────────────────────────────────────

struct Pipeline {
    state: Arc<AppState>,
    port: RecordingOutputPort,
    backend: MockCaptureBackend,
    _capture: InputCapture,
    _dir: tempfile::TempDir,
}

impl Pipeline {
    fn start(config: AppConfig, runtime: Option<tokio::runtime::Handle>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let port = RecordingOutputPort::with_ports(["Synth"]);
        let clock: Arc<dyn Clock> = match runtime {
            Some(_) => Arc::new(TokioClock::new()),
            None => Arc::new(ManualClock::default()),
        };
        let state = AppState::build(
            config,
            dir.path().join("config.toml"),
            Box::new(port.clone()),
            clock,
            runtime,
        );
        state.dispatcher.device_names();
        state.dispatcher.set_output_device(0).expect("output opens");
        port.clear_sent();

        let backend = MockCaptureBackend::new();
        let mut capture =
            InputCapture::with_fanout(Box::new(backend.clone()), Arc::clone(&state.fanout));
        capture.initialize(WindowHandle(0x1234)).expect("capture attaches");

        Self {
            state,
            port,
            backend,
            _capture: capture,
            _dir: dir,
        }
    }

    fn key(&self, device: u64, code: KeyCode, is_down: bool) {
        assert!(self.backend.inject(NativeInput::Key {
            device: DeviceId(device),
            code,
            is_down,
        }));
    }

    fn tap(&self, device: u64, code: KeyCode) {
        self.key(device, code, true);
        self.key(device, code, false);
    }
}

fn zone(name: &str, alias: &str, keys: &[KeyCode], root: i32) -> Zone {
    let mut z = Zone::new(name);
    z.set_target_alias(alias);
    z.set_keys(keys.iter().copied());
    z.set_root_note(root);
    z
}

fn config_with(aliases: &[&str], zones: Vec<Zone>) -> AppConfig {
    AppConfig {
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        zones,
        ..AppConfig::default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_wheel_tick_on_wildcard_zone_plays_and_releases_one_note() {
    // Arrange: device 7 is bound to "Pad", but only a wildcard zone listens to scroll-up
    let pipeline = Pipeline::start(
        config_with(
            &["Pad"],
            vec![
                zone("Pad keys", "Pad", &[0x41], 48),
                zone("Wheel", ANY_ALIAS, &[SCROLL_UP], 72),
            ],
        ),
        None,
    );
    pipeline
        .state
        .aliases
        .write()
        .unwrap()
        .assign_hardware("Pad", DeviceId(7))
        .unwrap();

    // Act
    pipeline.backend.inject(NativeInput::Wheel {
        device: DeviceId(7),
        delta: 120,
    });

    // Assert
    assert_eq!(
        pipeline.port.sent(),
        vec![MidiMessage::note_on(1, 72, 127), MidiMessage::note_off(1, 72)]
    );
}

#[test]
fn test_first_inserted_zone_wins_on_overlap() {
    let pipeline = Pipeline::start(
        config_with(
            &[],
            vec![
                zone("First", ANY_ALIAS, &[0x41], 60),
                zone("Second", ANY_ALIAS, &[0x41], 40),
            ],
        ),
        None,
    );

    pipeline.key(1, 0x41, true);

    assert_eq!(pipeline.port.sent(), vec![MidiMessage::note_on(1, 60, 127)]);
}

#[test]
fn test_aliased_zone_only_hears_bound_device() {
    // Arrange
    let pipeline = Pipeline::start(
        config_with(&["Left"], vec![zone("Left", "Left", &[0x41], 60)]),
        None,
    );
    pipeline
        .state
        .aliases
        .write()
        .unwrap()
        .assign_hardware("Left", DeviceId(1))
        .unwrap();

    // Act
    pipeline.tap(2, 0x41);
    pipeline.tap(1, 0x41);

    // Assert
    assert_eq!(
        pipeline.port.sent(),
        vec![MidiMessage::note_on(1, 60, 127), MidiMessage::note_off(1, 60)]
    );
}

#[test]
fn test_note_off_matches_note_on_after_zone_edit() {
    // Arrange
    let pipeline = Pipeline::start(
        config_with(&[], vec![zone("Lead", ANY_ALIAS, &[0x41, 0x53], 60)]),
        None,
    );
    let id = pipeline.state.engine().zones().ids()[0];
    pipeline.key(1, 0x53, true);

    // Act: transpose the zone while the key is held
    pipeline
        .state
        .engine()
        .update_zone(id, |z| {
            z.set_root_note(67);
            z.set_scale(ScaleType::Chromatic);
        })
        .unwrap();
    pipeline.key(1, 0x53, false);

    // Assert
    assert_eq!(
        pipeline.port.sent(),
        vec![MidiMessage::note_on(1, 62, 127), MidiMessage::note_off(1, 62)]
    );
}

#[test]
fn test_grid_rows_shift_by_interval_for_every_scale() {
    for scale in ScaleType::ALL {
        // Arrange: 3 keys -> 2 columns, so the third key starts row 1
        let mut grid = zone("Grid", ANY_ALIAS, &[0x31, 0x32, 0x33], 60);
        grid.set_layout(LayoutStrategy::Grid);
        grid.set_grid_interval(5);
        grid.set_scale(scale);
        let pipeline = Pipeline::start(config_with(&[], vec![grid]), None);

        // Act
        pipeline.tap(1, 0x31);
        pipeline.tap(1, 0x33);

        // Assert
        let notes: Vec<u8> = pipeline
            .port
            .sent()
            .iter()
            .filter(|m| m.is_note_on())
            .map(|m| m.data1())
            .collect();
        assert_eq!(notes, vec![60, 65], "scale {scale:?}");
    }
}

#[test]
fn test_toggle_key_mutes_pipeline() {
    let pipeline = Pipeline::start(
        config_with(&[], vec![zone("Lead", ANY_ALIAS, &[0x41], 60)]),
        None,
    );

    pipeline.tap(1, 0x91);
    pipeline.tap(1, 0x41);

    assert!(pipeline.port.sent().is_empty());
    assert!(!pipeline.state.engine().is_midi_mode());
}

#[test]
fn test_pointer_axis_drives_configured_cc() {
    // Arrange
    let mut config = config_with(&[], Vec::new());
    config.pointer.x_cc = Some(74);
    let pipeline = Pipeline::start(config, None);

    // Act
    pipeline.backend.inject(NativeInput::Pointer {
        device: DeviceId(1),
        x: 960,
        y: 100,
        client_width: 1920,
        client_height: 1080,
    });
    pipeline.backend.inject(NativeInput::Pointer {
        device: DeviceId(1),
        x: 10,
        y: 10,
        client_width: 0,
        client_height: 1080,
    });

    // Assert
    assert_eq!(
        pipeline.port.sent(),
        vec![MidiMessage::control_change(1, 74, 64)]
    );
}

#[test]
fn test_key_capture_adds_keys_then_plays_them() {
    // Arrange
    let pipeline = Pipeline::start(config_with(&[], vec![zone("Empty", ANY_ALIAS, &[], 60)]), None);
    let id = pipeline.state.engine().zones().ids()[0];
    pipeline.state.engine().begin_key_capture(id).unwrap();

    // Act
    pipeline.tap(3, 0x51);
    pipeline.tap(4, 0x57);
    pipeline.state.engine().end_key_capture();
    pipeline.tap(3, 0x57);

    // Assert
    assert_eq!(
        pipeline.state.engine().zone(id).unwrap().input_key_codes(),
        &[0x51, 0x57]
    );
    assert_eq!(
        pipeline.port.sent(),
        vec![MidiMessage::note_on(1, 62, 127), MidiMessage::note_off(1, 62)]
    );
}

#[test]
fn test_wizard_binds_devices_and_detaches() {
    // Arrange
    let pipeline = Pipeline::start(
        config_with(&["Left", "Right"], vec![zone("Right", "Right", &[0x41], 60)]),
        None,
    );
    let first = tokio_test::block_on(ui_bridge::start_device_assignment(
        Arc::clone(&pipeline.state),
        Vec::new(),
    ));
    assert_eq!(first.data.unwrap().as_deref(), Some("Left"));

    // Act: device 10 presses for "Left", device 20 for "Right"
    pipeline.tap(10, 0x20);
    pipeline.tap(20, 0x20);
    pipeline.port.clear_sent();
    pipeline.tap(20, 0x41);

    // Assert
    let aliases = pipeline.state.aliases.read().unwrap();
    assert_eq!(aliases.alias_for_device(DeviceId(10)), Some("Left"));
    assert_eq!(aliases.alias_for_device(DeviceId(20)), Some("Right"));
    assert_eq!(pipeline.state.fanout.listener_count(), 1);
    assert_eq!(
        pipeline.port.sent(),
        vec![MidiMessage::note_on(1, 60, 127), MidiMessage::note_off(1, 60)]
    );
}

#[test]
fn test_shutdown_panic_sends_all_notes_off_on_every_channel() {
    // Arrange
    let pipeline = Pipeline::start(
        config_with(&[], vec![zone("Lead", ANY_ALIAS, &[0x41], 60)]),
        None,
    );
    pipeline.key(1, 0x41, true);
    pipeline.port.clear_sent();

    // Act
    pipeline.state.panic_and_flush();

    // Assert: the held note is released, then CC 123 on channels 1..=16
    let sent = pipeline.port.sent();
    assert_eq!(sent[0], MidiMessage::note_off(1, 60));
    let ccs: Vec<(u8, u8, u8)> = sent[1..]
        .iter()
        .map(|m| (m.channel(), m.data1(), m.data2()))
        .collect();
    let expected: Vec<(u8, u8, u8)> = (1..=16).map(|ch| (ch, 123, 0)).collect();
    assert_eq!(ccs, expected);
}

#[test]
fn test_selecting_output_sends_pitch_bend_range_without_null_rpn() {
    // Arrange
    let mut config = config_with(&[], Vec::new());
    config.midi.pitch_bend_range = 12;
    let pipeline = Pipeline::start(config, None);

    // Act
    pipeline.state.dispatcher.set_output_device(0).expect("output reopens");

    // Assert
    let sent: Vec<[u8; 3]> = pipeline.port.sent_bytes();
    assert_eq!(
        sent,
        vec![[0xB0, 100, 0], [0xB0, 101, 0], [0xB0, 6, 12], [0xB0, 38, 0]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_delay_mode_holds_notes_for_configured_seconds() {
    // Arrange
    let mut config = config_with(&[], vec![zone("Lead", ANY_ALIAS, &[0x41], 60)]);
    config.midi.delay_enabled = true;
    config.midi.delay_seconds = 5;
    let pipeline = Pipeline::start(config, Some(tokio::runtime::Handle::current()));
    // Opening the output in delay mode queues the pitch-bend RPN too.
    pipeline.state.dispatcher.flush_all();
    pipeline.port.clear_sent();

    // Act
    pipeline.tap(1, 0x41);
    tokio::time::sleep(Duration::from_millis(4_990)).await;
    let early = pipeline.port.sent();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Assert
    assert!(early.is_empty(), "nothing may be delivered before the delay");
    assert_eq!(
        pipeline.port.sent(),
        vec![MidiMessage::note_on(1, 60, 127), MidiMessage::note_off(1, 60)]
    );
    assert_eq!(pipeline.state.dispatcher.pending_len(), 0);
}
