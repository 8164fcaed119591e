//! Runtime settings shared by the mapping engine and the MIDI dispatcher.
//!
//! [`SettingsStore`] publishes a versioned [`RuntimeSettings`] record over a
//! `tokio::sync::watch` channel.  Every mutation clamps its input and bumps
//! `version`; readers either borrow the latest value on demand (the dispatcher
//! does so on every send) or await `changed()`.

use tokio::sync::watch;
use tracing::debug;

pub const MIN_DELAY_SECONDS: u8 = 1;
pub const MAX_DELAY_SECONDS: u8 = 10;
pub const MIN_PITCH_BEND_RANGE: u8 = 1;
pub const MAX_PITCH_BEND_RANGE: u8 = 96;

/// Settings the pipeline reads while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Bumped on every change.
    pub version: u64,
    /// Output channel, 1–16.
    pub midi_channel: u8,
    /// Semitones, 1–96.
    pub pitch_bend_range: u8,
    pub delay_enabled: bool,
    /// 1–10.
    pub delay_seconds: u8,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            version: 0,
            midi_channel: 1,
            pitch_bend_range: 2,
            delay_enabled: false,
            delay_seconds: MIN_DELAY_SECONDS,
        }
    }
}

impl RuntimeSettings {
    fn clamp(&mut self) {
        self.midi_channel = self.midi_channel.clamp(1, 16);
        self.pitch_bend_range = self
            .pitch_bend_range
            .clamp(MIN_PITCH_BEND_RANGE, MAX_PITCH_BEND_RANGE);
        self.delay_seconds = self.delay_seconds.clamp(MIN_DELAY_SECONDS, MAX_DELAY_SECONDS);
    }

    /// Delay applied to outbound messages, or `None` when delay mode is off.
    pub fn delay_ms(&self) -> Option<u64> {
        self.delay_enabled
            .then(|| u64::from(self.delay_seconds) * 1000)
    }
}

/// Owner of the settings channel.
pub struct SettingsStore {
    tx: watch::Sender<RuntimeSettings>,
}

impl SettingsStore {
    pub fn new(mut initial: RuntimeSettings) -> Self {
        initial.clamp();
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<RuntimeSettings> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> RuntimeSettings {
        self.tx.borrow().clone()
    }

    /// Applies `edit`, clamps the result and publishes it with a new version.
    pub fn update(&self, edit: impl FnOnce(&mut RuntimeSettings)) -> u64 {
        let mut version = 0;
        self.tx.send_modify(|settings| {
            edit(settings);
            settings.clamp();
            settings.version += 1;
            version = settings.version;
        });
        debug!(version, "runtime settings updated");
        version
    }

    pub fn set_delay_enabled(&self, enabled: bool) -> u64 {
        self.update(|s| s.delay_enabled = enabled)
    }

    /// Values outside 1–10 are clamped.
    pub fn set_delay_seconds(&self, seconds: i32) -> u64 {
        let seconds = seconds.clamp(i32::from(MIN_DELAY_SECONDS), i32::from(MAX_DELAY_SECONDS)) as u8;
        self.update(|s| s.delay_seconds = seconds)
    }

    /// Values outside 1–96 are clamped.
    pub fn set_pitch_bend_range(&self, semitones: i32) -> u64 {
        let range = semitones.clamp(i32::from(MIN_PITCH_BEND_RANGE), i32::from(MAX_PITCH_BEND_RANGE)) as u8;
        self.update(|s| s.pitch_bend_range = range)
    }

    pub fn set_midi_channel(&self, channel: i32) -> u64 {
        let channel = channel.clamp(1, 16) as u8;
        self.update(|s| s.midi_channel = channel)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(RuntimeSettings::default())
    }
}
