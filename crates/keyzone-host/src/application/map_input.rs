//! ZoneMappingEngine: turns captured key and axis events into MIDI.
//!
//! This use case is the heart of the host.  It receives normalized input from
//! the capture fan-out, resolves the pressing device to its alias through the
//! [`DeviceAliasRegistry`], asks the [`ZoneManager`] which note the key plays,
//! and hands note-on/note-off messages to the [`MidiDispatcher`].
//!
//! # Event handling order (for beginners)
//!
//! For each key event the engine checks, in order:
//!
//! ```text
//! toggle-key learn?  ──► next key-down becomes the MIDI-mode hot-key
//! key capture?       ──► key-down is appended to the zone being edited
//! toggle key?        ──► key-down flips MIDI mode on/off
//! key-up?            ──► note-off for whatever this (device, key) sounded
//! MIDI mode off?     ──► ignore
//! already held?      ──► ignore (OS auto-repeat)
//! otherwise          ──► resolve alias ─► first matching zone ─► note-on
//! ```
//!
//! # Note-off pairing
//!
//! Every note-on is remembered per `(device, key)` together with the channel
//! and note actually sent.  The key-up sends exactly that note-off, so editing
//! a zone while a key is held never leaves a hanging note.
//!
//! # Locking
//!
//! The engine lives behind a `Mutex` and implements [`InputListener`] for it.
//! While handling an event it briefly read-locks the alias registry; the lock
//! order is always engine first, registry second.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use keyzone_core::midi::message::FULL_VELOCITY;
use keyzone_core::{
    DeviceId, KeyCode, Zone, ZoneError, ZoneId, ZoneManager, ZoneMatch, DEFAULT_TOGGLE_KEY,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace};

use super::dispatch_midi::MidiDispatcher;
use super::manage_aliases::DeviceAliasRegistry;
use super::settings::RuntimeSettings;
use crate::infrastructure::input_capture::{InputListener, PointerAxis};

/// Capacity of the engine's change-event channel.
const EVENT_CAPACITY: usize = 64;

/// Which key-learning consumer, if any, is active.  At most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LearnMode {
    #[default]
    Idle,
    /// Key-downs are appended to this zone's key list.
    KeyCapture(ZoneId),
    /// The next key-down becomes the MIDI-mode toggle key.
    ToggleKey,
}

/// Change notifications published by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The zone list or a zone's fields changed.
    ZonesChanged { version: u64 },
    /// A key was appended to a zone in capture mode.
    KeyCaptured { zone: ZoneId, code: KeyCode },
    ToggleKeyLearned(KeyCode),
    MidiModeChanged(bool),
}

/// Controller numbers driven by pointer axes.  `None` leaves the axis unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerCcMap {
    pub x: Option<u8>,
    pub y: Option<u8>,
}

/// A note currently sounding because its key is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeldNote {
    channel: u8,
    note: u8,
}

/// The zone mapping use case.
pub struct ZoneMappingEngine {
    zones: ZoneManager,
    aliases: Arc<RwLock<DeviceAliasRegistry>>,
    dispatcher: MidiDispatcher,
    settings: watch::Receiver<RuntimeSettings>,
    held: HashMap<(DeviceId, KeyCode), HeldNote>,
    midi_mode: bool,
    toggle_key: KeyCode,
    learn: LearnMode,
    pointer: PointerCcMap,
    events: broadcast::Sender<EngineEvent>,
}

impl ZoneMappingEngine {
    /// Creates an engine with MIDI mode on and the default toggle key.
    pub fn new(
        zones: ZoneManager,
        aliases: Arc<RwLock<DeviceAliasRegistry>>,
        dispatcher: MidiDispatcher,
        settings: watch::Receiver<RuntimeSettings>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            zones,
            aliases,
            dispatcher,
            settings,
            held: HashMap::new(),
            midi_mode: true,
            toggle_key: DEFAULT_TOGGLE_KEY,
            learn: LearnMode::Idle,
            pointer: PointerCcMap::default(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn dispatcher(&self) -> &MidiDispatcher {
        &self.dispatcher
    }

    // ── Input handling ────────────────────────────────────────────────────────

    /// Handles one key/button edge.
    pub fn handle_key(&mut self, device: DeviceId, code: KeyCode, is_down: bool) {
        trace!(%device, code, is_down, "key event");

        if is_down && self.learn == LearnMode::ToggleKey {
            self.learn = LearnMode::Idle;
            self.toggle_key = code;
            info!(code, "toggle key learned");
            self.publish(EngineEvent::ToggleKeyLearned(code));
            return;
        }

        if is_down {
            if let LearnMode::KeyCapture(zone) = self.learn {
                match self.zones.update(zone, |z| z.add_key(code)) {
                    Ok(added) => {
                        if added {
                            debug!(%zone, code, "key captured");
                            self.publish(EngineEvent::KeyCaptured { zone, code });
                            self.publish_zones_changed();
                        }
                        return;
                    }
                    Err(_) => {
                        // Zone deleted mid-capture.
                        self.learn = LearnMode::Idle;
                    }
                }
            }
        }

        // Released before the toggle check: a held key may have just become
        // the toggle key and its note must still stop.
        if !is_down {
            if let Some(held) = self.held.remove(&(device, code)) {
                trace!(%device, code, note = held.note, "note off");
                self.dispatcher.send_note_off(held.channel, held.note);
            }
            return;
        }

        if code == self.toggle_key {
            self.set_midi_mode(!self.midi_mode);
            return;
        }

        if !self.midi_mode || self.held.contains_key(&(device, code)) {
            return;
        }

        let Some(found) = self.resolve(device, code) else {
            trace!(%device, code, "unmapped");
            return;
        };
        let channel = self.settings.borrow().midi_channel;
        self.held.insert(
            (device, code),
            HeldNote {
                channel,
                note: found.note,
            },
        );
        trace!(%device, code, note = found.note, zone = %found.zone, "note on");
        self.dispatcher.send_note_on(channel, found.note, FULL_VELOCITY);
    }

    /// Handles a normalized pointer axis value.  Sends a CC when the axis is mapped.
    pub fn handle_axis(&mut self, device: DeviceId, axis: PointerAxis, value: f32) {
        if !self.midi_mode {
            return;
        }
        let controller = match axis {
            PointerAxis::X => self.pointer.x,
            PointerAxis::Y => self.pointer.y,
        };
        let Some(controller) = controller else {
            return;
        };
        let scaled = (value.clamp(0.0, 1.0) * 127.0).round() as u8;
        trace!(%device, ?axis, controller, scaled, "axis");
        let channel = self.settings.borrow().midi_channel;
        self.dispatcher.send_cc(channel, controller, scaled);
    }

    /// Which zone and note `code` on `device` would play right now.
    pub fn resolve(&self, device: DeviceId, code: KeyCode) -> Option<ZoneMatch> {
        let registry = self.aliases.read().unwrap_or_else(PoisonError::into_inner);
        self.zones.resolve(registry.alias_for_device(device), code)
    }

    /// Sends note-off for every held key and forgets them.
    pub fn release_all_notes(&mut self) {
        let mut held: Vec<_> = self.held.drain().collect();
        held.sort_by_key(|(key, _)| *key);
        for (_, note) in held {
            self.dispatcher.send_note_off(note.channel, note.note);
        }
    }

    // ── MIDI mode ─────────────────────────────────────────────────────────────

    pub fn is_midi_mode(&self) -> bool {
        self.midi_mode
    }

    /// Turning MIDI mode off releases every held note.
    pub fn set_midi_mode(&mut self, enabled: bool) {
        if self.midi_mode == enabled {
            return;
        }
        self.midi_mode = enabled;
        if !enabled {
            self.release_all_notes();
        }
        info!(enabled, "MIDI mode changed");
        self.publish(EngineEvent::MidiModeChanged(enabled));
    }

    pub fn toggle_key(&self) -> KeyCode {
        self.toggle_key
    }

    pub fn set_toggle_key(&mut self, code: KeyCode) {
        self.toggle_key = code;
    }

    pub fn pointer_cc(&self) -> PointerCcMap {
        self.pointer
    }

    /// Controller numbers are masked to 7 bits.
    pub fn set_pointer_cc(&mut self, map: PointerCcMap) {
        self.pointer = PointerCcMap {
            x: map.x.map(|cc| cc & 0x7F),
            y: map.y.map(|cc| cc & 0x7F),
        };
    }

    // ── Learn modes ───────────────────────────────────────────────────────────

    pub fn learn_mode(&self) -> LearnMode {
        self.learn
    }

    /// Starts appending key-downs to `zone`.  Cancels toggle-key learn.
    pub fn begin_key_capture(&mut self, zone: ZoneId) -> Result<(), ZoneError> {
        if self.zones.get(zone).is_none() {
            return Err(ZoneError::UnknownZone(zone));
        }
        self.learn = LearnMode::KeyCapture(zone);
        debug!(%zone, "key capture started");
        Ok(())
    }

    /// Stops key capture.  Returns the zone that was capturing.
    pub fn end_key_capture(&mut self) -> Option<ZoneId> {
        match self.learn {
            LearnMode::KeyCapture(zone) => {
                self.learn = LearnMode::Idle;
                debug!(%zone, "key capture ended");
                Some(zone)
            }
            _ => None,
        }
    }

    /// Makes the next key-down the toggle key.  Cancels key capture.
    pub fn begin_toggle_key_learn(&mut self) {
        self.learn = LearnMode::ToggleKey;
    }

    pub fn cancel_learn(&mut self) {
        self.learn = LearnMode::Idle;
    }

    // ── Zone editing ──────────────────────────────────────────────────────────

    pub fn zones(&self) -> &ZoneManager {
        &self.zones
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn add_zone(&mut self, zone: Zone) -> ZoneId {
        let id = self.zones.add(zone);
        self.publish_zones_changed();
        id
    }

    pub fn remove_zone(&mut self, id: ZoneId) -> Result<Zone, ZoneError> {
        let zone = self.zones.remove(id)?;
        if self.learn == LearnMode::KeyCapture(id) {
            self.learn = LearnMode::Idle;
        }
        self.publish_zones_changed();
        Ok(zone)
    }

    pub fn move_zone(&mut self, id: ZoneId, index: usize) -> Result<(), ZoneError> {
        self.zones.move_to(id, index)?;
        self.publish_zones_changed();
        Ok(())
    }

    /// Edits one zone.  Invariants are re-established afterwards.
    pub fn update_zone<R>(
        &mut self,
        id: ZoneId,
        edit: impl FnOnce(&mut Zone) -> R,
    ) -> Result<R, ZoneError> {
        let result = self.zones.update(id, edit)?;
        self.publish_zones_changed();
        Ok(result)
    }

    /// Replaces the whole zone list, e.g. after loading a configuration.
    pub fn replace_zones(&mut self, zones: ZoneManager) {
        self.zones = zones;
        self.learn = LearnMode::Idle;
        self.publish_zones_changed();
    }

    /// Adds `semitones` to the chromatic offset of every unlocked zone.
    pub fn transpose_zones(&mut self, semitones: i32) {
        self.zones.update_all(|zone| {
            if !zone.is_transpose_locked() {
                zone.transpose(semitones);
            }
        });
        self.publish_zones_changed();
    }

    /// Adds `steps` to the degree offset of every unlocked zone.
    pub fn shift_zone_degrees(&mut self, steps: i32) {
        self.zones.update_all(|zone| {
            if !zone.is_transpose_locked() {
                zone.shift_degrees(steps);
            }
        });
        self.publish_zones_changed();
    }

    /// Points every zone targeting `from` at `to`.  Returns how many changed.
    pub fn retarget_alias(&mut self, from: &str, to: &str) -> usize {
        let mut changed = 0;
        self.zones.update_all(|zone| {
            if zone.target_alias() == from {
                zone.set_target_alias(to);
                changed += 1;
            }
        });
        if changed > 0 {
            self.publish_zones_changed();
        }
        changed
    }

    fn publish_zones_changed(&self) {
        self.publish(EngineEvent::ZonesChanged {
            version: self.zones.version(),
        });
    }

    fn publish(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}

impl InputListener for Mutex<ZoneMappingEngine> {
    fn on_key(&self, device: DeviceId, code: KeyCode, is_down: bool) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle_key(device, code, is_down);
    }

    fn on_axis(&self, device: DeviceId, axis: PointerAxis, value: f32) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle_axis(device, axis, value);
    }
}
