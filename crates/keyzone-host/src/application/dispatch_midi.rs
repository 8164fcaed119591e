//! MidiDispatcher: delivers MIDI messages immediately or after a delay.
//!
//! With delay mode off, every message is written straight to the open output
//! port.  With delay mode on, each message is stamped with
//! `now + delay_seconds * 1000` ms and parked in a pending buffer; a 1 ms
//! ticker sends whatever has come due and stops itself once the buffer is
//! empty, to be restarted lazily by the next enqueue.
//!
//! # Locking
//!
//! The pending buffer and the output port sit behind separate mutexes.  The
//! buffer lock is held only to snapshot-and-remove due messages, never across
//! a send, so a stalled driver cannot block the input thread from enqueueing.
//!
//! # Output selection
//!
//! [`MidiDispatcher::device_names`] enumerates the ports and remembers the
//! list; [`MidiDispatcher::set_output_device`] indexes into that remembered
//! list.  An index outside it changes nothing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use keyzone_core::midi::{all_notes_off, pitch_bend_range_rpn, MidiMessage};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::settings::RuntimeSettings;

/// Name reported by [`MidiDispatcher::device_names`] when no port exists.
pub const NO_OUTPUT_DEVICES: &str = "No MIDI Output Devices";

/// Flush tick period in delay mode.
pub const TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Error type for output port operations.
#[derive(Debug, Error)]
pub enum MidiPortError {
    #[error("MIDI backend unavailable: {0}")]
    Backend(String),
    #[error("MIDI output port {0} not found")]
    PortNotFound(usize),
    #[error("failed to open MIDI output: {0}")]
    Open(String),
    #[error("failed to send MIDI message: {0}")]
    Send(String),
}

/// A physical or virtual MIDI output.
///
/// Infrastructure implementations wrap `midir`; tests record or mock.
#[cfg_attr(test, mockall::automock)]
pub trait MidiOutputPort: Send {
    /// Enumerates the currently available output names, in port order.
    fn port_names(&mut self) -> Vec<String>;

    /// Opens the port at `index` of the last enumeration and returns its name.
    fn open(&mut self, index: usize) -> Result<String, MidiPortError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiPortError>;
}

/// Monotonic millisecond clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Clock backed by `tokio::time`, so paused-time tests control it.
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock advanced by hand.  Used by tests and by hosts that drive
/// [`MidiDispatcher::flush_due`] from their own timer.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(AtomicU64::new(start_ms))
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A message waiting in the delay buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayedMessage {
    pub message: MidiMessage,
    /// Absolute deadline on the dispatcher's clock.
    pub send_at_ms: u64,
}

struct OutputState {
    port: Box<dyn MidiOutputPort>,
    /// Names from the last enumeration; indexes for `set_output_device`.
    enumerated: Vec<String>,
    current: Option<String>,
}

struct DispatchShared {
    output: Mutex<OutputState>,
    pending: Mutex<Vec<DelayedMessage>>,
    clock: Arc<dyn Clock>,
    settings: watch::Receiver<RuntimeSettings>,
    ticking: AtomicBool,
    runtime: Option<Handle>,
}

/// Cheap-to-clone handle to the dispatch queue.
#[derive(Clone)]
pub struct MidiDispatcher {
    shared: Arc<DispatchShared>,
}

impl MidiDispatcher {
    /// Creates a dispatcher.
    ///
    /// With a `runtime`, delay mode flushes itself from a spawned ticker task.
    /// Without one, the owner must call [`MidiDispatcher::flush_due`].
    pub fn new(
        port: Box<dyn MidiOutputPort>,
        clock: Arc<dyn Clock>,
        settings: watch::Receiver<RuntimeSettings>,
        runtime: Option<Handle>,
    ) -> Self {
        Self {
            shared: Arc::new(DispatchShared {
                output: Mutex::new(OutputState {
                    port,
                    enumerated: Vec::new(),
                    current: None,
                }),
                pending: Mutex::new(Vec::new()),
                clock,
                settings,
                ticking: AtomicBool::new(false),
                runtime,
            }),
        }
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    /// Sends now, or parks the message when delay mode is on.
    ///
    /// With delay mode off, anything still parked goes out first so the
    /// stream stays in order.
    pub fn send(&self, message: MidiMessage) {
        let delay = self.shared.settings.borrow().delay_ms();
        match delay {
            None => {
                self.shared.flush_all();
                self.shared.send_now(message);
            }
            Some(delay_ms) => self.enqueue(message, delay_ms),
        }
    }

    pub fn send_note_on(&self, channel: u8, note: u8, velocity: u8) {
        self.send(MidiMessage::note_on(channel, note, velocity));
    }

    pub fn send_note_off(&self, channel: u8, note: u8) {
        self.send(MidiMessage::note_off(channel, note));
    }

    pub fn send_cc(&self, channel: u8, controller: u8, value: u8) {
        self.send(MidiMessage::control_change(channel, controller, value));
    }

    /// `value` is clamped to `0..=16383`.
    pub fn send_pitch_bend(&self, channel: u8, value: i32) {
        self.send(MidiMessage::pitch_bend(channel, value));
    }

    /// CC 123 = 0 on channels 1 through 16, in order.
    pub fn all_notes_off(&self) {
        for message in all_notes_off() {
            self.send(message);
        }
    }

    /// RPN 0 select plus data entry; deliberately no trailing null RPN.
    pub fn send_pitch_bend_range_rpn(&self, channel: u8, semitones: u8) {
        for message in pitch_bend_range_rpn(channel, semitones) {
            self.send(message);
        }
    }

    // ── Delay buffer ──────────────────────────────────────────────────────────

    fn enqueue(&self, message: MidiMessage, delay_ms: u64) {
        let send_at_ms = self.shared.clock.now_ms() + delay_ms;
        self.shared.lock_pending().push(DelayedMessage { message, send_at_ms });
        trace!(?message, send_at_ms, "MIDI message delayed");
        self.ensure_ticking();
    }

    fn ensure_ticking(&self) {
        let Some(runtime) = &self.shared.runtime else {
            return;
        };
        if !self.shared.ticking.swap(true, Ordering::SeqCst) {
            runtime.spawn(run_ticker(Arc::clone(&self.shared)));
        }
    }

    /// Sends every pending message whose deadline has passed, or all of them
    /// once delay mode is off.  Returns how many were sent.
    pub fn flush_due(&self) -> usize {
        self.shared.flush_due()
    }

    /// Sends every pending message now, regardless of deadline.
    pub fn flush_all(&self) -> usize {
        self.shared.flush_all()
    }

    /// Drops every pending message unsent.
    pub fn clear_pending(&self) -> usize {
        let dropped = std::mem::take(&mut *self.shared.lock_pending()).len();
        if dropped > 0 {
            debug!(dropped, "pending MIDI messages cleared");
        }
        dropped
    }

    pub fn pending_len(&self) -> usize {
        self.shared.lock_pending().len()
    }

    pub fn is_ticking(&self) -> bool {
        self.shared.ticking.load(Ordering::SeqCst)
    }

    // ── Output selection ──────────────────────────────────────────────────────

    /// Enumerates outputs.  Returns the placeholder name alone when there are none.
    pub fn device_names(&self) -> Vec<String> {
        let mut output = self.shared.lock_output();
        let names = output.port.port_names();
        output.enumerated = names.clone();
        if names.is_empty() {
            vec![NO_OUTPUT_DEVICES.to_string()]
        } else {
            names
        }
    }

    /// Closes the current output and opens entry `index` of the last enumeration.
    ///
    /// An out-of-range index changes nothing.  On success the configured
    /// pitch-bend range is sent to the new device.  Returns the opened name.
    pub fn set_output_device(&self, index: usize) -> Option<String> {
        let opened = {
            let mut output = self.shared.lock_output();
            if index >= output.enumerated.len() {
                debug!(index, known = output.enumerated.len(), "output index out of range; ignored");
                return None;
            }
            output.port.close();
            output.current = None;
            match output.port.open(index) {
                Ok(name) => {
                    info!(device = %name, "MIDI output opened");
                    output.current = Some(name.clone());
                    name
                }
                Err(e) => {
                    warn!("could not open MIDI output {index}: {e}");
                    return None;
                }
            }
        };

        let (channel, range) = {
            let settings = self.shared.settings.borrow();
            (settings.midi_channel, settings.pitch_bend_range)
        };
        self.send_pitch_bend_range_rpn(channel, range);
        Some(opened)
    }

    /// Opens the first enumerated output whose name equals `name`.
    pub fn set_output_device_by_name(&self, name: &str) -> Option<String> {
        let index = self.device_names().iter().position(|n| n == name)?;
        self.set_output_device(index)
    }

    pub fn close_output(&self) {
        let mut output = self.shared.lock_output();
        if output.current.take().is_some() {
            info!("MIDI output closed");
        }
        output.port.close();
    }

    pub fn current_device(&self) -> Option<String> {
        self.shared.lock_output().current.clone()
    }
}

impl DispatchShared {
    fn send_now(&self, message: MidiMessage) {
        let mut output = self.lock_output();
        if !output.port.is_open() {
            trace!(?message, "no MIDI output open; message dropped");
            return;
        }
        if let Err(e) = output.port.send(message.as_bytes()) {
            warn!("MIDI send failed: {e}");
        }
    }

    fn flush_due(&self) -> usize {
        if self.settings.borrow().delay_ms().is_none() {
            return self.flush_all();
        }
        let now = self.clock.now_ms();
        let mut due: Vec<DelayedMessage> = {
            let mut pending = self.lock_pending();
            let (due, keep): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|m| m.send_at_ms <= now);
            *pending = keep;
            due
        };
        // Stable: equal deadlines keep enqueue order.
        due.sort_by_key(|m| m.send_at_ms);
        let count = due.len();
        for delayed in due {
            self.send_now(delayed.message);
        }
        count
    }

    fn flush_all(&self) -> usize {
        let mut due = std::mem::take(&mut *self.lock_pending());
        if due.is_empty() {
            return 0;
        }
        due.sort_by_key(|m| m.send_at_ms);
        let count = due.len();
        for delayed in due {
            self.send_now(delayed.message);
        }
        count
    }

    fn pending_is_empty(&self) -> bool {
        self.lock_pending().is_empty()
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<DelayedMessage>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_output(&self) -> MutexGuard<'_, OutputState> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_ticker(shared: Arc<DispatchShared>) {
    trace!("delay ticker started");
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        shared.flush_due();
        if shared.pending_is_empty() {
            shared.ticking.store(false, Ordering::SeqCst);
            // An enqueue that raced the store either saw `true` (and relies on
            // us) or spawned its own ticker (and won the swap below).
            if shared.pending_is_empty() || shared.ticking.swap(true, Ordering::SeqCst) {
                break;
            }
        }
    }
    trace!("delay ticker stopped");
}
