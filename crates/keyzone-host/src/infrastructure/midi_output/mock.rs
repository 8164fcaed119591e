//! In-memory output port for unit and integration testing.
//!
//! Clones share state: a test keeps one handle to inspect what was sent while
//! the other is boxed into a [`MidiDispatcher`](crate::application::dispatch_midi::MidiDispatcher).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use keyzone_core::MidiMessage;

use crate::application::dispatch_midi::{MidiOutputPort, MidiPortError};

#[derive(Default)]
struct RecordingState {
    ports: Vec<String>,
    open: Option<usize>,
    sent: Vec<[u8; 3]>,
    open_calls: u32,
    close_calls: u32,
}

/// Output port that records every message sent while open.
#[derive(Clone, Default)]
pub struct RecordingOutputPort {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingOutputPort {
    /// A port list with the given names.
    pub fn with_ports<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let port = Self::default();
        port.set_ports(names);
        port
    }

    /// Replaces the advertised port list, as if devices were (un)plugged.
    pub fn set_ports<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().ports = names.into_iter().map(Into::into).collect();
    }

    /// Every message sent so far, oldest first.
    pub fn sent(&self) -> Vec<MidiMessage> {
        self.lock()
            .sent
            .iter()
            .map(|b| MidiMessage::from_bytes(*b))
            .collect()
    }

    /// Raw bytes of every message sent so far.
    pub fn sent_bytes(&self) -> Vec<[u8; 3]> {
        self.lock().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    pub fn open_index(&self) -> Option<usize> {
        self.lock().open
    }

    pub fn open_calls(&self) -> u32 {
        self.lock().open_calls
    }

    pub fn close_calls(&self) -> u32 {
        self.lock().close_calls
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MidiOutputPort for RecordingOutputPort {
    fn port_names(&mut self) -> Vec<String> {
        self.lock().ports.clone()
    }

    fn open(&mut self, index: usize) -> Result<String, MidiPortError> {
        let mut state = self.lock();
        state.open_calls += 1;
        let name = state
            .ports
            .get(index)
            .cloned()
            .ok_or(MidiPortError::PortNotFound(index))?;
        state.open = Some(index);
        Ok(name)
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.close_calls += 1;
        state.open = None;
    }

    fn is_open(&self) -> bool {
        self.lock().open.is_some()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiPortError> {
        let mut state = self.lock();
        if state.open.is_none() {
            return Err(MidiPortError::Send("port closed".to_string()));
        }
        let mut message = [0u8; 3];
        for (slot, byte) in message.iter_mut().zip(bytes) {
            *slot = *byte;
        }
        state.sent.push(message);
        Ok(())
    }
}
