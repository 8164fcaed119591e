//! `midir`-backed output port.
//!
//! `midir` consumes its `MidiOutput` client when connecting, so each `open`
//! creates a fresh client, looks the port up again and connects.  The port is
//! matched by the name seen at the last enumeration so that a device list that
//! changed in between does not silently open a different device; if the name
//! is gone the index is used as is.

use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, warn};

use crate::application::dispatch_midi::{MidiOutputPort, MidiPortError};

const CLIENT_NAME: &str = "keyzone";
const CONNECTION_NAME: &str = "keyzone-out";

/// Output port backed by the platform MIDI API.
#[derive(Default)]
pub struct MidirOutputPort {
    enumerated: Vec<String>,
    connection: Option<MidiOutputConnection>,
}

impl MidirOutputPort {
    pub fn new() -> Self {
        Self::default()
    }
}

fn client() -> Result<MidiOutput, MidiPortError> {
    MidiOutput::new(CLIENT_NAME).map_err(|e| MidiPortError::Backend(e.to_string()))
}

impl MidiOutputPort for MidirOutputPort {
    fn port_names(&mut self) -> Vec<String> {
        let output = match client() {
            Ok(output) => output,
            Err(e) => {
                warn!("cannot enumerate MIDI outputs: {e}");
                self.enumerated.clear();
                return Vec::new();
            }
        };
        self.enumerated = output
            .ports()
            .iter()
            .map(|port| {
                output
                    .port_name(port)
                    .unwrap_or_else(|_| "Unnamed Output".to_string())
            })
            .collect();
        debug!(count = self.enumerated.len(), "MIDI outputs enumerated");
        self.enumerated.clone()
    }

    fn open(&mut self, index: usize) -> Result<String, MidiPortError> {
        self.close();

        let output = client()?;
        let ports = output.ports();
        let wanted = self.enumerated.get(index);
        let by_name = wanted.and_then(|name| {
            ports
                .iter()
                .position(|p| output.port_name(p).ok().as_ref() == Some(name))
        });
        let position = by_name.unwrap_or(index);
        let port = ports.get(position).ok_or(MidiPortError::PortNotFound(index))?;
        let name = output
            .port_name(port)
            .map_err(|e| MidiPortError::Open(e.to_string()))?;

        let connection = output
            .connect(port, CONNECTION_NAME)
            .map_err(|e| MidiPortError::Open(e.to_string()))?;
        self.connection = Some(connection);
        Ok(name)
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiPortError> {
        match self.connection.as_mut() {
            Some(connection) => connection
                .send(bytes)
                .map_err(|e| MidiPortError::Send(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for MidirOutputPort {
    fn drop(&mut self) {
        self.close();
    }
}
