//! MIDI output transports
//!
//! The controller only needs "send this message"; the concrete sink is a
//! real port, a log, or an in-memory recorder.

use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::midi::{find_port_by_substring, format_hex, MidiMessage};

/// Destination for outbound messages
pub trait MidiTransport {
    fn name(&self) -> &str;

    fn send(&mut self, message: &MidiMessage) -> Result<(), TransportError>;
}

impl<T: MidiTransport + ?Sized> MidiTransport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&mut self, message: &MidiMessage) -> Result<(), TransportError> {
        (**self).send(message)
    }
}

/// Hardware output port through midir
pub struct MidirTransport {
    conn: MidiOutputConnection,
    port_name: String,
}

impl MidirTransport {
    /// Open the first output port whose name contains `pattern`
    pub fn connect(pattern: &str) -> Result<Self, TransportError> {
        let midi_out =
            MidiOutput::new("Arranger-Pad").map_err(|e| TransportError::Connect(e.to_string()))?;

        let port = find_port_by_substring(&midi_out, pattern)
            .ok_or_else(|| TransportError::PortNotFound(pattern.to_string()))?;
        let port_name = midi_out
            .port_name(&port)
            .unwrap_or_else(|_| pattern.to_string());
        debug!("Found port '{}' matching pattern '{}'", port_name, pattern);

        let conn = midi_out
            .connect(&port, "arranger-pad-out")
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!("🎹 MIDI output connected: {}", port_name);
        Ok(Self { conn, port_name })
    }
}

impl MidiTransport for MidirTransport {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, message: &MidiMessage) -> Result<(), TransportError> {
        let data = message.encode();
        self.conn
            .send(&data)
            .map_err(|e| TransportError::Send(e.to_string()))?;
        debug!("Sent: {} | {}", format_hex(&data), message);
        Ok(())
    }
}

/// Dry-run sink that only logs
#[derive(Debug, Default)]
pub struct LogTransport {
    sent: u64,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl MidiTransport for LogTransport {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn send(&mut self, message: &MidiMessage) -> Result<(), TransportError> {
        self.sent += 1;
        info!("→ {} ({})", message, format_hex(&message.encode()));
        Ok(())
    }
}

/// In-memory sink; can be told to fail to simulate a detached device
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<MidiMessage>,
    pub fail: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything recorded so far
    pub fn drain(&mut self) -> Vec<MidiMessage> {
        std::mem::take(&mut self.sent)
    }
}

impl MidiTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recorder"
    }

    fn send(&mut self, message: &MidiMessage) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Send("device detached".into()));
        }
        self.sent.push(message.clone());
        Ok(())
    }
}
