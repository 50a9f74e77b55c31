//! MIDI utilities and message types
//!
//! Provides the outbound message shapes, byte encoding, and port lookup.

use std::fmt;

/// Status byte value for a momentary "pressed" SysEx frame
pub const STATUS_ON: u8 = 0x7F;
/// Status byte value for a momentary "released" SysEx frame
pub const STATUS_OFF: u8 = 0x00;

/// Outbound MIDI message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// System Exclusive body without the F0/F7 framing
    SysEx { data: Vec<u8> },
}

impl MidiMessage {
    /// Build a SysEx message from a vendor prefix and a body
    pub fn sysex(vendor: &[u8], body: &[u8]) -> Self {
        let mut data = Vec::with_capacity(vendor.len() + body.len());
        data.extend_from_slice(vendor);
        data.extend_from_slice(body);
        MidiMessage::SysEx { data }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::SysEx { ref data } => {
                let mut result = Vec::with_capacity(data.len() + 2);
                result.push(0xF0);
                result.extend(data.iter().map(|b| b & 0x7F));
                result.push(0xF7);
                result
            }
        }
    }

    /// Get the channel for channel messages (0-15), None for SysEx
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::ControlChange { channel, .. } => Some(channel),
            MidiMessage::SysEx { .. } => None,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::SysEx { ref data } => {
                write!(f, "SysEx [{}]", format_hex(data))
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find a port whose name contains `needle` (case-insensitive)
pub fn find_port_by_substring<T: midir::MidiIO>(io: &T, needle: &str) -> Option<T::Port> {
    let needle = needle.to_lowercase();
    io.ports().into_iter().find(|port| {
        io.port_name(port)
            .map(|name| name.to_lowercase().contains(&needle))
            .unwrap_or(false)
    })
}

/// Names of all MIDI output ports currently visible
pub fn output_port_names() -> anyhow::Result<Vec<String>> {
    let midi_out = midir::MidiOutput::new("arranger-pad-probe")?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_note_on() {
        let msg = MidiMessage::NoteOn {
            channel: 15,
            note: 64,
            velocity: 120,
        };

        assert_eq!(msg.encode(), vec![0x9F, 64, 120]);
    }

    #[test]
    fn test_encode_control_change() {
        let msg = MidiMessage::ControlChange {
            channel: 15,
            cc: 11,
            value: 100,
        };

        assert_eq!(msg.encode(), vec![0xBF, 11, 100]);
        assert_eq!(msg.channel(), Some(15));
    }

    #[test]
    fn test_sysex_framing() {
        let msg = MidiMessage::sysex(&[0x26, 0x79], &[0x03, 0x12, STATUS_ON]);

        assert_eq!(msg.encode(), vec![0xF0, 0x26, 0x79, 0x03, 0x12, 0x7F, 0xF7]);
        assert_eq!(msg.channel(), None);
    }

    #[test]
    fn test_display() {
        let msg = MidiMessage::sysex(&[0x26, 0x7C], &[0x61, STATUS_OFF]);
        assert_eq!(msg.to_string(), "SysEx [26 7C 61 00]");

        let msg = MidiMessage::ControlChange { channel: 0, cc: 7, value: 1 };
        assert_eq!(msg.to_string(), "CC ch:1 cc:7 v:1");
    }
}
