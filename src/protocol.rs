//! Outbound frame builders
//!
//! Turns resolved command codes into the concrete MIDI messages each
//! arranger expects. Momentary commands come back as an ON/OFF pair.

use crate::commands::{ketron, yamaha};
use crate::midi::{MidiMessage, STATUS_OFF, STATUS_ON};

/// Ketron pedal frame: `26 79 03 <code> <status>` or, for codes above 127,
/// `26 79 05 <hi7> <lo7> <status>`.
pub fn ketron_pedal(code: u16, on: bool) -> MidiMessage {
    let status = if on { STATUS_ON } else { STATUS_OFF };
    if code < 128 {
        MidiMessage::sysex(&ketron::PEDAL_VENDOR, &[0x03, code as u8, status])
    } else {
        let hi = ((code >> 7) & 0x7F) as u8;
        let lo = (code & 0x7F) as u8;
        MidiMessage::sysex(&ketron::PEDAL_VENDOR, &[0x05, hi, lo, status])
    }
}

/// Ketron tab frame: `26 7C <code> <status>`
pub fn ketron_tab(code: u16, on: bool) -> MidiMessage {
    let status = if on { STATUS_ON } else { STATUS_OFF };
    MidiMessage::sysex(&ketron::TAB_VENDOR, &[(code & 0x7F) as u8, status])
}

/// Ketron EFX level frame: `26 7B <target> 05 <level>`
pub fn ketron_efx_level(target: u8, level: u8) -> MidiMessage {
    MidiMessage::sysex(&ketron::EFX_VENDOR, &[target, 0x05, level.min(127)])
}

/// Yamaha section frame: `43 7E 00 <code> <status>`
pub fn yamaha_section(code: u16, on: bool) -> MidiMessage {
    let status = if on { STATUS_ON } else { STATUS_OFF };
    MidiMessage::sysex(&yamaha::VENDOR, &[0x7E, 0x00, (code & 0x7F) as u8, status])
}

/// Yamaha style start (`43 04 60 7A`) or stop (`43 04 60 7D`)
pub fn yamaha_start_stop(start: bool) -> MidiMessage {
    let byte = if start { 0x7A } else { 0x7D };
    MidiMessage::sysex(&yamaha::VENDOR, &[0x04, 0x60, byte])
}

/// Yamaha absolute tempo: `43 7E 01 t4 t3 t2 t1`, microseconds per quarter
/// note split into 7-bit chunks, most significant first.
pub fn yamaha_tempo(bpm: u16) -> MidiMessage {
    let bpm = bpm.clamp(yamaha::MIN_BPM, yamaha::MAX_BPM) as u32;
    let micros = 60_000_000 / bpm;
    let chunk = |shift: u32| ((micros >> shift) & 0x7F) as u8;
    MidiMessage::sysex(
        &yamaha::VENDOR,
        &[0x7E, 0x01, chunk(21), chunk(14), chunk(7), chunk(0)],
    )
}

/// Control Change pressed then released (127, 0)
pub fn cc_pair(channel: u8, cc: u16) -> [MidiMessage; 2] {
    let cc = (cc & 0x7F) as u8;
    [
        MidiMessage::ControlChange { channel, cc, value: 127 },
        MidiMessage::ControlChange { channel, cc, value: 0 },
    ]
}

/// Note On at full velocity then Note Off
pub fn note_pair(channel: u8, note: u16) -> [MidiMessage; 2] {
    let note = (note & 0x7F) as u8;
    [
        MidiMessage::NoteOn { channel, note, velocity: 127 },
        MidiMessage::NoteOff { channel, note, velocity: 0 },
    ]
}

/// Absolute level as a Control Change
pub fn cc_level(channel: u8, cc: u8, value: u8) -> MidiMessage {
    MidiMessage::ControlChange {
        channel,
        cc,
        value: value.min(127),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(msg: &MidiMessage) -> &[u8] {
        match msg {
            MidiMessage::SysEx { data } => data,
            other => panic!("expected SysEx, got {:?}", other),
        }
    }

    #[test]
    fn test_pedal_short_code() {
        assert_eq!(body(&ketron_pedal(0x12, true)), &[0x26, 0x79, 0x03, 0x12, 0x7F]);
        assert_eq!(body(&ketron_pedal(0x12, false)), &[0x26, 0x79, 0x03, 0x12, 0x00]);
    }

    #[test]
    fn test_pedal_split_code() {
        // 0x94 = 1 * 128 + 0x14
        assert_eq!(
            body(&ketron_pedal(0x94, true)),
            &[0x26, 0x79, 0x05, 0x01, 0x14, 0x7F]
        );
    }

    #[test]
    fn test_tab_frame() {
        assert_eq!(body(&ketron_tab(0x61, true)), &[0x26, 0x7C, 0x61, 0x7F]);
    }

    #[test]
    fn test_efx_level() {
        assert_eq!(
            body(&ketron_efx_level(ketron::efx::VOICE2, 96)),
            &[0x26, 0x7B, 0x3D, 0x05, 96]
        );
    }

    #[test]
    fn test_yamaha_tempo_120() {
        // 60_000_000 / 120 = 500_000 = 0x07A120
        assert_eq!(
            body(&yamaha_tempo(120)),
            &[0x43, 0x7E, 0x01, 0x00, 0x1E, 0x42, 0x20]
        );
    }

    #[test]
    fn test_yamaha_tempo_clamps_zero() {
        assert_eq!(yamaha_tempo(0), yamaha_tempo(1));
    }

    #[test]
    fn test_yamaha_start_stop() {
        assert_eq!(body(&yamaha_start_stop(true)), &[0x43, 0x04, 0x60, 0x7A]);
        assert_eq!(body(&yamaha_start_stop(false)), &[0x43, 0x04, 0x60, 0x7D]);
    }
}
