//! Yamaha Genos section and transport codes

/// Yamaha manufacturer prefix
pub const VENDOR: [u8; 1] = [0x43];

/// Style section codes (family 0 on the Genos profile)
///
/// `Start/Stop` is listed so key lines validate; dispatch handles it as a
/// toggle rather than a section frame.
pub const SECTION: &[(&str, u16)] = &[
    ("Intro 1", 0x00),
    ("Intro 2", 0x01),
    ("Intro 3", 0x02),
    ("Intro 4", 0x03),
    ("Main A", 0x08),
    ("Main B", 0x09),
    ("Main C", 0x0A),
    ("Main D", 0x0B),
    ("Fill In A", 0x10),
    ("Fill In B", 0x11),
    ("Fill In C", 0x12),
    ("Fill In D", 0x13),
    ("Break", 0x18),
    ("Ending 1", 0x20),
    ("Ending 2", 0x21),
    ("Ending 3", 0x22),
    ("Ending 4", 0x23),
    ("Start/Stop", 0x00),
];

/// Name of the section entry that toggles the style transport
pub const START_STOP: &str = "Start/Stop";

/// Tempo limits accepted by the absolute tempo frame
pub const MIN_BPM: u16 = 1;
pub const MAX_BPM: u16 = 500;
