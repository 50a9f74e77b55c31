//! Note name table (family 4)
//!
//! Names use sharps and the C-1 = 0 octave convention, so middle C is `C4`.

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Name for a MIDI note number, e.g. `60 -> "C4"`
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1;
    format!("{}{}", PITCH_CLASSES[(note % 12) as usize], octave)
}

/// All 128 note names paired with their numbers
pub fn entries() -> impl Iterator<Item = (String, u16)> {
    (0u8..=127).map(|n| (note_name(n), n as u16))
}
