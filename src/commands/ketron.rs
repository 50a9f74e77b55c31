//! Ketron EVM / EVM Plus command codes
//!
//! Pedal codes go out as `26 79` SysEx, tab codes as `26 7C`, EFX levels as
//! `26 7B`, sliders as plain Control Change on the device channel.

/// Manufacturer prefix for pedal-style frames
pub const PEDAL_VENDOR: [u8; 2] = [0x26, 0x79];
/// Manufacturer prefix for tab-style frames
pub const TAB_VENDOR: [u8; 2] = [0x26, 0x7C];
/// Manufacturer prefix for EFX level frames
pub const EFX_VENDOR: [u8; 2] = [0x26, 0x7B];

/// EFX level targets used by the original EVM quad encoder board
pub mod efx {
    pub const VOICE1: u8 = 0x07;
    pub const VOICE2: u8 = 0x3D;
    pub const REALCHORD: u8 = 0x08;
    pub const LEFT_GM: u8 = 0x3F;
}

/// Control panel slider CCs
pub mod slider {
    pub const PLAYER: u8 = 0x66;
    pub const STYLE: u8 = 0x67;
    pub const DRUM: u8 = 0x68;
    pub const BASS: u8 = 0x69;
    pub const CHORD: u8 = 0x6A;
    pub const REALCHORD: u8 = 0x6B;
    pub const LOWERS: u8 = 0x6C;
    pub const USER2: u8 = 0x6D;
    pub const USER3: u8 = 0x6E;
    pub const VOICE1: u8 = 0x72;
    pub const VOICE2: u8 = 0x73;
    pub const DRAWBARS: u8 = 0x74;
    pub const MICRO1: u8 = 0x75;
    pub const VOCAL: u8 = 0x76;
}

/// Family 3 names for the slider CCs
pub const SLIDER_CC: &[(&str, u16)] = &[
    ("PLAYER", slider::PLAYER as u16),
    ("STYLE", slider::STYLE as u16),
    ("DRUM", slider::DRUM as u16),
    ("BASS", slider::BASS as u16),
    ("CHORD", slider::CHORD as u16),
    ("REALCHORD", slider::REALCHORD as u16),
    ("LOWERS", slider::LOWERS as u16),
    ("USER2", slider::USER2 as u16),
    ("USER3", slider::USER3 as u16),
    ("VOICE1", slider::VOICE1 as u16),
    ("VOICE2", slider::VOICE2 as u16),
    ("DRAWBARS", slider::DRAWBARS as u16),
    ("MICRO1", slider::MICRO1 as u16),
    ("VOCAL", slider::VOCAL as u16),
];

/// Pedal command codes (family 0). Codes above 127 use the split encoding.
pub const PEDAL: &[(&str, u16)] = &[
    ("Sustain", 0x00),
    ("Soft", 0x01),
    ("Sostenuto", 0x02),
    ("Arr.A", 0x03),
    ("Arr.B", 0x04),
    ("Arr.C", 0x05),
    ("Arr.D", 0x06),
    ("Fill1", 0x07),
    ("Fill2", 0x08),
    ("Fill3", 0x09),
    ("Fill4", 0x0A),
    ("Break1", 0x0B),
    ("Break2", 0x0C),
    ("Break3", 0x0D),
    ("Break4", 0x0E),
    ("Intro/End1", 0x0F),
    ("Intro/End2", 0x10),
    ("Intro/End3", 0x11),
    ("Start/Stop", 0x12),
    ("Tempo Up", 0x13),
    ("Tempo Down", 0x14),
    ("Fill", 0x15),
    ("Break", 0x16),
    ("To End", 0x17),
    ("Bass to Lowest", 0x18),
    ("Bass to Root", 0x19),
    ("Live Bass", 0x1A),
    ("Acc.BassToChord", 0x1B),
    ("Manual Bass", 0x1C),
    ("Voice Lock Bass", 0x1D),
    ("Bass Mono/Poly", 0x1E),
    ("Dial Down", 0x1F),
    ("Dial Up", 0x20),
    ("Auto Fill", 0x21),
    ("Fill to Arr.", 0x22),
    ("After Fill", 0x23),
    ("Low. Hold Start", 0x24),
    ("Low. Hold Stop", 0x25),
    ("Low. Hold Break", 0x26),
    ("Low. Stop Mute", 0x27),
    ("Low. Mute", 0x28),
    ("Low. and Bass", 0x29),
    ("Low. Voice Lock", 0x2A),
    ("Pianist", 0x2B),
    ("Pianist Auto/Stand.", 0x2C),
    ("Pianist Sustain", 0x2D),
    ("Bassist", 0x2E),
    ("Bassist Easy/Exp.", 0x2F),
    ("Key Start", 0x30),
    ("Key Stop", 0x31),
    ("Enter", 0x32),
    ("Exit", 0x33),
    ("Registration", 0x34),
    ("Fade", 0x35),
    ("Harmony", 0x36),
    ("Octave Up", 0x37),
    ("Octave Down", 0x38),
    ("RestartCount In", 0x39),
    ("Micro1 On/Off", 0x3A),
    ("Micro1 Down", 0x3B),
    ("Micro1 Up", 0x3C),
    ("Voicetr.On/Off", 0x3D),
    ("Voicetr.Down", 0x3E),
    ("Voicetr.Up", 0x3F),
    ("Micro2 On/Off", 0x40),
    ("EFX1 On/Off", 0x41),
    ("EFX2 On/Off", 0x42),
    ("Arabic.Set1", 0x43),
    ("Arabic.Set2", 0x44),
    ("Arabic.Set3", 0x45),
    ("Arabic.Set4", 0x46),
    ("Dry On Stop", 0x47),
    ("Pdf Page Down", 0x48),
    ("Pdf Page Up", 0x49),
    ("Pdf Scroll Down", 0x4A),
    ("Pdf Scroll Up", 0x4B),
    ("Glide Down", 0x4C),
    ("Lead Mute", 0x4D),
    ("Expr. Left/Style", 0x4E),
    ("Arabic Reset", 0x4F),
    ("Hold", 0x50),
    ("2nd On/Off", 0x51),
    ("Pause", 0x52),
    ("Talk On/Off", 0x53),
    ("Manual Drum", 0x54),
    ("Kick Off", 0x55),
    ("Snare Off", 0x56),
    ("Rimshot Off", 0x57),
    ("Hit-Hat Off", 0x58),
    ("Cymbal Off", 0x59),
    ("Tom Off", 0x5A),
    ("Latin1 Off", 0x5B),
    ("Latin2 Off", 0x5C),
    ("Latin3/Tamb Off", 0x5D),
    ("Clap/fx Off", 0x5E),
    ("Voice Down", 0x5F),
    ("Voice Up", 0x60),
    ("Regis Down", 0x61),
    ("Regis Up", 0x62),
    ("Style Voice Down", 0x63),
    ("Style Voice Up", 0x64),
    ("EFX1 Preset Down", 0x65),
    ("EFX1 Preset Up", 0x66),
    ("Multi", 0x67),
    ("Page<<", 0x68),
    ("Page>>", 0x69),
    ("RegisVoice<<", 0x6A),
    ("RegisVoice>>", 0x6B),
    ("Text Page", 0x6E),
    ("Text Page+", 0x6F),
    ("Style Voice 1", 0x70),
    ("Style Voice 2", 0x71),
    ("Style Voice 3", 0x72),
    ("Style Voice 4", 0x73),
    ("VIEW & MODELING", 0x74),
    ("Lock Bass", 0x75),
    ("LockChord", 0x76),
    ("Lyrics", 0x77),
    ("VoiceToABCD", 0x87),
    ("TAP", 0x88),
    ("Autocrash", 0x89),
    ("Transp Down", 0x8A),
    ("Transp Up", 0x8B),
    ("Text Record", 0x8C),
    ("Bass & Drum", 0x8D),
    ("Pdf Clear", 0x8E),
    ("Record", 0x90),
    ("Play", 0x91),
    ("DoubleDown", 0x92),
    ("DoubleUp", 0x93),
    ("Arr.Off", 0x94),
    ("FILL & DRUM IN", 0x95),
    ("Wah to Pedal", 0x96),
    ("Overdrive to Pedal", 0x98),
    ("Drum Mute", 0x99),
    ("Bass Mute", 0x9A),
    ("Chords Mute", 0x9B),
    ("Real Chords Mute", 0x9C),
    ("Voice2 to Pedal", 0x9D),
    ("Micro Edit", 0x9E),
    ("Micro2 Edit", 0x9F),
    ("HALF BAR", 0xA0),
    ("Bs Sust Pedal", 0xA1),
    ("Scale", 0xA2),
    ("End Swap", 0xA3),
    ("Set Down", 0xA4),
    ("Set Up", 0xA5),
    ("FswChDelay", 0xA6),
    ("IntroOnArr.", 0xA7),
    ("EndingOnArr.", 0xA8),
    ("Arr. Down", 0xA9),
    ("Arr. Up", 0xAA),
    ("Ending1", 0xAB),
    ("Ending2", 0xAC),
    ("Ending3", 0xAD),
    ("Bass Lock", 0xAE),
    ("Intro Loop", 0xB0),
    ("Scene Down", 0xB1),
    ("Scene Up", 0xB2),
    ("STEM Scene A", 0xB3),
    ("STEM Scene B", 0xB4),
    ("STEM Scene C", 0xB5),
    ("STEM Scene D", 0xB6),
    ("STEM Solo", 0xB7),
    ("STEM Autoplay", 0xB8),
    ("STEM A On/Off", 0xB9),
    ("STEM B On/Off", 0xBA),
    ("STEM C On/Off", 0xBB),
    ("STEM D On/Off", 0xBC),
    ("STEM Lead On/Off", 0xBD),
    ("Art. Toggle", 0xBE),
    ("Key Tune On/Off", 0xBF),
    ("Txt Clear", 0xC0),
    ("Voicetr. Edit", 0xC1),
    ("Clear Image", 0xC2),
];

/// Tab command codes (family 1)
pub const TAB: &[(&str, u16)] = &[
    ("DIAL_DOWN", 0x00),
    ("DIAL_UP", 0x01),
    ("PLAYER_A", 0x02),
    ("PLAYER_B", 0x03),
    ("ENTER", 0x04),
    ("MENU", 0x06),
    ("LYRIC", 0x07),
    ("LEAD", 0x08),
    ("VARIATION", 0x09),
    ("DRAWBARS_VIEW", 0x0A),
    ("DRAWBARS", 0x10),
    ("DRUMSET", 0x11),
    ("TALK", 0x12),
    ("VOICETRON", 0x13),
    ("STYLE_BOX", 0x14),
    ("VOICE1", 0x19),
    ("VOICE2", 0x1A),
    ("USER_VOICE", 0x1B),
    ("XFADE", 0x1C),
    ("INTRO1", 0x1D),
    ("INTRO2", 0x1E),
    ("INTRO3", 0x1F),
    ("BASSIST", 0x20),
    ("DRUM_MIXER", 0x22),
    ("OCTAVE_UP", 0x24),
    ("OCTAVE_DOWN", 0x25),
    ("USER_STYLE", 0x26),
    ("DSP", 0x27),
    ("ADSR_FILTER", 0x28),
    ("MICRO", 0x29),
    ("ARRA", 0x2C),
    ("ARRB", 0x2D),
    ("ARRC", 0x2E),
    ("ARRD", 0x2F),
    ("FILL", 0x30),
    ("BREAK", 0x31),
    ("JUKE_BOX", 0x32),
    ("STEM", 0x33),
    ("PIANIST", 0x34),
    ("BASS_TO_LOWEST", 0x40),
    ("MANUAL_BASS", 0x41),
    ("PORTAMENTO", 0x48),
    ("HARMONY", 0x49),
    ("PAUSE", 0x4A),
    ("TEMPO_SLOW", 0x4B),
    ("TEMPO_FAST", 0x4C),
    ("START_STOP", 0x4D),
    ("TRANSP_DOWN", 0x59),
    ("TRANSP_UP", 0x5A),
    ("AFTERTOUCH", 0x5E),
    ("EXIT", 0x5F),
    ("ROTOR_SLOW", 0x60),
    ("ROTOR_FAST", 0x61),
    ("PIANO_FAM", 0x62),
    ("ETHNIC_FAM", 0x63),
    ("ORGAN_FAM", 0x64),
    ("GUITAR_FAM", 0x65),
    ("BASS_FAM", 0x66),
    ("STRING_FAM", 0x67),
    ("BRASS_FAM", 0x68),
    ("SAX_FAM", 0x69),
    ("HOLD", 0x6F),
    ("PAD_FAM", 0x70),
    ("SYNTH_FAM", 0x71),
    ("FADEOUT", 0x73),
    ("BASS_TO_ROOT", 0x74),
    ("GM", 0x77),
];

