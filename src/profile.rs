//! Device profiles
//!
//! One engine serves every supported arranger; a profile fixes the
//! protocol, command tables, default layers and macros, encoder modes,
//! and where the quad encoders send their levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::commands::ketron::{efx, slider};
use crate::commands::CommandSet;
use crate::engine::EncoderMode;
use crate::keymap::{Color, RawKeymap, RawLayer, RawMacro, KEY_COUNT};

/// Supported arranger models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Ketron EVM, quad encoders on EFX levels
    Evm,
    /// Ketron EVM Plus, quad encoders on slider CCs
    EvmPlus,
    /// Yamaha Genos
    Genos,
}

impl FromStr for ProfileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "evm" => Ok(ProfileKind::Evm),
            "evm_plus" | "evmplus" => Ok(ProfileKind::EvmPlus),
            "genos" => Ok(ProfileKind::Genos),
            other => anyhow::bail!("Unknown profile '{}' (expected evm, evm_plus or genos)", other),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProfileKind::Evm => "evm",
            ProfileKind::EvmPlus => "evm_plus",
            ProfileKind::Genos => "genos",
        })
    }
}

/// Wire protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ketron,
    Yamaha,
}

/// How Tempo mode talks to the arranger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoControl {
    /// Relative `Tempo Up` / `Tempo Down` pedal commands
    Commands,
    /// Absolute tempo frames, tracked locally from `initial_bpm`
    Absolute { initial_bpm: u16 },
}

/// Where a quad encoder level is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelTarget {
    /// Control Change on the device channel
    Cc(u8),
    /// Ketron EFX level SysEx
    Efx(u8),
}

/// Discrete action bound to a quad encoder push switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchPreset {
    pub label: &'static str,
    pub targets: &'static [LevelTarget],
    pub level: u8,
    /// Also reset every quad shadow on both layers to `level`
    pub sync_all: bool,
}

/// Quad encoder wiring for a profile, indexed `[layer][channel]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadProfile {
    pub targets: [[LevelTarget; 4]; 2],
    pub labels: [[&'static str; 4]; 2],
    pub presets: [[Option<SwitchPreset>; 4]; 2],
}

/// Encoder command names on Ketron profiles
pub mod knob {
    pub const ROTOR_FAST: &str = "ROTOR_FAST";
    pub const ROTOR_SLOW: &str = "ROTOR_SLOW";
    pub const DIAL_UP: &str = "DIAL_UP";
    pub const DIAL_DOWN: &str = "DIAL_DOWN";
    pub const TEMPO_UP: &str = "Tempo Up";
    pub const TEMPO_DOWN: &str = "Tempo Down";
}

/// Binding name that forces Tempo mode when fired
pub const TEMPO_TRIGGER: &str = "Start/Stop";

#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub kind: ProfileKind,
    pub display_name: &'static str,
    pub protocol: Protocol,
    pub commands: &'static CommandSet,
    /// Output channel (0-based)
    pub channel: u8,
    /// Whether key 0 acts as the shift modifier
    pub shift_layer: bool,
    pub encoder_cycle: Vec<EncoderMode>,
    pub home_mode: EncoderMode,
    pub tempo: TempoControl,
    pub quad: Option<QuadProfile>,
}

impl DeviceProfile {
    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Evm => Self::ketron(kind, "Ketron EVM", Some(EVM_QUAD)),
            ProfileKind::EvmPlus => Self::ketron(kind, "Ketron EVM Plus", Some(EVM_PLUS_QUAD)),
            ProfileKind::Genos => Self {
                kind,
                display_name: "Yamaha Genos",
                protocol: Protocol::Yamaha,
                commands: CommandSet::yamaha(),
                channel: 15,
                shift_layer: false,
                encoder_cycle: vec![EncoderMode::Tempo],
                home_mode: EncoderMode::Tempo,
                tempo: TempoControl::Absolute { initial_bpm: 90 },
                quad: None,
            },
        }
    }

    fn ketron(kind: ProfileKind, display_name: &'static str, quad: Option<QuadProfile>) -> Self {
        Self {
            kind,
            display_name,
            protocol: Protocol::Ketron,
            commands: CommandSet::ketron(),
            channel: 15,
            shift_layer: true,
            encoder_cycle: vec![EncoderMode::Rotor, EncoderMode::Tempo, EncoderMode::Volume],
            home_mode: EncoderMode::Rotor,
            tempo: TempoControl::Commands,
            quad,
        }
    }

    /// Append Value (dial) to the encoder cycle if not already present
    pub fn with_value_mode(mut self) -> Self {
        if self.protocol == Protocol::Ketron && !self.encoder_cycle.contains(&EncoderMode::Value) {
            self.encoder_cycle.push(EncoderMode::Value);
        }
        self
    }

    /// Compiled-in keymap used until a keymap file loads
    pub fn default_keymap(&self) -> RawKeymap {
        match self.protocol {
            Protocol::Ketron => RawKeymap {
                base: RawLayer::new(KETRON_BASE_KEYS, KETRON_BASE_COLORS),
                shift: RawLayer::new(KETRON_SHIFT_KEYS, KETRON_SHIFT_COLORS),
                macros: KETRON_MACROS
                    .iter()
                    .map(|(name, steps)| RawMacro {
                        name: name.to_string(),
                        steps: steps.iter().map(|s| s.to_string()).collect(),
                    })
                    .collect(),
            },
            Protocol::Yamaha => RawKeymap {
                base: RawLayer::new(GENOS_KEYS, GENOS_COLORS),
                shift: RawLayer::empty(),
                macros: Vec::new(),
            },
        }
    }
}

const KETRON_BASE_KEYS: [&str; KEY_COUNT] = [
    "1:VARIATION", "0:Arr.A", "0:Intro/End1", "0:Fill",
    "0:Arr.B", "0:Intro/End2", "0:Break", "0:Arr.C",
    "0:Intro/End3", "0:Start/Stop", "0:Arr.D", "0:To End",
];

const KETRON_BASE_COLORS: [Color; KEY_COUNT] = [
    Color::BLUE, Color::BLUE, Color::GREEN, Color::GREEN,
    Color::BLUE, Color::GREEN, Color::ORANGE, Color::BLUE,
    Color::GREEN, Color::RED, Color::BLUE, Color::RED,
];

const KETRON_SHIFT_KEYS: [&str; KEY_COUNT] = [
    "1:VARIATION", "0:Low. Mute", "1:TRANSP_DOWN", "0:HALF BAR",
    "0:FILL & DRUM IN", "1:TRANSP_UP", "0:Arr.Off", "2:UNPLUGGED",
    "1:OCTAVE_DOWN", "0:Start/Stop", "2:PLUGGED", "1:OCTAVE_UP",
];

const KETRON_SHIFT_COLORS: [Color; KEY_COUNT] = [
    Color::RED, Color::BLUE, Color::YELLOW, Color::PURPLE,
    Color::GREEN, Color::YELLOW, Color::RED, Color::ORANGE,
    Color::TEAL, Color::RED, Color::ORANGE, Color::TEAL,
];

const KETRON_MACROS: &[(&str, &[&str])] = &[
    ("UNPLUGGED", &["0:FILL & DRUM IN"]),
    ("PLUGGED", &["0:Drum Mute"]),
    ("FArr.A", &["1:FILL", "0:Arr.A"]),
    ("FArr.B", &["1:FILL", "0:Arr.B"]),
    ("FArr.C", &["1:FILL", "0:Arr.C"]),
    ("FArr.D", &["1:FILL", "0:Arr.D"]),
    ("SStop", &["0:Start/Stop"]),
];

const GENOS_KEYS: [&str; KEY_COUNT] = [
    "0:Ending 1", "0:Main A", "0:Intro 1",
    "0:Ending 2", "0:Main B", "0:Intro 2",
    "0:Ending 3", "0:Main C", "0:Intro 3",
    "0:Start/Stop", "0:Main D", "0:Break",
];

const GENOS_COLORS: [Color; KEY_COUNT] = [
    Color::ORANGE, Color::BLUE, Color::GREEN,
    Color::ORANGE, Color::BLUE, Color::GREEN,
    Color::ORANGE, Color::BLUE, Color::GREEN,
    Color::RED, Color::BLUE, Color::ORANGE,
];

const ALL_VOICES: &[LevelTarget] = &[
    LevelTarget::Cc(slider::BASS),
    LevelTarget::Cc(slider::LOWERS),
    LevelTarget::Cc(slider::VOICE1),
    LevelTarget::Cc(slider::VOICE2),
    LevelTarget::Cc(slider::DRAWBARS),
];

const UPPER_VOICES: &[LevelTarget] = &[
    LevelTarget::Cc(slider::VOICE1),
    LevelTarget::Cc(slider::VOICE2),
    LevelTarget::Cc(slider::DRAWBARS),
];

const LOWER_VOICES: &[LevelTarget] = &[LevelTarget::Cc(slider::LOWERS)];

const STYLE_VOICES: &[LevelTarget] = &[
    LevelTarget::Cc(slider::STYLE),
    LevelTarget::Cc(slider::DRUM),
    LevelTarget::Cc(slider::REALCHORD),
    LevelTarget::Cc(slider::CHORD),
];

const BASS_VOICES: &[LevelTarget] = &[LevelTarget::Cc(slider::BASS)];

const fn preset(
    label: &'static str,
    targets: &'static [LevelTarget],
    level: u8,
    sync_all: bool,
) -> Option<SwitchPreset> {
    Some(SwitchPreset {
        label,
        targets,
        level,
        sync_all,
    })
}

const EVM_PLUS_QUAD: QuadProfile = QuadProfile {
    targets: [
        [
            LevelTarget::Cc(slider::LOWERS),
            LevelTarget::Cc(slider::VOICE1),
            LevelTarget::Cc(slider::VOICE2),
            LevelTarget::Cc(slider::DRAWBARS),
        ],
        [
            LevelTarget::Cc(slider::STYLE),
            LevelTarget::Cc(slider::DRUM),
            LevelTarget::Cc(slider::CHORD),
            LevelTarget::Cc(slider::REALCHORD),
        ],
    ],
    labels: [
        ["Lower", "Voice1", "Voice2", "DrwBar"],
        ["Style", "Drum", "Chord", "R/Chrd"],
    ],
    presets: [
        [
            preset("Man Vol 96", ALL_VOICES, 96, true),
            preset("All Vol 0", ALL_VOICES, 0, true),
            preset("Uppers Vol 0", UPPER_VOICES, 0, false),
            preset("Lowers Vol 0", LOWER_VOICES, 0, false),
        ],
        [
            preset("Style Vol 96", STYLE_VOICES, 96, true),
            preset("Style Vol 0", STYLE_VOICES, 0, true),
            preset("Bass Vol 96", BASS_VOICES, 96, false),
            preset("Bass Vol 0", BASS_VOICES, 0, false),
        ],
    ],
};

const EVM_EFX_TARGETS: [LevelTarget; 4] = [
    LevelTarget::Efx(efx::VOICE1),
    LevelTarget::Efx(efx::VOICE2),
    LevelTarget::Efx(efx::REALCHORD),
    LevelTarget::Efx(efx::LEFT_GM),
];

const EVM_QUAD: QuadProfile = QuadProfile {
    targets: [EVM_EFX_TARGETS, EVM_EFX_TARGETS],
    labels: [
        ["Voice1", "Voice2", "R/Chrd", "LeftGM"],
        ["Voice1", "Voice2", "R/Chrd", "LeftGM"],
    ],
    presets: [[None; 4], [None; 4]],
};
