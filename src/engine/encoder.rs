//! Main rotary encoder mode state machine
//!
//! The encoder switch cycles through the profile's modes; every non-home
//! mode reverts to the home mode after its idle timeout. Rotation effects:
//! - Rotor: edge-triggered, one command per direction change
//! - Tempo / Value: level-triggered, one command per tick
//! - Volume: absolute master level, stepped and clamped

use std::time::{Duration, Instant};

/// Function currently driven by the main encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderMode {
    Rotor,
    Tempo,
    Volume,
    /// Data dial
    Value,
}

impl EncoderMode {
    pub fn label(self) -> &'static str {
        match self {
            EncoderMode::Rotor => "Rotor",
            EncoderMode::Tempo => "Tempo",
            EncoderMode::Volume => "Volume",
            EncoderMode::Value => "Dial",
        }
    }
}

/// Rotation direction of one encoder tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Direction from two successive position samples
    pub fn between(previous: i32, current: i32) -> Option<Direction> {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => Some(Direction::Up),
            std::cmp::Ordering::Less => Some(Direction::Down),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// What a rotation asks the controller to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderAction {
    /// Rotor speed change (Up = fast, Down = slow)
    Rotor(Direction),
    Tempo(Direction),
    Value(Direction),
    /// New absolute master volume
    Volume(u8),
}

/// Idle timeouts per non-home mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTimeouts {
    pub tempo: Duration,
    pub volume: Duration,
    pub value: Duration,
}

impl ModeTimeouts {
    fn for_mode(&self, mode: EncoderMode) -> Option<Duration> {
        match mode {
            EncoderMode::Rotor => None,
            EncoderMode::Tempo => Some(self.tempo),
            EncoderMode::Volume => Some(self.volume),
            EncoderMode::Value => Some(self.value),
        }
    }
}

impl Default for ModeTimeouts {
    fn default() -> Self {
        Self {
            tempo: Duration::from_secs(60),
            volume: Duration::from_secs(60),
            value: Duration::from_secs(60),
        }
    }
}

/// Master volume stepping
pub const VOLUME_STEP: u8 = 8;
pub const VOLUME_INITIAL: u8 = 100;

#[derive(Debug, Clone)]
pub struct EncoderMachine {
    cycle: Vec<EncoderMode>,
    home: EncoderMode,
    mode: EncoderMode,
    /// Last mode entry or rotation in the current mode
    active_at: Instant,
    timeouts: ModeTimeouts,
    /// Last rotor command sent, for edge detection
    rotor: Option<Direction>,
    sign: bool,
    volume: u8,
}

impl EncoderMachine {
    /// `cycle` must be non-empty; the first entry is used if `home` is absent
    pub fn new(cycle: Vec<EncoderMode>, home: EncoderMode, timeouts: ModeTimeouts, now: Instant) -> Self {
        let cycle = if cycle.is_empty() { vec![home] } else { cycle };
        Self {
            cycle,
            home,
            mode: home,
            active_at: now,
            timeouts,
            rotor: None,
            sign: false,
            volume: VOLUME_INITIAL,
        }
    }

    pub fn mode(&self) -> EncoderMode {
        self.mode
    }

    pub fn home(&self) -> EncoderMode {
        self.home
    }

    pub fn cycle(&self) -> &[EncoderMode] {
        &self.cycle
    }

    /// Display-only sign flag, toggled on every tick
    pub fn sign(&self) -> bool {
        self.sign
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Time since the current mode was entered or last rotated
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.active_at)
    }

    /// Encoder switch tap: advance to the next mode, wrapping around
    pub fn tap(&mut self, now: Instant) -> EncoderMode {
        let next = match self.cycle.iter().position(|m| *m == self.mode) {
            Some(i) => self.cycle[(i + 1) % self.cycle.len()],
            None => self.cycle[0],
        };
        self.enter(next, now);
        next
    }

    /// Jump straight to a mode, bypassing the cycle
    pub fn force(&mut self, mode: EncoderMode, now: Instant) {
        self.enter(mode, now);
    }

    fn enter(&mut self, mode: EncoderMode, now: Instant) {
        self.mode = mode;
        self.active_at = now;
    }

    /// Revert to the home mode once the current mode has idled out.
    ///
    /// Returns the mode that timed out.
    pub fn check_timeout(&mut self, now: Instant) -> Option<EncoderMode> {
        if self.mode == self.home {
            return None;
        }
        let timeout = self.timeouts.for_mode(self.mode)?;
        if self.idle(now) > timeout {
            let expired = self.mode;
            self.enter(self.home, now);
            Some(expired)
        } else {
            None
        }
    }

    /// One tick in `direction`
    pub fn rotate(&mut self, direction: Direction, now: Instant) -> Option<EncoderAction> {
        self.sign = !self.sign;

        match self.mode {
            EncoderMode::Rotor => {
                if self.rotor == Some(direction) {
                    None
                } else {
                    self.rotor = Some(direction);
                    Some(EncoderAction::Rotor(direction))
                }
            }
            EncoderMode::Tempo => {
                self.active_at = now;
                Some(EncoderAction::Tempo(direction))
            }
            EncoderMode::Value => {
                self.active_at = now;
                Some(EncoderAction::Value(direction))
            }
            EncoderMode::Volume => {
                self.active_at = now;
                self.volume = match direction {
                    Direction::Up => self.volume.saturating_add(VOLUME_STEP).min(127),
                    Direction::Down => self.volume.saturating_sub(VOLUME_STEP),
                };
                Some(EncoderAction::Volume(self.volume))
            }
        }
    }

    /// `"+"`, `"-"` or `""` alternating per tick, for the knob label
    pub fn sign_label(&self, direction: Direction) -> &'static str {
        match (self.sign, direction) {
            (true, Direction::Up) => "+",
            (true, Direction::Down) => "-",
            (false, _) => "",
        }
    }
}
