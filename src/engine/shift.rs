//! Shift layer state machine
//!
//! One designated key doubles as a layer modifier:
//! - tap: fires the key's own base binding
//! - hold + another key: momentary shift layer
//! - hold past the threshold and release alone: sticky shift lock
//!
//! Transitions are pure functions of press/release edges and the `now`
//! instant handed in by the caller.

use std::time::{Duration, Instant};

use crate::keymap::Layer;

/// Current shift state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftState {
    Off,
    /// Shift key is down and nothing else has been pressed yet
    Pending { pressed_at: Instant },
    /// Shift key is down and used as a modifier
    ActiveShift,
    /// Shift layer latched until the shift key is pressed again
    ActiveLock,
}

impl ShiftState {
    /// Key layer consulted in this state
    pub fn layer(&self) -> Layer {
        match self {
            ShiftState::ActiveShift | ShiftState::ActiveLock => Layer::Shift,
            ShiftState::Off | ShiftState::Pending { .. } => Layer::Base,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShiftState::Off => "Off",
            ShiftState::Pending { .. } => "Pending",
            ShiftState::ActiveShift => "Shift",
            ShiftState::ActiveLock => "Shift Lock",
        }
    }
}

/// What the caller must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftEffect {
    Nothing,
    /// The shift key was tapped; send its own base-layer binding
    FireShiftKey,
    /// The active layer changed
    LayerChanged(Layer),
}

#[derive(Debug, Clone)]
pub struct ShiftMachine {
    state: ShiftState,
    hold_threshold: Duration,
}

impl ShiftMachine {
    pub fn new(hold_threshold: Duration) -> Self {
        Self {
            state: ShiftState::Off,
            hold_threshold,
        }
    }

    pub fn state(&self) -> ShiftState {
        self.state
    }

    pub fn layer(&self) -> Layer {
        self.state.layer()
    }

    pub fn is_locked(&self) -> bool {
        self.state == ShiftState::ActiveLock
    }

    /// Shift key went down
    pub fn shift_pressed(&mut self, now: Instant) -> ShiftEffect {
        match self.state {
            ShiftState::ActiveLock => {
                self.state = ShiftState::Off;
                ShiftEffect::LayerChanged(Layer::Base)
            }
            ShiftState::ActiveShift => {
                // Release was missed; restart the gesture from the base layer
                self.state = ShiftState::Pending { pressed_at: now };
                ShiftEffect::LayerChanged(Layer::Base)
            }
            ShiftState::Off | ShiftState::Pending { .. } => {
                self.state = ShiftState::Pending { pressed_at: now };
                ShiftEffect::Nothing
            }
        }
    }

    /// Shift key went up
    pub fn shift_released(&mut self, now: Instant) -> ShiftEffect {
        match self.state {
            ShiftState::Pending { pressed_at } => {
                if now.saturating_duration_since(pressed_at) > self.hold_threshold {
                    self.state = ShiftState::ActiveLock;
                    ShiftEffect::LayerChanged(Layer::Shift)
                } else {
                    self.state = ShiftState::Off;
                    ShiftEffect::FireShiftKey
                }
            }
            ShiftState::ActiveShift => {
                self.state = ShiftState::Off;
                ShiftEffect::LayerChanged(Layer::Base)
            }
            // Release after the unlocking press, or while latched
            ShiftState::Off | ShiftState::ActiveLock => ShiftEffect::Nothing,
        }
    }

    /// Any other key went down. Must be called before resolving that key.
    pub fn other_key_pressed(&mut self) -> ShiftEffect {
        if let ShiftState::Pending { .. } = self.state {
            self.state = ShiftState::ActiveShift;
            ShiftEffect::LayerChanged(Layer::Shift)
        } else {
            ShiftEffect::Nothing
        }
    }

    pub fn reset(&mut self) {
        self.state = ShiftState::Off;
    }
}
