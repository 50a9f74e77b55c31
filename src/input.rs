//! Input events and the quad encoder board seam
//!
//! Key indices in [`InputEvent`] are physical; [`Orientation`] maps them to
//! the logical order bindings are stored in.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::engine::quad::QUAD_CHANNELS;
use crate::error::PeripheralError;
use crate::keymap::KEY_COUNT;

/// Edge event from the pad or the main encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyPressed(usize),
    KeyReleased(usize),
    /// New absolute position of the main encoder
    EncoderMoved(i32),
    /// Main encoder push switch was tapped
    EncoderSwitch,
}

/// Physical mounting of the pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    pub usb_left: bool,
}

impl Orientation {
    pub fn new(usb_left: bool) -> Self {
        Self { usb_left }
    }

    /// Logical key for a physical key. Out-of-range indices pass through.
    pub fn logical(self, physical: usize) -> usize {
        if self.usb_left || physical >= KEY_COUNT {
            physical
        } else {
            KEY_COUNT - 1 - physical
        }
    }

    /// Reorder logically indexed values into physical order
    pub fn physical_order<T: Copy>(self, logical: [T; KEY_COUNT]) -> [T; KEY_COUNT] {
        std::array::from_fn(|physical| logical[self.logical(physical)])
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self { usb_left: true }
    }
}

/// Four push-button rotary encoders on an expansion board
pub trait QuadEncoderBoard: Send {
    /// Check that the board answers; called once at startup
    fn probe(&mut self) -> Result<(), PeripheralError>;

    /// Raw accumulated position of every encoder
    fn positions(&mut self) -> Result<[i32; QUAD_CHANNELS], PeripheralError>;

    /// Push switch state of every encoder (true = held)
    fn switches(&mut self) -> Result<[bool; QUAD_CHANNELS], PeripheralError>;
}

#[derive(Debug, Default)]
struct VirtualState {
    present: bool,
    positions: [i32; QUAD_CHANNELS],
    pressed: [bool; QUAD_CHANNELS],
}

/// Software quad board driven from the console.
///
/// Clones share the same state, so the console can turn the knobs the
/// controller polls.
#[derive(Debug, Clone, Default)]
pub struct VirtualQuadBoard {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualQuadBoard {
    /// A connected board with every encoder at rest
    pub fn new() -> Self {
        let board = Self::default();
        board.state.lock().present = true;
        board
    }

    /// A board slot with nothing plugged in
    pub fn absent() -> Self {
        Self::default()
    }

    /// Rotate one encoder by `delta` detents
    pub fn turn(&self, channel: usize, delta: i32) {
        if let Some(pos) = self.state.lock().positions.get_mut(channel) {
            *pos = pos.wrapping_add(delta);
        }
    }

    pub fn set_pressed(&self, channel: usize, pressed: bool) {
        if let Some(p) = self.state.lock().pressed.get_mut(channel) {
            *p = pressed;
        }
    }
}

impl QuadEncoderBoard for VirtualQuadBoard {
    fn probe(&mut self) -> Result<(), PeripheralError> {
        if self.state.lock().present {
            Ok(())
        } else {
            Err(PeripheralError::NotDetected)
        }
    }

    fn positions(&mut self) -> Result<[i32; QUAD_CHANNELS], PeripheralError> {
        let state = self.state.lock();
        if !state.present {
            return Err(PeripheralError::Read("board detached".into()));
        }
        Ok(state.positions)
    }

    fn switches(&mut self) -> Result<[bool; QUAD_CHANNELS], PeripheralError> {
        let state = self.state.lock();
        if !state.present {
            return Err(PeripheralError::Read("board detached".into()));
        }
        Ok(state.pressed)
    }
}
