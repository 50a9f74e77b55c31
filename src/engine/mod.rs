//! Input state machines
//!
//! Each machine owns its own timing fields and takes `now` explicitly, so
//! the controller can drive them from any clock.

pub mod encoder;
pub mod quad;
pub mod shift;
pub mod tune;

pub use encoder::{Direction, EncoderAction, EncoderMachine, EncoderMode, ModeTimeouts};
pub use quad::{QuadAction, QuadController, QuadSettings};
pub use shift::{ShiftEffect, ShiftMachine, ShiftState};
pub use tune::TunePlayer;
