//! Arranger Pad
//!
//! Turns a 12-key macro pad with a rotary encoder (and an optional quad
//! encoder board) into a MIDI controller for Ketron EVM / EVM Plus and
//! Yamaha Genos arrangers.

pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod input;
pub mod keymap;
pub mod midi;
pub mod paths;
pub mod profile;
pub mod protocol;
pub mod surface;
pub mod transport;

pub use controller::{Controller, ControllerSettings};
pub use error::{KeymapError, PeripheralError, TransportError};
pub use profile::{DeviceProfile, ProfileKind};
