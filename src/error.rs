//! Typed errors for the engine seams
//!
//! Application code wraps these in `anyhow` with context; library callers can
//! match on them directly.

use std::path::PathBuf;
use thiserror::Error;

use crate::commands::Family;

/// One problem found while reading a keymap file.
///
/// Every variant except `Io` carries the 1-based line number it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeymapError {
    #[error("line {line}: unrecognised entry '{text}'")]
    UnknownEntry { line: usize, text: String },

    #[error("line {line}: malformed {kind} line '{text}'")]
    Malformed {
        line: usize,
        kind: &'static str,
        text: String,
    },

    #[error("line {line}: invalid message family '{family}'")]
    BadFamily { line: usize, family: String },

    #[error("line {line}: unknown {family} command '{name}'")]
    UnknownCommand {
        line: usize,
        family: Family,
        name: String,
    },

    #[error("line {line}: unknown color '{name}'")]
    UnknownColor { line: usize, name: String },

    #[error("line {line}: macro '{name}' is not defined")]
    UnknownMacro { line: usize, name: String },

    #[error("line {line}: macro step '{step}' cannot reference another macro")]
    NestedMacro { line: usize, step: String },

    #[error("line {line}: unknown variable '{name}'")]
    UnknownVariable { line: usize, name: String },

    #[error("line {line}: invalid value '{value}' for {name}")]
    BadVariable {
        line: usize,
        name: String,
        value: String,
    },

    #[error("line {line}: more than {max} key lines")]
    TooManyKeys { line: usize, max: usize },

    #[error("cannot read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl KeymapError {
    /// Line number the problem was found on, if any
    pub fn line(&self) -> Option<usize> {
        match *self {
            KeymapError::UnknownEntry { line, .. }
            | KeymapError::Malformed { line, .. }
            | KeymapError::BadFamily { line, .. }
            | KeymapError::UnknownCommand { line, .. }
            | KeymapError::UnknownColor { line, .. }
            | KeymapError::UnknownMacro { line, .. }
            | KeymapError::NestedMacro { line, .. }
            | KeymapError::UnknownVariable { line, .. }
            | KeymapError::BadVariable { line, .. }
            | KeymapError::TooManyKeys { line, .. } => Some(line),
            KeymapError::Io { .. } => None,
        }
    }
}

/// MIDI output failures. Never fatal to the main loop.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no MIDI output port matching '{0}'")]
    PortNotFound(String),

    #[error("failed to open MIDI output: {0}")]
    Connect(String),

    #[error("MIDI send failed: {0}")]
    Send(String),
}

/// Optional quad encoder board failures.
#[derive(Debug, Error)]
pub enum PeripheralError {
    #[error("quad encoder board not detected")]
    NotDetected,

    #[error("quad encoder read failed: {0}")]
    Read(String),
}
