//! Display and key LED model
//!
//! The controller keeps a [`SurfaceState`] current; a [`Surface`] turns it
//! into something visible.

use tracing::{debug, info};

use crate::keymap::{Color, KEY_COUNT};

/// What the pad should be showing right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceState {
    /// Key colors in physical order
    pub pixels: [Color; KEY_COUNT],
    /// Last fired command or preset
    pub action: String,
    /// Encoder mode, with the alternating sign
    pub knob: String,
    /// Profile, layer and error status
    pub info: String,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            pixels: [Color::WHITE; KEY_COUNT],
            action: String::new(),
            knob: String::new(),
            info: String::new(),
        }
    }
}

pub trait Surface {
    fn render(&mut self, state: &SurfaceState);
}

/// Surface that reports changes through tracing
#[derive(Debug, Default)]
pub struct LogSurface {
    last: Option<SurfaceState>,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for LogSurface {
    fn render(&mut self, state: &SurfaceState) {
        if self.last.as_ref() == Some(state) {
            return;
        }

        let previous = self.last.replace(state.clone());
        let text_changed = previous.as_ref().map_or(true, |p| {
            p.action != state.action || p.knob != state.knob || p.info != state.info
        });

        if text_changed {
            info!("🖥️  {} | {} | {}", state.action, state.knob, state.info);
        }
        debug!(
            "LEDs: {}",
            state
                .pixels
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
    }
}
