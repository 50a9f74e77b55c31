//! Surface state: key colors and the three status lines

use std::time::Instant;

use super::Controller;
use crate::engine::EncoderMode;
use crate::keymap::{Color, KEY_COUNT, SHIFT_KEY};
use crate::transport::MidiTransport;

impl<T: MidiTransport> Controller<T> {
    /// Key colors in logical order
    pub(crate) fn key_colors(&self, now: Instant) -> [Color; KEY_COUNT] {
        if self.config_error {
            return [Color::RED; KEY_COUNT];
        }

        let layer = self.shift.layer();
        let mut pixels: [Color; KEY_COUNT] = std::array::from_fn(|k| self.cache.color(k, layer));

        if self.profile.shift_layer {
            pixels[SHIFT_KEY] = if self.shift.is_locked() {
                Color::OFFWHITE
            } else {
                match self.encoder.mode() {
                    EncoderMode::Tempo => Color::YELLOW,
                    EncoderMode::Volume => Color::PURPLE,
                    EncoderMode::Value => Color::WHITE,
                    EncoderMode::Rotor => pixels[SHIFT_KEY],
                }
            };
        }

        if let Some((key, until)) = self.flash {
            if now < until && key < KEY_COUNT {
                pixels[key] = Color::WHITE;
            }
        }

        pixels
    }

    pub(crate) fn refresh_surface(&mut self, now: Instant) {
        let pixels = self.key_colors(now);
        self.surface.pixels = self.settings.orientation.physical_order(pixels);

        let mode = self.encoder.mode();
        let sign = self
            .last_direction
            .map(|d| self.encoder.sign_label(d))
            .unwrap_or("");
        self.surface.knob = match mode {
            EncoderMode::Volume => format!("Knob: {}{} {}", mode.label(), sign, self.encoder.volume()),
            EncoderMode::Tempo if self.tempo_bpm > 0 => {
                format!("Knob: {}{} {}", mode.label(), sign, self.tempo_bpm)
            }
            _ => format!("Knob: {}{}", mode.label(), sign),
        };

        self.surface.action = self.last_action.clone();
        self.surface.info = if self.config_error {
            "Config error".to_string()
        } else {
            let quad = match &self.quad {
                Some(unit) if unit.enabled => " | Quad",
                _ => "",
            };
            format!(
                "{} | {}{}",
                self.profile.display_name,
                self.shift.state().label(),
                quad
            )
        };
    }
}
