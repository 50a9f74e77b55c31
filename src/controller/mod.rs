//! Controller - owns every engine component and drives them from input events
//!
//! One instance per pad. The main loop hands it input events and a periodic
//! `poll`; everything else (key resolution, shift gestures, encoder modes,
//! quad encoders, MIDI dispatch, surface state) happens synchronously
//! inside those calls.

mod dispatch;
mod display;

#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::keymap_file::{self, EngineVars, KeymapFile};
use crate::config::AppConfig;
use crate::engine::{
    Direction, EncoderMachine, EncoderMode, ModeTimeouts, QuadController, QuadSettings,
    ShiftEffect, ShiftMachine, ShiftState, TunePlayer,
};
use crate::error::{KeymapError, PeripheralError};
use crate::input::{InputEvent, Orientation, QuadEncoderBoard};
use crate::keymap::{Binding, KeyLookupCache, Layer, KEY_COUNT, SHIFT_KEY, TUNE_KEY};
use crate::profile::{DeviceProfile, QuadProfile, TempoControl, TEMPO_TRIGGER};
use crate::surface::SurfaceState;
use crate::transport::MidiTransport;

/// Runtime knobs resolved from the application config
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    /// Output channel (0-based)
    pub channel: u8,
    pub orientation: Orientation,
    pub shift_hold: Duration,
    pub key_flash: Duration,
    pub tune_hold: Duration,
    pub mode_timeouts: ModeTimeouts,
    pub quad: QuadSettings,
    pub quad_enabled: bool,
}

impl ControllerSettings {
    pub fn from_config(config: &AppConfig, profile: &DeviceProfile) -> Self {
        Self {
            channel: config.channel(profile.channel),
            orientation: Orientation::new(config.device.usb_left),
            shift_hold: config.timers.shift_hold(),
            key_flash: config.timers.key_flash(),
            tune_hold: config.timers.tune_hold(),
            mode_timeouts: config.timers.mode_timeouts(),
            quad: config.quad.settings(&config.timers),
            quad_enabled: config.quad.enabled,
        }
    }
}

/// Attached quad encoder board and its tracking state
pub(crate) struct QuadUnit {
    pub(crate) tracker: QuadController,
    pub(crate) board: Box<dyn QuadEncoderBoard>,
    pub(crate) wiring: QuadProfile,
    pub(crate) enabled: bool,
}

/// The mapping engine for one pad
pub struct Controller<T: MidiTransport> {
    pub(crate) profile: DeviceProfile,
    pub(crate) settings: ControllerSettings,
    pub(crate) cache: KeyLookupCache,
    pub(crate) shift: ShiftMachine,
    pub(crate) encoder: EncoderMachine,
    pub(crate) quad: Option<QuadUnit>,
    pub(crate) tune: TunePlayer,
    pub(crate) transport: T,
    pub(crate) surface: SurfaceState,
    /// Last keymap load failed and has not been acknowledged
    pub(crate) config_error: bool,
    pub(crate) encoder_position: Option<i32>,
    /// Tracked tempo for profiles with absolute tempo frames
    pub(crate) tempo_bpm: u16,
    /// Yamaha style running, toggled by Start/Stop
    pub(crate) style_running: bool,
    pub(crate) key_down_at: [Option<Instant>; KEY_COUNT],
    /// Logical key lit white until the instant
    pub(crate) flash: Option<(usize, Instant)>,
    /// Direction of the last encoder tick, for the knob label
    pub(crate) last_direction: Option<Direction>,
    pub(crate) last_action: String,
}

impl<T: MidiTransport> Controller<T> {
    /// Create a controller running on the profile's compiled-in keymap
    pub fn new(profile: DeviceProfile, settings: ControllerSettings, transport: T, now: Instant) -> Self {
        let cache = KeyLookupCache::new(profile.commands, profile.default_keymap());
        let encoder = EncoderMachine::new(
            profile.encoder_cycle.clone(),
            profile.home_mode,
            settings.mode_timeouts,
            now,
        );
        let tempo_bpm = match profile.tempo {
            TempoControl::Absolute { initial_bpm } => initial_bpm,
            TempoControl::Commands => 0,
        };

        info!(
            "🎛️  {} on channel {} via {}",
            profile.display_name,
            settings.channel + 1,
            transport.name()
        );

        let mut controller = Self {
            shift: ShiftMachine::new(settings.shift_hold),
            profile,
            settings,
            cache,
            encoder,
            quad: None,
            tune: TunePlayer::new(),
            transport,
            surface: SurfaceState::default(),
            config_error: false,
            encoder_position: None,
            tempo_bpm,
            style_running: false,
            key_down_at: [None; KEY_COUNT],
            flash: None,
            last_direction: None,
            last_action: String::new(),
        };
        controller.refresh_surface(now);
        controller
    }

    /// Probe and attach a quad encoder board.
    ///
    /// Returns false (and keeps running without it) when the profile has no
    /// quad wiring or the board does not answer. A board disabled by
    /// configuration is still attached so `EncQuad:True` can enable it.
    pub fn attach_quad_board(&mut self, mut board: Box<dyn QuadEncoderBoard>, now: Instant) -> bool {
        let Some(wiring) = self.profile.quad else {
            debug!("{} has no quad encoder wiring", self.profile.display_name);
            return false;
        };
        if let Err(e) = board.probe() {
            warn!("⚠️  Quad encoders unavailable: {}", e);
            return false;
        }

        let mut tracker = QuadController::new(self.settings.quad, now);
        match board.positions() {
            Ok(positions) => tracker.resync(positions),
            Err(e) => warn!("⚠️  Quad encoder baseline read failed: {}", e),
        }

        let enabled = self.settings.quad_enabled;
        if enabled {
            info!("✅ Quad encoders attached");
        } else {
            info!("Quad encoders attached, disabled by configuration");
        }
        self.quad = Some(QuadUnit {
            tracker,
            board,
            wiring,
            enabled,
        });
        self.refresh_surface(now);
        true
    }

    /// Parse, validate and apply keymap file contents.
    ///
    /// The file is applied on top of the profile defaults, so the result
    /// never depends on earlier loads. All or nothing: on any error the
    /// current keymap stays, diagnostics are logged, and the config error
    /// indicator goes up. On success returns the number of cache fallbacks.
    pub fn load_keymap_text(&mut self, text: &str, now: Instant) -> Result<usize, Vec<KeymapError>> {
        let defaults = self.profile.default_keymap();
        let result = KeymapFile::parse(text, self.cache.commands())
            .and_then(|file| file.overlay(&defaults).map(|raw| (file, raw)));

        match result {
            Ok((file, raw)) => {
                let faults = self.cache.replace(raw);
                self.apply_vars(file.vars);
                self.config_error = false;
                info!(
                    "📝 Keymap applied ({} keys, {} macros)",
                    file.keys.len(),
                    self.cache.raw().macros.len()
                );
                self.refresh_surface(now);
                Ok(faults)
            }
            Err(errors) => {
                self.reject_keymap(&errors, now);
                Err(errors)
            }
        }
    }

    /// Raise the config error indicator for a keymap that could not be used
    pub fn reject_keymap(&mut self, errors: &[KeymapError], now: Instant) {
        keymap_file::report(errors);
        self.config_error = true;
        self.refresh_surface(now);
    }

    /// Resolve keymap variables against the configured quad settings
    fn apply_vars(&mut self, vars: EngineVars) {
        let configured = self.settings.quad;
        let quad = QuadSettings {
            step: vars.step.unwrap_or(configured.step),
            forward: vars.forward.unwrap_or(configured.forward),
            graduated: vars.graduated.unwrap_or(configured.graduated),
            ..configured
        };
        let enabled = vars.quad_enabled.unwrap_or(self.settings.quad_enabled);

        match &mut self.quad {
            Some(unit) => {
                unit.tracker.set_settings(quad);
                if enabled != unit.enabled {
                    if enabled {
                        // Movement while disabled is not a tick
                        match unit.board.positions() {
                            Ok(positions) => unit.tracker.resync(positions),
                            Err(e) => warn!("⚠️  Quad encoder resync failed: {}", e),
                        }
                    }
                    unit.enabled = enabled;
                    debug!("Quad encoders {}", if enabled { "enabled" } else { "disabled" });
                }
            }
            None if vars.quad_enabled == Some(true) => {
                warn!("⚠️  EncQuad:True ignored, no quad encoder board attached");
            }
            None => {}
        }
    }

    /// Handle one input edge
    pub fn handle_event(&mut self, event: InputEvent, now: Instant) {
        match event {
            InputEvent::KeyPressed(physical) => {
                let key = self.settings.orientation.logical(physical);
                self.key_pressed(key, now);
            }
            InputEvent::KeyReleased(physical) => {
                let key = self.settings.orientation.logical(physical);
                self.key_released(key, now);
            }
            InputEvent::EncoderMoved(position) => {
                let previous = self.encoder_position.replace(position);
                if let Some(direction) = previous.and_then(|p| Direction::between(p, position)) {
                    self.encoder_tick(direction, now);
                }
            }
            InputEvent::EncoderSwitch => {
                let mode = self.encoder.tap(now);
                self.last_direction = None;
                debug!("Encoder mode → {}", mode.label());
            }
        }
        self.refresh_surface(now);
    }

    fn key_pressed(&mut self, key: usize, now: Instant) {
        if key >= KEY_COUNT {
            warn!("Key index {} out of range, ignoring", key);
            return;
        }
        self.key_down_at[key] = Some(now);

        if self.profile.shift_layer {
            if key == SHIFT_KEY {
                let effect = self.shift.shift_pressed(now);
                self.apply_shift_effect(effect);
                return;
            }
            let effect = self.shift.other_key_pressed();
            self.apply_shift_effect(effect);
        }

        let layer = self.shift.layer();
        self.fire_key(key, layer, now);
    }

    fn key_released(&mut self, key: usize, now: Instant) {
        if key >= KEY_COUNT {
            return;
        }
        let held = self.key_down_at[key]
            .take()
            .map(|at| now.saturating_duration_since(at));

        if self.profile.shift_layer && key == SHIFT_KEY {
            match self.shift.shift_released(now) {
                ShiftEffect::FireShiftKey => self.fire_key(SHIFT_KEY, Layer::Base, now),
                effect => self.apply_shift_effect(effect),
            }
        }

        if key == TUNE_KEY && held.is_some_and(|h| h > self.settings.tune_hold) {
            info!("🎵 Playing test tune on channel {}", self.settings.channel + 1);
            self.tune.start(self.settings.channel, now);
        }
    }

    fn apply_shift_effect(&mut self, effect: ShiftEffect) {
        if let ShiftEffect::LayerChanged(layer) = effect {
            debug!("Layer → {} ({})", layer.label(), self.shift.state().label());
            self.resync_quad();
        }
    }

    /// Send a key's binding on the given layer
    fn fire_key(&mut self, key: usize, layer: Layer, now: Instant) {
        let binding = self.cache.resolve_layer(key, layer).clone();
        self.flash = Some((key, now + self.settings.key_flash));

        match &binding {
            Binding::NoOp => {
                debug!("{} key {} is unbound", layer.label(), key);
                return;
            }
            Binding::Command(cmd) => self.send_command(cmd),
            Binding::Macro(name) => self.run_macro(name),
        }

        self.last_action = binding.name().to_string();
        if binding.name() == TEMPO_TRIGGER {
            self.encoder.force(EncoderMode::Tempo, now);
            if self.config_error {
                info!("Config error acknowledged");
                self.config_error = false;
            }
        }
    }

    fn encoder_tick(&mut self, direction: Direction, now: Instant) {
        self.last_direction = Some(direction);
        if let Some(action) = self.encoder.rotate(direction, now) {
            self.send_encoder_action(action);
        }
    }

    /// Periodic housekeeping: mode timeouts, key flash, test tune, quad
    /// encoders. Only a quad board read failure is reported.
    pub fn poll(&mut self, now: Instant) -> Result<(), PeripheralError> {
        if let Some(expired) = self.encoder.check_timeout(now) {
            debug!(
                "{} idle timeout, back to {}",
                expired.label(),
                self.encoder.home().label()
            );
            self.last_direction = None;
        }

        if matches!(self.flash, Some((_, until)) if now >= until) {
            self.flash = None;
        }

        for message in self.tune.poll(now) {
            self.send(&message);
        }

        let result = self.poll_quad(now);
        self.refresh_surface(now);
        result
    }

    fn poll_quad(&mut self, now: Instant) -> Result<(), PeripheralError> {
        let layer = self.shift.layer();
        let (actions, wiring) = match &mut self.quad {
            Some(unit) if unit.enabled => {
                let positions = unit.board.positions()?;
                let pressed = unit.board.switches()?;
                (unit.tracker.poll(layer, positions, pressed, now), unit.wiring)
            }
            _ => return Ok(()),
        };

        for action in actions {
            self.apply_quad_action(action, &wiring);
        }
        Ok(())
    }

    /// Take the current quad positions as baseline, e.g. after a layer change
    fn resync_quad(&mut self) {
        if let Some(unit) = &mut self.quad {
            match unit.board.positions() {
                Ok(positions) => unit.tracker.resync(positions),
                Err(e) => warn!("⚠️  Quad encoder resync failed: {}", e),
            }
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn cache(&self) -> &KeyLookupCache {
        &self.cache
    }

    pub fn mode(&self) -> EncoderMode {
        self.encoder.mode()
    }

    pub fn shift_state(&self) -> ShiftState {
        self.shift.state()
    }

    pub fn layer(&self) -> Layer {
        self.shift.layer()
    }

    pub fn config_error(&self) -> bool {
        self.config_error
    }

    pub fn master_volume(&self) -> u8 {
        self.encoder.volume()
    }

    pub fn tempo_bpm(&self) -> u16 {
        self.tempo_bpm
    }

    pub fn quad_attached(&self) -> bool {
        self.quad.is_some()
    }

    pub fn quad_level(&self, channel: usize, layer: Layer) -> Option<u8> {
        self.quad.as_ref().and_then(|u| u.tracker.level(channel, layer))
    }

    pub fn tune_playing(&self) -> bool {
        self.tune.is_playing()
    }

    pub fn surface(&self) -> &SurfaceState {
        &self.surface
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
