//! Quad encoder volume tracking
//!
//! Four auxiliary encoders each drive a level on the arranger. Every
//! channel keeps a volume shadow per key layer, so switching to the shift
//! layer retargets the knobs without losing either set of levels. The
//! encoder push switches fire presets, suppressed while held.

use std::time::{Duration, Instant};

use crate::keymap::Layer;

pub const QUAD_CHANNELS: usize = 4;
pub const MAX_LEVEL: u8 = 127;

/// Level every channel starts at
pub const INITIAL_LEVEL: u8 = 96;

/// Tuning from the keymap `Enc*` variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadSettings {
    /// Base step per tick (2, 4 or 8)
    pub step: u8,
    /// Clockwise raises the level
    pub forward: bool,
    /// Scale the step up for fast spins and low levels
    pub graduated: bool,
    /// Same-switch repeat suppression
    pub switch_window: Duration,
}

impl Default for QuadSettings {
    fn default() -> Self {
        Self {
            step: 8,
            forward: true,
            graduated: false,
            switch_window: Duration::from_millis(500),
        }
    }
}

/// Output of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadAction {
    /// Send `level` for `channel` on the given layer's target
    Level {
        channel: usize,
        layer: Layer,
        level: u8,
    },
    /// Run the switch preset for `channel` on the given layer
    Switch { channel: usize, layer: Layer },
}

#[derive(Debug, Clone, Copy)]
struct QuadChannel {
    levels: [u8; 2],
    last_position: Option<i32>,
    last_tick: Instant,
}

#[derive(Debug, Clone)]
pub struct QuadController {
    channels: [QuadChannel; QUAD_CHANNELS],
    settings: QuadSettings,
    last_switch: Option<(usize, Instant)>,
}

impl QuadController {
    pub fn new(settings: QuadSettings, now: Instant) -> Self {
        Self {
            channels: [QuadChannel {
                levels: [INITIAL_LEVEL; 2],
                last_position: None,
                last_tick: now,
            }; QUAD_CHANNELS],
            settings,
            last_switch: None,
        }
    }

    pub fn settings(&self) -> QuadSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: QuadSettings) {
        self.settings = settings;
    }

    pub fn level(&self, channel: usize, layer: Layer) -> Option<u8> {
        self.channels.get(channel).map(|c| c.levels[layer.index()])
    }

    /// Take the current positions as the new baseline without emitting ticks
    pub fn resync(&mut self, positions: [i32; QUAD_CHANNELS]) {
        for (channel, pos) in self.channels.iter_mut().zip(positions) {
            channel.last_position = Some(pos);
        }
    }

    /// Set every channel on both layers to `level`
    pub fn preset_all(&mut self, level: u8) {
        let level = level.min(MAX_LEVEL);
        for channel in &mut self.channels {
            channel.levels = [level; 2];
        }
    }

    /// Step size for the next increment
    pub fn adaptive_step(&self, level: u8, since_last_tick: Duration) -> u8 {
        let step = self.settings.step;
        if !self.settings.graduated {
            return step;
        }
        if since_last_tick < Duration::from_millis(100) || level < 32 {
            step.saturating_mul(4)
        } else if since_last_tick < Duration::from_millis(250) {
            step.saturating_mul(2)
        } else {
            step
        }
    }

    /// Process one sample of all four encoders.
    ///
    /// `pressed[n]` is true while channel `n`'s push switch is held.
    pub fn poll(
        &mut self,
        layer: Layer,
        positions: [i32; QUAD_CHANNELS],
        pressed: [bool; QUAD_CHANNELS],
        now: Instant,
    ) -> Vec<QuadAction> {
        let mut actions = Vec::new();

        if let Some((_, at)) = self.last_switch {
            if now.saturating_duration_since(at) > self.settings.switch_window {
                self.last_switch = None;
            }
        }

        for n in 0..QUAD_CHANNELS {
            let position = positions[n];
            let previous = self.channels[n].last_position.replace(position);

            if pressed[n] {
                if self.switch_allowed(n) {
                    actions.push(QuadAction::Switch { channel: n, layer });
                }
                // Held switches keep refreshing the suppression window
                self.last_switch = Some((n, now));
                continue;
            }

            let Some(previous) = previous else { continue };
            if position == previous {
                continue;
            }

            let raise = (position > previous) == self.settings.forward;
            let level = self.tick(n, layer, raise, now);
            actions.push(QuadAction::Level {
                channel: n,
                layer,
                level,
            });
        }

        actions
    }

    fn switch_allowed(&self, channel: usize) -> bool {
        !matches!(self.last_switch, Some((last, _)) if last == channel)
    }

    fn tick(&mut self, n: usize, layer: Layer, raise: bool, now: Instant) -> u8 {
        let since = now.saturating_duration_since(self.channels[n].last_tick);
        let current = self.channels[n].levels[layer.index()];
        let step = self.settings.step;

        let next = if raise {
            current.saturating_add(self.adaptive_step(current, since))
        } else if current == MAX_LEVEL {
            // 127 - (step - 1) lands back on the step grid
            current.saturating_sub(step.saturating_sub(1))
        } else {
            current.saturating_sub(step)
        }
        .min(MAX_LEVEL);

        let channel = &mut self.channels[n];
        channel.levels[layer.index()] = next;
        channel.last_tick = now;
        next
    }

    /// Force one channel's shadow on a layer, e.g. after a preset
    pub fn set_level(&mut self, channel: usize, layer: Layer, level: u8) {
        if let Some(c) = self.channels.get_mut(channel) {
            c.levels[layer.index()] = level.min(MAX_LEVEL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const IDLE: [bool; 4] = [false; 4];

    fn controller(now: Instant) -> QuadController {
        let mut q = QuadController::new(QuadSettings::default(), now);
        q.resync([0; 4]);
        q
    }

    #[test]
    fn test_first_sample_only_sets_baseline() {
        let t0 = Instant::now();
        let mut q = QuadController::new(QuadSettings::default(), t0);
        assert!(q.poll(Layer::Base, [5, 9, 0, -3], IDLE, t0).is_empty());
        assert!(q.poll(Layer::Base, [5, 9, 0, -3], IDLE, t0).is_empty());
    }

    #[test]
    fn test_clamp_at_top() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        q.set_level(0, Layer::Base, 120);

        for pos in 1..=3 {
            let t = t0 + Duration::from_secs(pos as u64);
            q.poll(Layer::Base, [pos, 0, 0, 0], IDLE, t);
            assert!(q.level(0, Layer::Base).unwrap() <= 127);
        }
        assert_eq!(q.level(0, Layer::Base), Some(127));
    }

    #[test]
    fn test_decrement_from_top_uses_step_minus_one() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        q.set_level(0, Layer::Base, 127);

        let actions = q.poll(Layer::Base, [-1, 0, 0, 0], IDLE, t0 + Duration::from_secs(1));
        assert_eq!(
            actions,
            vec![QuadAction::Level {
                channel: 0,
                layer: Layer::Base,
                level: 120
            }]
        );
    }

    #[test]
    fn test_clamp_at_bottom() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        q.set_level(2, Layer::Base, 5);
        q.poll(Layer::Base, [0, 0, -1, 0], IDLE, t0 + Duration::from_secs(1));
        assert_eq!(q.level(2, Layer::Base), Some(0));
    }

    #[test]
    fn test_reverse_polarity() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        q.set_settings(QuadSettings {
            forward: false,
            ..QuadSettings::default()
        });
        q.poll(Layer::Base, [0, 1, 0, 0], IDLE, t0 + Duration::from_secs(1));
        assert_eq!(q.level(1, Layer::Base), Some(88));
    }

    #[test]
    fn test_layers_have_separate_shadows() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        q.poll(Layer::Shift, [1, 0, 0, 0], IDLE, t0 + Duration::from_secs(1));
        assert_eq!(q.level(0, Layer::Shift), Some(104));
        assert_eq!(q.level(0, Layer::Base), Some(96));
    }

    #[test]
    fn test_adaptive_step() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        assert_eq!(q.adaptive_step(96, Duration::from_millis(50)), 8);

        q.set_settings(QuadSettings {
            graduated: true,
            ..QuadSettings::default()
        });
        assert_eq!(q.adaptive_step(96, Duration::from_millis(50)), 32);
        assert_eq!(q.adaptive_step(16, Duration::from_secs(2)), 32);
        assert_eq!(q.adaptive_step(96, Duration::from_millis(200)), 16);
        assert_eq!(q.adaptive_step(96, Duration::from_secs(1)), 8);
    }

    #[test]
    fn test_graduated_only_affects_increments() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        q.set_settings(QuadSettings {
            graduated: true,
            ..QuadSettings::default()
        });
        q.set_level(0, Layer::Base, 64);
        let t1 = t0 + Duration::from_millis(10);
        q.poll(Layer::Base, [-1, 0, 0, 0], IDLE, t1);
        assert_eq!(q.level(0, Layer::Base), Some(56));
    }

    #[test]
    fn test_switch_fires_once_per_press() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        let held = [false, true, false, false];

        let first = q.poll(Layer::Base, [0; 4], held, t0);
        assert_eq!(
            first,
            vec![QuadAction::Switch {
                channel: 1,
                layer: Layer::Base
            }]
        );

        // Still held well past the window: refreshed, never re-fires
        for ms in (100..2000).step_by(100) {
            let t = t0 + Duration::from_millis(ms);
            assert!(q.poll(Layer::Base, [0; 4], held, t).is_empty());
        }

        // Quick re-press after release is suppressed
        let released = t0 + Duration::from_millis(2000);
        q.poll(Layer::Base, [0; 4], IDLE, released + Duration::from_millis(100));
        assert!(q
            .poll(Layer::Base, [0; 4], held, released + Duration::from_millis(300))
            .is_empty());

        // After the window a new press fires again
        q.poll(Layer::Base, [0; 4], IDLE, released + Duration::from_millis(400));
        let later = released + Duration::from_secs(2);
        assert_eq!(q.poll(Layer::Base, [0; 4], held, later).len(), 1);
    }

    #[test]
    fn test_other_switch_not_suppressed() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        q.poll(Layer::Base, [0; 4], [true, false, false, false], t0);
        let actions = q.poll(Layer::Base, [0; 4], [false, false, true, false], t0);
        assert_eq!(
            actions,
            vec![QuadAction::Switch {
                channel: 2,
                layer: Layer::Base
            }]
        );
    }

    #[test]
    fn test_rotation_while_pressed_is_absorbed() {
        let t0 = Instant::now();
        let mut q = controller(t0);
        q.poll(Layer::Base, [3, 0, 0, 0], [true, false, false, false], t0);
        let after = q.poll(Layer::Base, [3, 0, 0, 0], IDLE, t0 + Duration::from_secs(1));
        assert!(after.is_empty());
        assert_eq!(q.level(0, Layer::Base), Some(96));
    }

    proptest! {
        #[test]
        fn prop_levels_stay_in_range(
            start in 0u8..=127,
            step in prop::sample::select(vec![2u8, 4, 8]),
            graduated in any::<bool>(),
            moves in prop::collection::vec(-3i32..=3, 1..60),
        ) {
            let t0 = Instant::now();
            let mut q = QuadController::new(
                QuadSettings { step, graduated, ..QuadSettings::default() },
                t0,
            );
            q.resync([0; 4]);
            q.set_level(0, Layer::Base, start);

            let mut pos = 0;
            for (i, delta) in moves.into_iter().enumerate() {
                pos += delta;
                let t = t0 + Duration::from_millis(50 * (i as u64 + 1));
                for action in q.poll(Layer::Base, [pos, 0, 0, 0], IDLE, t) {
                    if let QuadAction::Level { level, .. } = action {
                        prop_assert!(level <= MAX_LEVEL);
                    }
                }
            }
        }
    }
}
