//! Outbound dispatch: resolved commands, encoder actions and quad levels
//! turned into MIDI messages for the profile's protocol

use tracing::{debug, warn};

use super::Controller;
use crate::commands::{yamaha, Family};
use crate::engine::{Direction, EncoderAction, QuadAction};
use crate::keymap::{Command, Layer};
use crate::midi::MidiMessage;
use crate::profile::{knob, LevelTarget, Protocol, QuadProfile, TempoControl};
use crate::protocol;
use crate::transport::MidiTransport;

/// Expression CC used as the master volume in Volume mode
pub const MASTER_VOLUME_CC: u8 = 11;

impl<T: MidiTransport> Controller<T> {
    /// Send one message; failures are logged and otherwise ignored
    pub(crate) fn send(&mut self, message: &MidiMessage) {
        if let Err(e) = self.transport.send(message) {
            warn!("⚠️  {} ({})", e, message);
        }
    }

    pub(crate) fn send_command(&mut self, cmd: &Command) {
        let channel = self.settings.channel;
        let messages: Vec<MidiMessage> = match (cmd.family, self.profile.protocol) {
            (Family::Pedal, Protocol::Ketron) => vec![
                protocol::ketron_pedal(cmd.code, true),
                protocol::ketron_pedal(cmd.code, false),
            ],
            (Family::Pedal, Protocol::Yamaha) if cmd.name == yamaha::START_STOP => {
                self.style_running = !self.style_running;
                vec![protocol::yamaha_start_stop(self.style_running)]
            }
            (Family::Pedal, Protocol::Yamaha) => vec![
                protocol::yamaha_section(cmd.code, true),
                protocol::yamaha_section(cmd.code, false),
            ],
            (Family::Tab, _) => vec![
                protocol::ketron_tab(cmd.code, true),
                protocol::ketron_tab(cmd.code, false),
            ],
            (Family::Cc, _) => protocol::cc_pair(channel, cmd.code).to_vec(),
            (Family::Note, _) => protocol::note_pair(channel, cmd.code).to_vec(),
            (Family::Macro, _) => {
                warn!("Macro '{}' cannot be sent as a command", cmd.name);
                return;
            }
        };

        debug!("{} {} (0x{:02X})", cmd.family, cmd.name, cmd.code);
        for message in &messages {
            self.send(message);
        }
    }

    /// Send each resolved step of a macro in order
    pub(crate) fn run_macro(&mut self, name: &str) {
        let Some(steps) = self.cache.macro_steps(name).map(<[Command]>::to_vec) else {
            warn!("Macro '{}' is not defined", name);
            return;
        };
        debug!("Macro {} ({} steps)", name, steps.len());
        for step in &steps {
            self.send_command(step);
        }
    }

    /// Look up a command by name in the profile tables and send it
    fn send_named(&mut self, family: Family, name: &str) {
        match self.cache.commands().lookup(family, name) {
            Some(code) => self.send_command(&Command {
                family,
                name: name.to_string(),
                code,
            }),
            None => warn!("{} command '{}' missing from {} tables", family, name, self.profile.display_name),
        }
    }

    pub(crate) fn send_encoder_action(&mut self, action: EncoderAction) {
        match action {
            EncoderAction::Rotor(direction) => {
                let name = match direction {
                    Direction::Up => knob::ROTOR_FAST,
                    Direction::Down => knob::ROTOR_SLOW,
                };
                self.send_named(Family::Tab, name);
            }
            EncoderAction::Tempo(direction) => match self.profile.tempo {
                TempoControl::Commands => {
                    let name = match direction {
                        Direction::Up => knob::TEMPO_UP,
                        Direction::Down => knob::TEMPO_DOWN,
                    };
                    self.send_named(Family::Pedal, name);
                }
                TempoControl::Absolute { .. } => {
                    self.tempo_bpm = match direction {
                        Direction::Up => self.tempo_bpm.saturating_add(1),
                        Direction::Down => self.tempo_bpm.saturating_sub(1),
                    }
                    .clamp(yamaha::MIN_BPM, yamaha::MAX_BPM);
                    debug!("Tempo {} BPM", self.tempo_bpm);
                    self.send(&protocol::yamaha_tempo(self.tempo_bpm));
                }
            },
            EncoderAction::Value(direction) => {
                let name = match direction {
                    Direction::Up => knob::DIAL_UP,
                    Direction::Down => knob::DIAL_DOWN,
                };
                self.send_named(Family::Tab, name);
            }
            EncoderAction::Volume(level) => {
                let message = protocol::cc_level(self.settings.channel, MASTER_VOLUME_CC, level);
                self.send(&message);
            }
        }
    }

    fn send_level(&mut self, target: LevelTarget, level: u8) {
        let message = match target {
            LevelTarget::Cc(cc) => protocol::cc_level(self.settings.channel, cc, level),
            LevelTarget::Efx(code) => protocol::ketron_efx_level(code, level),
        };
        self.send(&message);
    }

    pub(crate) fn apply_quad_action(&mut self, action: QuadAction, wiring: &QuadProfile) {
        match action {
            QuadAction::Level { channel, layer, level } => {
                let target = wiring.targets[layer.index()][channel];
                debug!("Quad {} {} → {}", wiring.labels[layer.index()][channel], layer.label(), level);
                self.send_level(target, level);
                self.last_action = format!("{} {}", wiring.labels[layer.index()][channel], level);
            }
            QuadAction::Switch { channel, layer } => {
                let Some(preset) = wiring.presets[layer.index()][channel] else {
                    debug!("Quad switch {} has no preset on {} layer", channel, layer.label());
                    return;
                };

                for target in preset.targets {
                    self.send_level(*target, preset.level);
                }

                if let Some(unit) = &mut self.quad {
                    if preset.sync_all {
                        unit.tracker.preset_all(preset.level);
                    } else {
                        for l in [Layer::Base, Layer::Shift] {
                            for (ch, target) in wiring.targets[l.index()].iter().enumerate() {
                                if preset.targets.contains(target) {
                                    unit.tracker.set_level(ch, l, preset.level);
                                }
                            }
                        }
                    }
                }

                debug!("Quad preset {}", preset.label);
                self.last_action = preset.label.to_string();
            }
        }
    }
}
