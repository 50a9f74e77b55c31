//! Audible connectivity check
//!
//! Plays a short phrase without blocking the main loop: `start` queues the
//! notes, `poll` releases whatever is due.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::midi::MidiMessage;

/// Opening of "Ode to Joy"
pub const PHRASE: [u8; 15] = [64, 64, 65, 67, 67, 65, 64, 62, 60, 60, 62, 64, 64, 62, 62];

const NOTE_LENGTH: Duration = Duration::from_millis(400);
const GAP: Duration = Duration::from_millis(100);
const VELOCITY: u8 = 120;

#[derive(Debug, Default)]
pub struct TunePlayer {
    queue: VecDeque<(Instant, MidiMessage)>,
}

impl TunePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Queue the phrase starting at `now`; restarts if already playing
    pub fn start(&mut self, channel: u8, now: Instant) {
        self.queue.clear();
        let mut at = now;
        for note in PHRASE {
            self.queue.push_back((
                at,
                MidiMessage::NoteOn { channel, note, velocity: VELOCITY },
            ));
            at += NOTE_LENGTH;
            self.queue.push_back((
                at,
                MidiMessage::NoteOff { channel, note, velocity: 0 },
            ));
            at += GAP;
        }
    }

    /// Messages due at `now`, in order
    pub fn poll(&mut self, now: Instant) -> Vec<MidiMessage> {
        let mut due = Vec::new();
        while let Some((at, _)) = self.queue.front() {
            if *at > now {
                break;
            }
            if let Some((_, msg)) = self.queue.pop_front() {
                due.push(msg);
            }
        }
        due
    }
}
