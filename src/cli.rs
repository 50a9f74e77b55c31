//! Interactive console
//!
//! Stands in for the pad hardware: typed commands become input events for
//! the controller, and quad encoder commands move the virtual board.

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::error;

use crate::controller::Controller;
use crate::engine::quad::QUAD_CHANNELS;
use crate::input::{InputEvent, VirtualQuadBoard};
use crate::keymap::{Binding, Layer, KEY_COUNT};
use crate::transport::MidiTransport;

/// Parsed console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Press(usize),
    Release(usize),
    Tap(usize),
    /// Main encoder detents, signed
    Turn(i32),
    Switch,
    /// Quad encoder channel and detents
    Quad(usize, i32),
    QuadPress(usize),
    QuadRelease(usize),
    State,
    Help,
    Quit,
}

/// What the console hands to the main loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleMessage {
    Input(InputEvent),
    ShowState,
    Quit,
}

/// Parse one console line
pub fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or("").to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let number = |idx: usize| -> Result<i64, String> {
        let raw = args
            .get(idx)
            .ok_or_else(|| format!("'{}' needs {} argument(s)", verb, idx + 1))?;
        raw.parse::<i64>()
            .map_err(|_| format!("'{}' is not a number", raw))
    };
    let key = |idx: usize| -> Result<usize, String> {
        let n = number(idx)?;
        usize::try_from(n).map_err(|_| format!("key {} is negative", n))
    };
    let channel = |idx: usize| -> Result<usize, String> {
        let n = number(idx)?;
        usize::try_from(n)
            .ok()
            .filter(|c| *c < QUAD_CHANNELS)
            .ok_or_else(|| format!("quad channel must be 0-{}", QUAD_CHANNELS - 1))
    };
    let detents = |idx: usize| -> Result<i32, String> {
        let n = number(idx)?;
        i32::try_from(n).map_err(|_| format!("{} detents is too many", n))
    };

    match verb.as_str() {
        "press" | "p" => Ok(ConsoleCommand::Press(key(0)?)),
        "release" | "r" => Ok(ConsoleCommand::Release(key(0)?)),
        "tap" | "t" => Ok(ConsoleCommand::Tap(key(0)?)),
        "turn" => Ok(ConsoleCommand::Turn(detents(0)?)),
        "switch" | "sw" => Ok(ConsoleCommand::Switch),
        "quad" | "q" => Ok(ConsoleCommand::Quad(channel(0)?, detents(1)?)),
        "qpress" => Ok(ConsoleCommand::QuadPress(channel(0)?)),
        "qrelease" => Ok(ConsoleCommand::QuadRelease(channel(0)?)),
        "state" | "s" => Ok(ConsoleCommand::State),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(format!("Unknown command '{}' (try 'help')", other)),
    }
}

/// Tracks the simulated hardware behind the console commands
pub struct ConsoleDevice {
    encoder_position: i32,
    board: VirtualQuadBoard,
}

impl ConsoleDevice {
    pub fn new(board: VirtualQuadBoard) -> Self {
        Self {
            encoder_position: 0,
            board,
        }
    }

    /// Apply a command; returns the messages for the main loop
    pub fn apply(&mut self, command: ConsoleCommand) -> Vec<ConsoleMessage> {
        use ConsoleMessage::Input;

        match command {
            ConsoleCommand::Press(key) => vec![Input(InputEvent::KeyPressed(key))],
            ConsoleCommand::Release(key) => vec![Input(InputEvent::KeyReleased(key))],
            ConsoleCommand::Tap(key) => vec![
                Input(InputEvent::KeyPressed(key)),
                Input(InputEvent::KeyReleased(key)),
            ],
            ConsoleCommand::Turn(detents) => {
                let step = detents.signum();
                (0..detents.unsigned_abs())
                    .map(|_| {
                        self.encoder_position = self.encoder_position.wrapping_add(step);
                        Input(InputEvent::EncoderMoved(self.encoder_position))
                    })
                    .collect()
            }
            ConsoleCommand::Switch => vec![Input(InputEvent::EncoderSwitch)],
            ConsoleCommand::Quad(channel, detents) => {
                self.board.turn(channel, detents);
                Vec::new()
            }
            ConsoleCommand::QuadPress(channel) => {
                self.board.set_pressed(channel, true);
                Vec::new()
            }
            ConsoleCommand::QuadRelease(channel) => {
                self.board.set_pressed(channel, false);
                Vec::new()
            }
            ConsoleCommand::State => vec![ConsoleMessage::ShowState],
            ConsoleCommand::Help => {
                print_help();
                Vec::new()
            }
            ConsoleCommand::Quit => vec![ConsoleMessage::Quit],
        }
    }

    /// Baseline sample so the first turn already counts
    pub fn baseline(&self) -> ConsoleMessage {
        ConsoleMessage::Input(InputEvent::EncoderMoved(self.encoder_position))
    }
}

/// Run the console on a blocking thread
pub fn spawn_console(board: VirtualQuadBoard) -> mpsc::Receiver<ConsoleMessage> {
    let (tx, rx) = mpsc::channel(64);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = run_console(tx, board) {
            error!("Console stopped: {}", e);
        }
    });
    rx
}

fn run_console(tx: mpsc::Sender<ConsoleMessage>, board: VirtualQuadBoard) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut device = ConsoleDevice::new(board);

    print_help();
    if tx.blocking_send(device.baseline()).is_err() {
        return Ok(());
    }

    loop {
        match rl.readline("pad> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                let command = match parse_line(line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e.red());
                        continue;
                    }
                };

                for message in device.apply(command) {
                    if tx.blocking_send(message).is_err() {
                        return Ok(());
                    }
                }
                if command == ConsoleCommand::Quit {
                    return Ok(());
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = tx.blocking_send(ConsoleMessage::Quit);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn print_help() {
    println!("\n{}", "=== Arranger Pad Console ===".bold().cyan());
    println!("  {}  key down / up / both", "press N | release N | tap N".yellow());
    println!("  {}            main encoder detents / push", "turn ±N | switch".yellow());
    println!("  {}  quad encoder C (0-3)", "quad C ±N | qpress C | qrelease C".yellow());
    println!("  {}                       status / leave\n", "state | quit".yellow());
}

/// Print the controller status and current layer bindings
pub fn print_state<T: MidiTransport>(controller: &Controller<T>) {
    println!("\n{}", "=== Pad State ===".bold().cyan());
    println!("  Profile: {}", controller.profile().display_name.green());
    println!("  Mode:    {}", controller.mode().label().yellow());
    println!("  Shift:   {}", controller.shift_state().label().yellow());
    println!("  Volume:  {}", controller.master_volume());
    if controller.tempo_bpm() > 0 {
        println!("  Tempo:   {} BPM", controller.tempo_bpm());
    }
    if controller.config_error() {
        println!("  Keymap:  {}", "ERROR (press Start/Stop to acknowledge)".red());
    } else {
        println!("  Keymap:  {}", "ok".green());
    }

    if controller.quad_attached() {
        println!("\n{}", "Quad levels (base / shift):".bold());
        for channel in 0..QUAD_CHANNELS {
            let base = controller.quad_level(channel, Layer::Base).unwrap_or(0);
            let shift = controller.quad_level(channel, Layer::Shift).unwrap_or(0);
            println!("  {}: {:3} / {:3}", channel, base, shift);
        }
    }

    let layer = controller.layer();
    println!("\n{}", format!("{} layer:", layer.label()).bold());
    for key in 0..KEY_COUNT {
        let binding = controller.cache().resolve_layer(key, layer);
        let text = match binding {
            Binding::NoOp => "-".dimmed().to_string(),
            Binding::Command(cmd) => format!("{} {}", cmd.family, cmd.name),
            Binding::Macro(name) => format!("macro {}", name),
        };
        println!(
            "  [{:2}] {:<24} {}",
            key,
            text,
            controller.cache().color(key, layer).to_string().dimmed()
        );
    }

    let surface = controller.surface();
    println!(
        "\n  {} | {} | {}\n",
        surface.action.bright_white(),
        surface.knob,
        surface.info
    );
}

/// Print all MIDI output ports
pub fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    match crate::midi::output_port_names() {
        Ok(outputs) => {
            println!("\n{}", "Output Ports:".bold());
            if outputs.is_empty() {
                println!("  {}", "No output ports found".dimmed());
            } else {
                for name in outputs {
                    println!("  {}", name);
                }
            }
        }
        Err(e) => println!("  {}", format!("Cannot enumerate ports: {}", e).red()),
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("press 3"), Ok(ConsoleCommand::Press(3)));
        assert_eq!(parse_line("TAP 11"), Ok(ConsoleCommand::Tap(11)));
        assert_eq!(parse_line("turn +3"), Ok(ConsoleCommand::Turn(3)));
        assert_eq!(parse_line("turn -2"), Ok(ConsoleCommand::Turn(-2)));
        assert_eq!(parse_line("quad 2 -4"), Ok(ConsoleCommand::Quad(2, -4)));
        assert_eq!(parse_line("qpress 0"), Ok(ConsoleCommand::QuadPress(0)));
        assert_eq!(parse_line("switch"), Ok(ConsoleCommand::Switch));
        assert_eq!(parse_line("quit"), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("press").is_err());
        assert!(parse_line("press x").is_err());
        assert!(parse_line("press -1").is_err());
        assert!(parse_line("quad 4 1").is_err());
        assert!(parse_line("dance").is_err());
    }

    #[test]
    fn test_turn_emits_one_position_per_detent() {
        let mut device = ConsoleDevice::new(VirtualQuadBoard::new());
        assert_eq!(
            device.apply(ConsoleCommand::Turn(2)),
            vec![
                ConsoleMessage::Input(InputEvent::EncoderMoved(1)),
                ConsoleMessage::Input(InputEvent::EncoderMoved(2)),
            ]
        );
        assert_eq!(
            device.apply(ConsoleCommand::Turn(-1)),
            vec![ConsoleMessage::Input(InputEvent::EncoderMoved(1))]
        );
        assert!(device.apply(ConsoleCommand::Turn(0)).is_empty());
    }

    #[test]
    fn test_quad_commands_move_board() {
        use crate::input::QuadEncoderBoard;

        let board = VirtualQuadBoard::new();
        let mut polled = board.clone();
        let mut device = ConsoleDevice::new(board);

        assert!(device.apply(ConsoleCommand::Quad(1, 5)).is_empty());
        device.apply(ConsoleCommand::QuadPress(3));
        assert_eq!(polled.positions().unwrap(), [0, 5, 0, 0]);
        assert_eq!(polled.switches().unwrap(), [false, false, false, true]);
    }
}
