//! Arranger Pad - macro pad to MIDI for Ketron and Yamaha arrangers

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arranger_pad::cli::{self, ConsoleMessage};
use arranger_pad::config::keymap_file::{self, KeymapFile};
use arranger_pad::config::{AppConfig, KeymapWatcher};
use arranger_pad::input::VirtualQuadBoard;
use arranger_pad::paths::AppPaths;
use arranger_pad::surface::{LogSurface, Surface};
use arranger_pad::transport::{LogTransport, MidiTransport, MidirTransport};
use arranger_pad::{Controller, ControllerSettings, DeviceProfile, KeymapError, ProfileKind};

/// Arranger Pad - drive Ketron EVM / EVM Plus or Yamaha Genos from a macro pad
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to keymap file
    #[arg(short, long)]
    keymap: Option<PathBuf>,

    /// Device profile (evm, evm_plus, genos); overrides the config file
    #[arg(short, long)]
    profile: Option<ProfileKind>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write a daily log file to the logs directory
    #[arg(long)]
    log_file: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Validate the keymap file and exit
    #[arg(long)]
    check_keymap: bool,

    /// Log outgoing MIDI instead of opening a port
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = AppPaths::detect();

    let log_dir = if args.log_file {
        paths.ensure_directories()?;
        Some(paths.logs_dir.as_path())
    } else {
        None
    };
    let _log_guard = init_logging(&args.log_level, log_dir)?;

    info!("Starting Arranger Pad v{}...", env!("CARGO_PKG_VERSION"));

    if args.list_ports {
        cli::list_ports_formatted();
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());
    info!("Configuration file: {}", config_path.display());
    let mut config = AppConfig::load_or_default(&config_path).await?;
    if let Some(kind) = args.profile {
        config.device.profile = kind;
    }

    let mut profile = DeviceProfile::for_kind(config.device.profile);
    if config.device.value_mode {
        profile = profile.with_value_mode();
    }

    let keymap_path = args
        .keymap
        .clone()
        .or_else(|| config.keymap.path.clone())
        .unwrap_or_else(|| paths.keymap.clone());

    if args.check_keymap {
        return check_keymap(&keymap_path, &profile).await;
    }

    run_app(args.dry_run, config, profile, keymap_path).await?;

    info!("Arranger Pad shutdown complete");
    Ok(())
}

async fn run_app(
    dry_run: bool,
    config: AppConfig,
    profile: DeviceProfile,
    keymap_path: PathBuf,
) -> Result<()> {
    let transport: Box<dyn MidiTransport> = if dry_run {
        info!("Dry run: outgoing MIDI is logged only");
        Box::new(LogTransport::new())
    } else {
        let pattern = config.midi.port_for(profile.kind);
        match MidirTransport::connect(pattern) {
            Ok(transport) => Box::new(transport),
            Err(e) => {
                error!("❌ {}", e);
                warn!("⚠️  Continuing without an arranger; use --list-ports to find the port name");
                Box::new(LogTransport::new())
            }
        }
    };

    let settings = ControllerSettings::from_config(&config, &profile);
    let now = Instant::now();
    info!("🎹 Profile: {} (channel {})", profile.display_name, settings.channel + 1);
    let mut controller = Controller::new(profile, settings, transport, now);

    let board = VirtualQuadBoard::new();
    if controller.attach_quad_board(Box::new(board.clone()), now) {
        info!("✅ Quad encoder board attached");
    }

    match tokio::fs::read_to_string(&keymap_path).await {
        Ok(text) => {
            info!("📝 Loading keymap {}", keymap_path.display());
            if let Ok(fallbacks) = controller.load_keymap_text(&text, Instant::now()) {
                if fallbacks > 0 {
                    warn!("⚠️  {} binding(s) fell back to no-op", fallbacks);
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No keymap at {}, using built-in bindings", keymap_path.display());
        }
        Err(e) => {
            let error = KeymapError::Io {
                path: keymap_path.clone(),
                message: e.to_string(),
            };
            controller.reject_keymap(&[error], Instant::now());
        }
    }

    let mut watcher = if config.keymap.hot_reload && keymap_path.exists() {
        match KeymapWatcher::new(keymap_path.clone()) {
            Ok(w) => {
                info!("Watching {} for changes", keymap_path.display());
                Some(w)
            }
            Err(e) => {
                warn!("⚠️  Keymap hot reload disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut console = cli::spawn_console(board);
    let mut surface = LogSurface::new();
    surface.render(controller.surface());

    let mut ticker = tokio::time::interval(config.timers.poll_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let recovery_pause = config.timers.recovery_pause();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!("Starting main loop...");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = controller.poll(Instant::now()) {
                    warn!("⚠️  {}", e);
                    tokio::time::sleep(recovery_pause).await;
                }
            }

            Some(message) = console.recv() => match message {
                ConsoleMessage::Input(event) => controller.handle_event(event, Instant::now()),
                ConsoleMessage::ShowState => cli::print_state(&controller),
                ConsoleMessage::Quit => break,
            },

            Some(text) = next_keymap(&mut watcher) => {
                info!("📝 Keymap file changed, reloading...");
                match controller.load_keymap_text(&text, Instant::now()) {
                    Ok(_) => info!("✅ Keymap reloaded"),
                    Err(_) => warn!("⚠️  Keymap rejected"),
                }
            }

            _ = &mut shutdown => break,
        }

        surface.render(controller.surface());
    }

    Ok(())
}

async fn next_keymap(watcher: &mut Option<KeymapWatcher>) -> Option<String> {
    match watcher {
        Some(w) => w.next_text().await,
        None => std::future::pending().await,
    }
}

/// Parse the keymap against the profile and print the result
async fn check_keymap(path: &Path, profile: &DeviceProfile) -> Result<()> {
    println!(
        "\n{}",
        format!("=== Checking {} ({}) ===", path.display(), profile.display_name)
            .bold()
            .cyan()
    );

    let checked = KeymapFile::load(path, profile.commands)
        .await
        .and_then(|file| file.overlay(&profile.default_keymap()).map(|_| file));

    match checked {
        Ok(file) => {
            println!("  Keys:   {}", file.keys.len().to_string().green());
            println!("  Macros: {}", file.macros.len().to_string().green());
            for key in &file.keys {
                println!(
                    "  {} key{:02} {} {}",
                    key.layer.label().dimmed(),
                    key.index,
                    key.binding_string(),
                    key.color.to_string().dimmed()
                );
            }
            println!("\n{}", "✅ Keymap OK".green().bold());
            Ok(())
        }
        Err(errors) => {
            for e in &errors {
                println!("  {} {}", "✗".red(), e);
            }
            keymap_file::report(&errors);
            anyhow::bail!("{} error(s) in {}", errors.len(), path.display())
        }
    }
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "arranger-pad.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(false),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            Ok(None)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
