//! # Nocturne - Metronome and Tuner Shell
//!
//! Terminal front end for the practice engine. It wires the live audio
//! collaborators, loads the saved settings, turns typed commands into
//! actions and prints the metronome, tuner and smoothed pitch display as
//! they change.
//!
//! ## Architecture
//! - **Runtime**: multi-threaded tokio runtime owning both stores
//! - **Audio**: output and capture worker threads inside `nocturne-core`
//! - **Input**: stdin lines parsed by [`command::parse`]
//! - **Output**: one task per published state, printing changed lines

mod command;
mod ui;

use anyhow::Context;
use clap::Parser;
use command::Command;
use nocturne_core::metronome::MetronomeAction;
use nocturne_core::pitch::{DisplayFeed, DisplayValues};
use nocturne_core::settings::MemorySettingsStore;
use nocturne_core::tuner::TunerAction;
use nocturne_core::{App, Collaborators, Config, LifecycleEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// How often the smoothed pitch display is reprinted at most.
const DISPLAY_PRINT_INTERVAL: Duration = Duration::from_millis(100);

/// Time given to the worker threads to wind down on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Nocturne - metronome and instrument tuner
#[derive(Parser, Debug)]
#[command(name = "nocturne", author, version, about, long_about = None)]
struct Cli {
    /// Path to a config.toml file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with click samples (<sound>_accent.wav / <sound>_normal.wav)
    #[arg(long)]
    samples_dir: Option<PathBuf>,

    /// Settings file to load and save instead of the configured one
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Keep settings in memory only
    #[arg(long)]
    no_persist: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let result = runtime.block_on(run(cli));

    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

/// `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(dir) = cli.samples_dir {
        config.samples_dir = Some(dir);
    }
    if let Some(path) = cli.settings {
        config.settings_path = Some(path);
    }
    config.validate()?;
    log::debug!("Configuration: {:?}", config);

    let mut collaborators = Collaborators::live(&config);
    if cli.no_persist {
        log::info!("Settings are kept in memory only");
        collaborators = collaborators.with_settings(Arc::new(MemorySettingsStore::new()));
    }

    let (feed, display) = DisplayFeed::spawn();
    let app = App::new(collaborators, Some(feed), config.debounce());
    app.start();

    tokio::spawn(print_changes(app.metronome().subscribe(), ui::main_display::metronome_line));
    tokio::spawn(print_changes(app.tuner().subscribe(), ui::main_display::tuner_line));
    tokio::spawn(print_display(display));

    println!("nocturne {} - type 'help' for commands", env!("CARGO_PKG_VERSION"));
    let outcome = command_loop(&app).await;

    app.lifecycle(LifecycleEvent::WillResignActive);
    app.lifecycle(LifecycleEvent::DidEnterBackground);

    // Lets a pending debounced save land before exiting.
    tokio::time::sleep(config.debounce() + Duration::from_millis(100)).await;
    outcome
}

/// Reads commands until `quit`, end of input or Ctrl-C.
async fn command_loop(app: &App) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    log::info!("End of input");
                    return Ok(());
                };
                match command::parse(&line) {
                    Ok(Some(Command::Quit)) => return Ok(()),
                    Ok(Some(command)) => dispatch(app, command),
                    Ok(None) => {}
                    Err(message) => eprintln!("{}", message),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                return Ok(());
            }
        }
    }
}

fn dispatch(app: &App, command: Command) {
    match command {
        Command::Metronome(action) => app.metronome().send(action),
        Command::Drag(degrees) => {
            let metronome = app.metronome();
            metronome.send(MetronomeAction::DialDragStarted);
            metronome.send(MetronomeAction::DialDragged {
                angle: degrees.to_radians(),
            });
            metronome.send(MetronomeAction::DialDragEnded);
        }
        Command::Tuner(action) => app.tuner().send(action),
        Command::ToggleMode => {
            let mode = command::toggled(app.tuner().state().mode);
            app.tuner().send(TunerAction::ModeChanged(mode));
        }
        Command::Help => println!("{}", command::HELP),
        Command::Quit => {}
    }
}

/// Prints `render(state)` whenever the rendered line changes.
async fn print_changes<S>(mut updates: watch::Receiver<S>, render: fn(&S) -> String) {
    let mut last = String::new();
    while updates.changed().await.is_ok() {
        let line = render(&updates.borrow_and_update());
        if line != last {
            println!("{}", line);
            last = line;
        }
    }
}

async fn print_display(mut values: watch::Receiver<DisplayValues>) {
    let mut interval = tokio::time::interval(DISPLAY_PRINT_INTERVAL);
    let mut last = String::new();
    loop {
        interval.tick().await;
        match values.has_changed() {
            Ok(true) => {}
            Ok(false) => continue,
            Err(_) => return,
        }
        let line = ui::main_display::display_line(&values.borrow_and_update());
        if line != last {
            println!("{}", line);
            last = line;
        }
    }
}
