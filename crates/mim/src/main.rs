//! mim - mimeo CLI
//!
//! Record and replay keyboard/mouse macros from a terminal. The engine
//! does the work; this binary is the window layer: it forwards
//! start/stop/play requests and renders the engine's notifications.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use tracing_subscriber::EnvFilter;

use mimeo_core::events::{EventKind, Timeline};
use mimeo_core::keys::KeySymbol;
use mimeo_engine::inject::RdevInjector;
use mimeo_engine::player::{PlayOptions, Player, PlayerEvent};
use mimeo_engine::recorder::{Recorder, RecorderEvent};
use mimeo_engine::storage::MacroStore;

#[derive(Parser)]
#[command(name = "mim")]
#[command(about = "Record and replay keyboard/mouse macros")]
#[command(version)]
struct Cli {
    /// Macro store directory (defaults to ~/.mimeo)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a macro until the stop key is pressed
    Record {
        /// Name to save the recording under
        #[arg(short, long, default_value = "macro")]
        name: String,

        /// Key that ends the recording (consumed, never recorded)
        #[arg(long, default_value = "esc")]
        stop_key: KeySymbol,
    },

    /// Replay a saved macro (hold ctrl+esc to abort)
    Play {
        name: String,

        /// Number of full passes
        #[arg(short, long, default_value = "1")]
        repeat: u32,

        /// Playback speed (2.0 halves every delay)
        #[arg(short, long, default_value = "1.0")]
        speed: f64,

        /// Position multiplier applied before injection
        #[arg(long, default_value = "1.0")]
        scale: f64,
    },

    /// List saved macros in display order
    List,

    /// Show a macro's event summary
    Show {
        name: String,

        /// Print every event
        #[arg(long)]
        all: bool,
    },

    /// Rename a macro, keeping its position
    Rename { from: String, to: String },

    /// Delete a macro and its recording
    Delete { name: String },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let store = match &cli.store {
        Some(dir) => MacroStore::open(dir),
        None => MacroStore::open_default(),
    }
    .context("failed to open the macro store")?;

    match cli.command {
        Commands::Record { name, stop_key } => record(&store, &name, stop_key),
        Commands::Play {
            name,
            repeat,
            speed,
            scale,
        } => play(&store, &name, PlayOptions { repeat, speed, scale }),
        Commands::List => list(&store),
        Commands::Show { name, all } => show(&store, &name, all),
        Commands::Rename { from, to } => {
            store.rename(&from, &to)?;
            println!("Renamed '{from}' to '{to}'");
            Ok(())
        }
        Commands::Delete { name } => {
            store.delete(&name)?;
            println!("Deleted '{name}'");
            Ok(())
        }
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mimeo_engine=info,mim=info".into()),
        )
        .try_init();
}

fn record(store: &MacroStore, name: &str, stop_key: KeySymbol) -> Result<()> {
    let recorder = Recorder::new();
    recorder.begin(stop_key)?;
    println!("Recording '{name}' - press {stop_key} to finish, Ctrl+C to cut it short");

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;

    let events = recorder.events();
    let mut shown = 0usize;
    let timeline = loop {
        if cancelled.load(Ordering::SeqCst) {
            break recorder.end();
        }
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(RecorderEvent::Stopped { timeline, .. }) => break timeline,
            Ok(RecorderEvent::Started { .. }) => {}
            Err(RecvTimeoutError::Timeout) => {
                let count = recorder.event_count();
                if count != shown {
                    shown = count;
                    print!("\r{count} events");
                    io::stdout().flush()?;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break recorder.end(),
        }
    };

    println!("\n{} events recorded", timeline.len());
    let id = store.save(name, &timeline)?;
    println!("Saved '{name}' as {id}");
    Ok(())
}

fn play(store: &MacroStore, name: &str, opts: PlayOptions) -> Result<()> {
    let timeline = store.load_or_empty(name)?;
    if timeline.is_empty() {
        println!("'{name}' has no events to replay");
        return Ok(());
    }

    println!(
        "Replaying '{}' ({} events, repeat {}, speed {}x, scale {}) - hold ctrl+esc to abort",
        name,
        timeline.len(),
        opts.repeat,
        opts.speed,
        opts.scale
    );

    let player = Player::new(RdevInjector::new());
    player.play(timeline, opts)?;

    match player.events().recv() {
        Ok(PlayerEvent::Finished) => println!("Playback finished"),
        Ok(PlayerEvent::Interrupted) => println!("Playback interrupted"),
        Err(_) => {}
    }
    Ok(())
}

fn list(store: &MacroStore) -> Result<()> {
    let names = store.names();
    if names.is_empty() {
        println!("No macros saved.");
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

fn show(store: &MacroStore, name: &str, all: bool) -> Result<()> {
    let timeline = store.load(name)?;

    println!("Name: {name}");
    println!("Events: {}", timeline.len());
    println!("Duration: {:.2}s", timeline.duration());

    let mut summary = Summary::default();
    for event in &timeline {
        match &event.kind {
            EventKind::Move { .. } => summary.moves += 1,
            EventKind::Click { .. } => summary.clicks += 1,
            EventKind::Scroll { .. } => summary.scrolls += 1,
            EventKind::KeyPress { .. } => summary.key_presses += 1,
            EventKind::KeyRelease { .. } => summary.key_releases += 1,
        }
    }

    println!("\nSummary:");
    println!("  Moves: {}", summary.moves);
    println!("  Clicks: {}", summary.clicks);
    println!("  Scrolls: {}", summary.scrolls);
    println!("  Key presses: {}", summary.key_presses);
    println!("  Key releases: {}", summary.key_releases);

    if all {
        println!("\nEvents:");
        print_events(&timeline);
    }
    Ok(())
}

fn print_events(timeline: &Timeline) {
    for (i, event) in timeline.events().iter().enumerate() {
        println!("{i}: t={:.3} {:?}", event.t, event.kind);
    }
}

#[derive(Default)]
struct Summary {
    moves: usize,
    clicks: usize,
    scrolls: usize,
    key_presses: usize,
    key_releases: usize,
}
