//! KeyZone host entry point.
//!
//! Wires together the mapping pipeline and the platform services, then runs
//! until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from()         -- config.toml or defaults
//!  └─ AppState::build()          -- settings, dispatcher, aliases, engine, fan-out
//!  └─ start services
//!       ├─ HostWindow            (Windows: raw input on its own message thread)
//!       ├─ delay ticker          (Tokio task, started on demand by the dispatcher)
//!       └─ engine event logger   (Tokio task)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use keyzone_host::application::dispatch_midi::{TokioClock, NO_OUTPUT_DEVICES};
use keyzone_host::infrastructure::midi_output::MidirOutputPort;
use keyzone_host::infrastructure::storage::config::{config_file_path, load_config_from};
use keyzone_host::infrastructure::ui_bridge::AppState;

/// Play MIDI from ordinary keyboards and mice.
#[derive(Debug, Parser)]
#[command(name = "keyzone", version, about)]
struct Cli {
    /// Configuration file (defaults to the platform config directory).
    #[arg(long, env = "KEYZONE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level; `RUST_LOG` takes precedence.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the available MIDI outputs and exit.
    #[arg(long)]
    list_outputs: bool,

    /// Open this output (index from `--list-outputs`) instead of the configured one.
    #[arg(long)]
    output: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path().context("cannot locate the configuration directory")?,
    };
    let config = load_config_from(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!(config = %config_path.display(), "KeyZone starting");

    let state = AppState::build(
        config,
        config_path,
        Box::new(MidirOutputPort::new()),
        Arc::new(TokioClock::new()),
        Some(tokio::runtime::Handle::current()),
    );

    // ── MIDI output ───────────────────────────────────────────────────────────
    let outputs = state.dispatcher.device_names();
    if cli.list_outputs {
        for line in output_listing(&outputs) {
            println!("{line}");
        }
        return Ok(());
    }
    if let Some(index) = cli.output {
        match state.dispatcher.set_output_device(index) {
            Some(name) => info!(device = %name, "MIDI output selected"),
            None => warn!(index, "no MIDI output at that index"),
        }
    }
    if state.dispatcher.current_device().is_none() {
        warn!("no MIDI output open; notes will be dropped until one is selected");
    }

    // ── Engine event logger ───────────────────────────────────────────────────
    let mut events = state.engine().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(?event, "engine event"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "engine events skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // ── Input capture ─────────────────────────────────────────────────────────
    #[cfg(target_os = "windows")]
    let host_window = {
        use keyzone_host::infrastructure::input_capture::windows::HostWindow;
        match HostWindow::spawn(Arc::clone(&state.fanout)) {
            Ok(window) => Some(window),
            Err(e) => {
                warn!("input capture disabled: {e}");
                None
            }
        }
    };
    #[cfg(not(target_os = "windows"))]
    warn!("raw input capture is only available on Windows; running without input");

    info!("KeyZone ready.  Press Ctrl-C to exit.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    info!("shutdown signal received");

    #[cfg(target_os = "windows")]
    {
        if let Some(window) = host_window {
            window.stop();
        }
    }

    state.panic_and_flush();
    state.dispatcher.close_output();

    info!("KeyZone stopped");
    Ok(())
}

/// `--list-outputs` lines.  The "no devices" placeholder is not selectable, so it gets no index.
fn output_listing(outputs: &[String]) -> Vec<String> {
    match outputs {
        [only] if only == NO_OUTPUT_DEVICES => vec![only.clone()],
        _ => outputs
            .iter()
            .enumerate()
            .map(|(index, name)| format!("{index}: {name}"))
            .collect(),
    }
}
