//! moexdash - terminal shell for the MOEX stock-analysis dashboard.
//!
//! Signs in against the dashboard backend, keeps the session alive across
//! token expiry, and shows the index dashboard and per-ticker forecasts.

mod app;
mod commands;
mod views;

use std::io;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use moexdash_core::Config;

use app::App;
use commands::{Command, HELP};

/// Directory for a daily rolling log file, in addition to stderr
const LOG_DIR_VAR: &str = "MOEXDASH_LOG_DIR";
const LOG_FILE_PREFIX: &str = "moexdash.log";

const USAGE: &str = "\
Usage: moexdash [COMMAND...]

Without a command, starts an interactive shell. With one, runs it and exits.

Environment:
  MOEXDASH_API_URL        Backend base URL (default http://localhost:8000)
  MOEXDASH_TIMEOUT_SECS   Request timeout in seconds (default 30)
  MOEXDASH_LOG_DIR        Also write logs to a daily file in this directory
  RUST_LOG                Log filter (default warn)";

/// Initialize the tracing subscriber for logging. The returned guard flushes
/// the log file on drop and must live as long as the program.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=moexdash_core=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_VAR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn load_config() -> Config {
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    config.apply_overrides(|key| std::env::var(key).ok());
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(args.first().map(String::as_str), Some("--help" | "-h")) {
        println!("{}\n\n{}", USAGE, HELP);
        return Ok(());
    }
    if matches!(args.first().map(String::as_str), Some("--version" | "-V")) {
        println!("moexdash {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let _log_guard = init_tracing();
    info!("moexdash starting");

    let config = load_config();
    let mut app = App::new(config)?;

    // Views resolve against the session, so the auth check always runs first
    app.boot().await?;

    if args.is_empty() {
        app.run().await?;
    } else {
        app.execute(Command::parse(&args.join(" "))).await?;
    }

    info!("moexdash shutting down");
    Ok(())
}
