//! Presence Guard - Main Entry Point
//!
//! Reads JSON commands from stdin, one per line, and writes one JSON
//! response per line to stdout. Alerts go to the JSONL sink under the
//! local data directory.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use presence_guard::api::commands;
use presence_guard::logic::config::{EngineConfig, CONFIG_ENV};
use presence_guard::logic::engine::Engine;
use presence_guard::logic::response::JsonlAlertSink;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Presence Guard v{}...", env!("CARGO_PKG_VERSION"));

    // First argument wins over the environment
    let config_path: Option<PathBuf> = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);

    let config = match &config_path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            log::error!("Cannot start: {}", e);
            std::process::exit(1);
        }
    };
    match &config_path {
        Some(path) => log::info!("Config loaded from {}", path.display()),
        None => log::info!("No config file given, using defaults"),
    }

    let sink_dir = JsonlAlertSink::default_dir();
    let sink = match JsonlAlertSink::new(&sink_dir) {
        Ok(sink) => sink,
        Err(e) => {
            log::error!("Cannot open alert sink in {}: {}", sink_dir.display(), e);
            std::process::exit(1);
        }
    };
    log::info!("Alerts written to {}", sink.current_file().display());

    let engine = match Engine::start(config, Arc::new(sink)) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("Cannot start engine: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &config_path {
        if let Err(e) = engine.watch_config(path.clone()) {
            log::warn!("Config hot reload disabled: {}", e);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let mut out = commands::handle_line(&engine, &line).to_line();
        out.push('\n');
        if let Err(e) = stdout.write_all(out.as_bytes()).await {
            log::error!("stdout write failed: {}", e);
            break;
        }
        let _ = stdout.flush().await;
    }

    engine.shutdown().await;
}
