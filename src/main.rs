mod accounts;
mod analytics;
mod assessments;
mod assignments;
mod config;
mod courses;
mod db;
mod enrollment;
mod error;
mod feedback;
mod files;
mod gate;
mod grading;
mod ipc;
mod model;
mod store;

use std::io::{self, BufRead, Write};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_env("LMSD_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let (config, config_error) = match config::LmsConfig::load() {
        Ok(c) => (c, None),
        Err(e) => (config::LmsConfig::default(), Some(e)),
    };
    init_tracing(&config.log_level);
    if let Some(e) = config_error {
        warn!(error = %format!("{e:#}"), "config not loaded, using defaults");
    }

    let startup_workspace = config.workspace.clone();
    let mut state = ipc::AppState::new(config);
    if let Some(path) = startup_workspace {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            warn!(error = %e, "startup workspace not opened");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "lmsd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                ipc::bad_json(&e.to_string())
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
