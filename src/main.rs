//! Mercer HR — background worker launcher.
//!
//! Startup sequence:
//!   1. Init logger (`RUST_LOG`, default `info`)
//!   2. Resolve project root, search path and environment overlay
//!   3. Load settings (environment > `.env` > defaults), abort if invalid
//!   4. Hand control to the worker main and block until it exits
//!   5. Exit with the worker's exit code

use std::sync::Arc;

use tracing::{debug, info, warn};

use mercer_hr::bootstrap::{logger, ProcessWorker, WorkerBootstrap, WorkerExit};
use mercer_hr::error::AppError;
use mercer_hr::settings;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match run().await {
        Ok(exit) => std::process::exit(exit.code()),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<WorkerExit, AppError> {
    logger::init(logger::DEFAULT_LEVEL)?;

    let bootstrap = WorkerBootstrap::locate()?;
    info!(
        root = %bootstrap.root().display(),
        search_path_len = bootstrap.search_path().dirs().len(),
        "bootstrap ready"
    );

    let loaded = settings::load()?;
    for (field, origin) in loaded.provenance.iter() {
        debug!(field, origin = origin.as_str(), "setting resolved");
    }
    for field in loaded.settings.insecure_defaults() {
        warn!(field, "placeholder credential in use, set it before deploying");
    }
    info!(
        database_backend = loaded.settings.database_url.split(':').next().unwrap_or(""),
        code_execution_timeout_s = loaded.settings.code_execution_timeout_seconds,
        max_file_size_bytes = loaded.settings.max_file_size_bytes,
        "settings loaded"
    );

    let worker = ProcessWorker::from_env();
    bootstrap
        .launch(Box::new(worker), Arc::new(loaded.settings))
        .await
}
