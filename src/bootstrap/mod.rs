//! Bootstrap layer — everything the launcher does before the worker runs.
//!
//! - **logger** — tracing-subscriber initialisation.
//! - **paths** — project root, search path, environment overlay.
//! - **worker** — the `WorkerMain` boundary and `WorkerBootstrap`.
//! - **process** — `ProcessWorker`, the external-program worker main.

pub mod logger;
pub mod paths;
pub mod process;
pub mod worker;

pub use process::ProcessWorker;
pub use worker::{WorkerBootstrap, WorkerContext, WorkerExit, WorkerMain};
