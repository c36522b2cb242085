//! Worker main backed by an external program.
//!
//! The child lives no longer than the launcher: termination signals sent to
//! the launcher are relayed to it, and a child that is never reaped is killed
//! when its handle drops.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use super::worker::{WorkerContext, WorkerExit, WorkerFuture, WorkerMain};
use crate::error::AppError;

/// Overrides the worker program (absolute path, relative path or bare name).
pub const WORKER_PROGRAM_VAR: &str = "MERCER_HR_WORKER";

/// Program run when [`WORKER_PROGRAM_VAR`] is unset, without the platform
/// executable suffix.
pub const DEFAULT_WORKER_PROGRAM: &str = "mercer-hr-worker";

/// Runs the worker as a child process with no arguments, inherited stdio and
/// the launcher's environment overlay applied.
#[derive(Debug, Clone)]
pub struct ProcessWorker {
    program: OsString,
}

impl ProcessWorker {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self { program: program.into() }
    }

    /// [`WORKER_PROGRAM_VAR`] if set and non-empty, else the default program.
    pub fn from_env() -> Self {
        match env::var_os(WORKER_PROGRAM_VAR) {
            Some(program) if !program.is_empty() => Self::new(program),
            _ => Self::new(format!("{DEFAULT_WORKER_PROGRAM}{}", env::consts::EXE_SUFFIX)),
        }
    }

    pub fn program(&self) -> &Path {
        Path::new(&self.program)
    }

    /// A bare name is looked up along the search path and left for the OS
    /// `PATH` lookup when nothing matches. Anything with a directory part is
    /// used as given.
    pub fn resolve(&self, ctx: &WorkerContext) -> PathBuf {
        let program = self.program();
        let is_bare = program
            .parent()
            .is_some_and(|parent| parent.as_os_str().is_empty());
        if !is_bare {
            return program.to_path_buf();
        }
        ctx.search_path
            .resolve(program)
            .unwrap_or_else(|| program.to_path_buf())
    }
}

impl WorkerMain for ProcessWorker {
    fn name(&self) -> &str {
        "process"
    }

    fn run(self: Box<Self>, ctx: WorkerContext) -> WorkerFuture {
        Box::pin(async move {
            let program = self.resolve(&ctx);
            debug!(program = %program.display(), "resolved worker program");

            let mut cmd = Command::new(&program);
            cmd.kill_on_drop(true);
            ctx.env.apply(&mut cmd);

            // Installed before the spawn so no signal arrives unhandled.
            let mut signals = relay::Relay::install()?;

            let mut child = cmd.spawn().map_err(|e| {
                AppError::Worker(format!("cannot start worker {}: {e}", program.display()))
            })?;
            info!(pid = ?child.id(), program = %program.display(), "worker process started");

            let status = loop {
                tokio::select! {
                    status = child.wait() => break status?,
                    signal = signals.recv() => relay::forward(&mut child, signal),
                }
            };
            Ok(WorkerExit::from_status(status))
        })
    }
}

/// Termination signals received by the launcher, passed on to the worker.
#[cfg(unix)]
mod relay {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use tokio::process::Child;
    use tokio::signal::unix::{self, SignalKind};
    use tracing::{info, warn};

    pub(super) struct Relay {
        terminate: unix::Signal,
        interrupt: unix::Signal,
        hangup: unix::Signal,
    }

    impl Relay {
        pub(super) fn install() -> std::io::Result<Self> {
            Ok(Self {
                terminate: unix::signal(SignalKind::terminate())?,
                interrupt: unix::signal(SignalKind::interrupt())?,
                hangup: unix::signal(SignalKind::hangup())?,
            })
        }

        pub(super) async fn recv(&mut self) -> Signal {
            tokio::select! {
                Some(()) = self.terminate.recv() => Signal::SIGTERM,
                Some(()) = self.interrupt.recv() => Signal::SIGINT,
                Some(()) = self.hangup.recv() => Signal::SIGHUP,
                else => std::future::pending().await,
            }
        }
    }

    /// Send `signal` to the worker and leave its shutdown to it.
    pub(super) fn forward(child: &mut Child, signal: Signal) {
        let Some(pid) = child.id() else {
            return;
        };
        info!(signal = signal.as_str(), pid, "forwarding signal to worker");
        if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
            warn!(signal = signal.as_str(), pid, "cannot signal worker: {e}");
        }
    }
}

/// Ctrl-C received by the launcher kills the worker.
#[cfg(not(unix))]
mod relay {
    use tokio::process::Child;
    use tracing::{info, warn};

    pub(super) struct Relay;

    impl Relay {
        pub(super) fn install() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub(super) async fn recv(&mut self) {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    pub(super) fn forward(child: &mut Child, _signal: ()) {
        info!("ctrl-c received, stopping worker");
        if let Err(e) = child.start_kill() {
            warn!("cannot stop worker: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::worker::WorkerBootstrap;
    use crate::settings::Settings;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ctx_for(root: &Path) -> WorkerContext {
        WorkerBootstrap::new(root.to_path_buf(), None).context(Arc::new(Settings::default()))
    }

    #[test]
    fn bare_name_resolves_through_search_path() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("hr-jobs"), b"").unwrap();

        let worker = ProcessWorker::new("hr-jobs");
        assert_eq!(worker.resolve(&ctx_for(root.path())), root.path().join("hr-jobs"));
    }

    #[test]
    fn bare_name_falls_back_to_os_lookup() {
        let root = TempDir::new().unwrap();
        let worker = ProcessWorker::new("hr-jobs");
        assert_eq!(worker.resolve(&ctx_for(root.path())), PathBuf::from("hr-jobs"));
    }

    #[test]
    fn paths_with_directories_are_used_as_given() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("hr-jobs"), b"").unwrap();

        let worker = ProcessWorker::new("./bin/hr-jobs");
        assert_eq!(worker.resolve(&ctx_for(root.path())), PathBuf::from("./bin/hr-jobs"));

        let worker = ProcessWorker::new("/usr/local/bin/hr-jobs");
        assert_eq!(
            worker.resolve(&ctx_for(root.path())),
            PathBuf::from("/usr/local/bin/hr-jobs")
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_worker_error() {
        let root = TempDir::new().unwrap();
        let worker = Box::new(ProcessWorker::new(root.path().join("no-such-worker")));
        let err = worker.run(ctx_for(root.path())).await.unwrap_err();
        assert!(matches!(err, AppError::Worker(_)));
        assert!(err.to_string().contains("no-such-worker"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn forwarded_signal_ends_the_worker() {
        let mut child = Command::new("sleep").arg("30").kill_on_drop(true).spawn().unwrap();
        relay::forward(&mut child, nix::sys::signal::Signal::SIGTERM);

        let status = child.wait().await.unwrap();
        assert_eq!(WorkerExit::from_status(status).code(), 143);

        // Reaped: nothing left to signal.
        relay::forward(&mut child, nix::sys::signal::Signal::SIGTERM);
        assert!(child.id().is_none());
    }
}
