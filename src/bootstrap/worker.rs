//! Worker launch — the boundary between this crate and the worker main.
//!
//! # WorkerMain
//!
//! The job-processing loop itself lives outside this crate. A [`WorkerMain`]
//! wraps it: [`ProcessWorker`](super::process::ProcessWorker) runs it as an
//! external program, and embedders can implement the trait for an in-process
//! loop. [`WorkerBootstrap::launch`] hands it a [`WorkerContext`] and blocks
//! until it returns.
//!
//! # Startup state
//!
//! [`WorkerBootstrap`] owns what the launcher computes before delegating:
//! project root, search path (root first) and the environment overlay that
//! exports [`MODULE_PATH_VAR`] when the variable is unset.

use std::env;
use std::ffi::OsStr;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;

use tracing::info;

use super::paths::{self, EnvOverlay, SearchPath, MODULE_PATH_VAR};
use crate::error::AppError;
use crate::settings::Settings;

/// A boxed, owned future returned by [`WorkerMain::run`].
pub type WorkerFuture =
    Pin<Box<dyn Future<Output = Result<WorkerExit, AppError>> + Send + 'static>>;

/// Exit code reported by a worker main.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit(i32);

impl WorkerExit {
    pub const SUCCESS: WorkerExit = WorkerExit(0);

    pub fn new(code: i32) -> Self {
        Self(code)
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Map a child's exit status to a code. On Unix a child killed by a
    /// signal reports `128 + signal`, the shell convention.
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self(128 + signal);
            }
        }
        Self(1)
    }
}

/// Everything a worker main receives from the launcher.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub root: PathBuf,
    pub search_path: SearchPath,
    pub env: EnvOverlay,
    pub settings: Arc<Settings>,
}

/// The externally supplied worker main routine.
///
/// [`WorkerMain::run`] is called once and should return only when the worker
/// is done. Errors are not retried or translated by the launcher.
pub trait WorkerMain: Send + 'static {
    /// Stable identifier used in log messages.
    fn name(&self) -> &str;

    fn run(self: Box<Self>, ctx: WorkerContext) -> WorkerFuture;
}

/// Launcher state computed before the worker main takes over.
#[derive(Debug, Clone)]
pub struct WorkerBootstrap {
    root: PathBuf,
    search_path: SearchPath,
    env: EnvOverlay,
}

impl WorkerBootstrap {
    /// Resolve the root from the running executable and read the current
    /// [`MODULE_PATH_VAR`] from the process environment.
    pub fn locate() -> Result<Self, AppError> {
        let root = paths::project_root()?;
        let module_path = env::var_os(MODULE_PATH_VAR);
        Ok(Self::new(root, module_path.as_deref()))
    }

    /// Build from an explicit root and the current value of
    /// [`MODULE_PATH_VAR`] (`None` when unset).
    pub fn new(root: PathBuf, module_path: Option<&OsStr>) -> Self {
        let mut search_path = SearchPath::from_env_value(module_path);
        search_path.prepend(root.clone());

        let mut env = EnvOverlay::default();
        env.set_default(MODULE_PATH_VAR, module_path, root.as_os_str());

        Self { root, search_path, env }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn env(&self) -> &EnvOverlay {
        &self.env
    }

    pub fn context(&self, settings: Arc<Settings>) -> WorkerContext {
        WorkerContext {
            root: self.root.clone(),
            search_path: self.search_path.clone(),
            env: self.env.clone(),
            settings,
        }
    }

    /// Run `worker` to completion and return its exit code.
    pub async fn launch(
        self,
        worker: Box<dyn WorkerMain>,
        settings: Arc<Settings>,
    ) -> Result<WorkerExit, AppError> {
        let name = worker.name().to_string();
        info!(
            worker = %name,
            root = %self.root.display(),
            module_path_exported = self.env.get(MODULE_PATH_VAR).is_some(),
            "launching worker"
        );

        let exit = worker.run(self.context(settings)).await?;

        info!(worker = %name, code = exit.code(), "worker exited");
        Ok(exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    /// Records the context it was given and exits with a fixed code.
    struct RecordingWorker {
        code: i32,
        seen: oneshot::Sender<WorkerContext>,
    }

    impl WorkerMain for RecordingWorker {
        fn name(&self) -> &str {
            "recording"
        }

        fn run(self: Box<Self>, ctx: WorkerContext) -> WorkerFuture {
            Box::pin(async move {
                let _ = self.seen.send(ctx);
                Ok(WorkerExit::new(self.code))
            })
        }
    }

    struct FailingWorker;

    impl WorkerMain for FailingWorker {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(self: Box<Self>, _ctx: WorkerContext) -> WorkerFuture {
            Box::pin(async { Err(AppError::Worker("broker unreachable".into())) })
        }
    }

    #[test]
    fn unset_module_path_is_exported_as_root() {
        let boot = WorkerBootstrap::new(PathBuf::from("/srv/hr"), None);
        assert_eq!(boot.root(), Path::new("/srv/hr"));
        assert_eq!(boot.search_path().dirs(), &[PathBuf::from("/srv/hr")]);
        assert_eq!(boot.env().get(MODULE_PATH_VAR), Some(OsStr::new("/srv/hr")));
    }

    #[test]
    fn existing_module_path_is_left_unchanged() {
        let boot = WorkerBootstrap::new(PathBuf::from("/srv/hr"), Some(OsStr::new("/custom")));
        assert!(boot.env().get(MODULE_PATH_VAR).is_none());
        assert!(boot.env().is_empty());
        assert_eq!(
            boot.search_path().dirs(),
            &[PathBuf::from("/srv/hr"), PathBuf::from("/custom")]
        );
    }

    #[tokio::test]
    async fn launch_passes_context_and_returns_exit_code() {
        let (tx, rx) = oneshot::channel();
        let settings = Arc::new(Settings::default());
        let boot = WorkerBootstrap::new(PathBuf::from("/srv/hr"), Some(OsStr::new("/custom")));

        let exit = boot
            .launch(Box::new(RecordingWorker { code: 3, seen: tx }), settings.clone())
            .await
            .unwrap();
        assert_eq!(exit.code(), 3);
        assert!(!exit.is_success());

        let ctx = rx.await.unwrap();
        assert_eq!(ctx.root, PathBuf::from("/srv/hr"));
        assert_eq!(ctx.search_path.dirs()[0], PathBuf::from("/srv/hr"));
        assert!(ctx.env.is_empty());
        assert!(Arc::ptr_eq(&ctx.settings, &settings));
    }

    #[tokio::test]
    async fn worker_errors_propagate_untranslated() {
        let boot = WorkerBootstrap::new(PathBuf::from("/srv/hr"), None);
        let err = boot
            .launch(Box::new(FailingWorker), Arc::new(Settings::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Worker(msg) if msg == "broker unreachable"));
    }

    #[test]
    fn locate_uses_running_executable() {
        let boot = WorkerBootstrap::locate().unwrap();
        assert!(boot.root().is_dir());
        assert_eq!(boot.search_path().dirs()[0], boot.root());
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_mapping() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(WorkerExit::from_status(ExitStatus::from_raw(0)), WorkerExit::SUCCESS);
        // Raw wait status: exit code lives in the high byte.
        assert_eq!(WorkerExit::from_status(ExitStatus::from_raw(2 << 8)).code(), 2);
        // Terminated by SIGTERM (15).
        assert_eq!(WorkerExit::from_status(ExitStatus::from_raw(15)).code(), 143);
    }
}
