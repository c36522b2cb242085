//! Project root, module search path and the worker's environment overlay.
//!
//! Everything here is computed once by the launcher and handed to the
//! worker explicitly; the launcher's own process environment is left alone.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::error::AppError;

/// Module search path variable exported to the worker.
pub const MODULE_PATH_VAR: &str = "MERCER_HR_PATH";

/// Directory containing the running executable.
pub fn project_root() -> Result<PathBuf, AppError> {
    let exe = env::current_exe()
        .map_err(|e| AppError::Bootstrap(format!("cannot locate running executable: {e}")))?;
    root_of(&exe)
}

/// Directory containing `exe`, with symlinks resolved where possible.
pub fn root_of(exe: &Path) -> Result<PathBuf, AppError> {
    let exe = exe.canonicalize().unwrap_or_else(|_| exe.to_path_buf());
    match exe.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(PathBuf::from(".")),
        Some(parent) => Ok(parent.to_path_buf()),
        None => Err(AppError::Bootstrap(format!(
            "executable path has no parent directory: {}",
            exe.display()
        ))),
    }
}

/// Ordered list of directories searched for worker programs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath(Vec<PathBuf>);

impl SearchPath {
    /// Parse a platform path list (`:`-separated on Unix, `;` on Windows).
    /// Empty entries are dropped.
    pub fn from_env_value(value: Option<&OsStr>) -> Self {
        let dirs: Vec<PathBuf> = value
            .map(|v| {
                env::split_paths(v)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self(dirs)
    }

    /// Put `dir` first. An existing occurrence is moved rather than duplicated.
    pub fn prepend(&mut self, dir: PathBuf) {
        self.0.retain(|d| d != &dir);
        self.0.insert(0, dir);
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.0
    }

    /// First `dir/name` that exists as a file, in search order.
    pub fn resolve(&self, name: &Path) -> Option<PathBuf> {
        self.0
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

/// Environment variables set on the worker, on top of what it inherits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay(Vec<(String, OsString)>);

impl EnvOverlay {
    /// Record `key=value` unless `current` shows the variable is already set.
    /// An existing value, even an empty one, is never overridden.
    pub fn set_default(&mut self, key: &str, current: Option<&OsStr>, value: impl Into<OsString>) {
        if current.is_some() {
            return;
        }
        self.0.retain(|(k, _)| k != key);
        self.0.push((key.to_string(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OsStr)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_os_str()))
    }

    pub fn apply(&self, cmd: &mut Command) {
        for (key, value) in self.iter() {
            cmd.env(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn root_is_executable_directory() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("run-worker");
        std::fs::write(&exe, b"").unwrap();

        let root = root_of(&exe).unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn bare_executable_name_resolves_to_current_dir() {
        let root = root_of(Path::new("definitely-not-a-real-binary")).unwrap();
        assert_eq!(root, PathBuf::from("."));
    }

    #[test]
    fn running_test_binary_has_a_root() {
        let root = project_root().unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn search_path_parses_and_prepends() {
        let joined = env::join_paths(["/opt/a", "/opt/b"]).unwrap();
        let mut sp = SearchPath::from_env_value(Some(joined.as_os_str()));
        assert_eq!(sp.dirs(), &[PathBuf::from("/opt/a"), PathBuf::from("/opt/b")]);

        sp.prepend(PathBuf::from("/srv/hr"));
        assert_eq!(sp.dirs()[0], PathBuf::from("/srv/hr"));
        assert_eq!(sp.dirs().len(), 3);

        sp.prepend(PathBuf::from("/opt/b"));
        assert_eq!(
            sp.dirs(),
            &[PathBuf::from("/opt/b"), PathBuf::from("/srv/hr"), PathBuf::from("/opt/a")]
        );
    }

    #[test]
    fn search_path_skips_empty_entries() {
        assert!(SearchPath::from_env_value(None).dirs().is_empty());
        assert!(SearchPath::from_env_value(Some(OsStr::new(""))).dirs().is_empty());
    }

    #[test]
    fn resolve_takes_first_match() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        std::fs::write(second.path().join("worker"), b"").unwrap();

        let mut sp = SearchPath::default();
        sp.prepend(second.path().to_path_buf());
        sp.prepend(first.path().to_path_buf());
        assert_eq!(sp.resolve(Path::new("worker")), Some(second.path().join("worker")));

        std::fs::write(first.path().join("worker"), b"").unwrap();
        assert_eq!(sp.resolve(Path::new("worker")), Some(first.path().join("worker")));

        assert_eq!(sp.resolve(Path::new("missing")), None);
    }

    #[test]
    fn overlay_sets_unset_variable() {
        let mut overlay = EnvOverlay::default();
        overlay.set_default(MODULE_PATH_VAR, None, "/srv/hr");
        assert_eq!(overlay.get(MODULE_PATH_VAR), Some(OsStr::new("/srv/hr")));
    }

    #[test]
    fn overlay_never_overrides_existing_value() {
        let mut overlay = EnvOverlay::default();
        overlay.set_default(MODULE_PATH_VAR, Some(OsStr::new("/custom")), "/srv/hr");
        assert!(overlay.is_empty());

        overlay.set_default(MODULE_PATH_VAR, Some(OsStr::new("")), "/srv/hr");
        assert!(overlay.get(MODULE_PATH_VAR).is_none());
    }
}
