//! Raw key/value sources the settings are bound from.
//!
//! Two layers, highest priority first: the process environment and the
//! optional `.env` file. Both are snapshotted once; the process environment
//! is never modified.

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::Path;

use super::SettingsError;

/// Where a field's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Environment,
    EnvFile,
    Default,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Environment => "environment",
            Origin::EnvFile => "env-file",
            Origin::Default => "default",
        }
    }
}

/// A value found for a bound name. `text` is `None` when the environment
/// holds bytes that are not valid Unicode.
pub(crate) struct Found<'a> {
    pub text: Option<&'a str>,
    pub origin: Origin,
}

/// Snapshot of the environment and env-file layers.
///
/// Names are compared exactly: `secret_key` never binds `SECRET_KEY`.
#[derive(Clone, Default)]
pub struct Sources {
    env: HashMap<String, OsString>,
    file: HashMap<String, String>,
}

impl Sources {
    /// No environment, no file: every field resolves to its default.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment and, if given, the env file.
    ///
    /// A missing env file is not an error. Variables whose *names* are not
    /// valid Unicode cannot match any field and are skipped.
    pub fn from_process(env_file: Option<&Path>) -> Result<Self, SettingsError> {
        let env = env::vars_os()
            .filter_map(|(k, v)| k.into_string().ok().map(|k| (k, v)))
            .collect();
        let file = match env_file {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };
        Ok(Self { env, file })
    }

    /// Add or replace an environment-layer entry.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add or replace an env-file-layer entry.
    pub fn with_file_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.file.insert(key.into(), value.into());
        self
    }

    /// Replace the env-file layer with the contents of `path`.
    pub fn with_env_file(mut self, path: &Path) -> Result<Self, SettingsError> {
        self.file = read_env_file(path)?;
        Ok(self)
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Found<'_>> {
        if let Some(value) = self.env.get(name) {
            return Some(Found { text: value.to_str(), origin: Origin::Environment });
        }
        self.file
            .get(name)
            .map(|value| Found { text: Some(value.as_str()), origin: Origin::EnvFile })
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, SettingsError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => {
            return Err(SettingsError::EnvFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };
    iter.map(|item| {
        item.map_err(|e| SettingsError::EnvFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })
    .collect()
}
