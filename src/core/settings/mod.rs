//! Application settings bound from the environment.
//!
//! Sources, highest priority first: process environment, `.env` in the
//! current working directory, built-in defaults. Variable names match the
//! environment names in the binding table exactly (case-sensitive).
//!
//! Two ways in:
//!
//! - [`load`] / [`Settings::from_sources`] build an owned record that the
//!   caller constructs once and passes around (`Arc<Settings>`).
//! - [`get_settings`] returns a lazily initialised process-wide instance for
//!   code that cannot have it injected.
//!
//! # Module layout
//!
//! - **types** — the resolved `Settings` record, its defaults and helpers.
//! - **source** — environment and env-file snapshots (`Sources`, `Origin`).
//! - **bind** — the binding table, coercions and `SettingsError`.

mod bind;
mod source;
mod types;

use std::path::Path;
use std::sync::OnceLock;

pub use bind::{field_names, FieldError, Loaded, Provenance, SettingsError};
pub use source::{Origin, Sources};
pub use types::{DriveSettings, Settings};

/// Env file read by [`load`], relative to the current working directory.
pub const ENV_FILE: &str = ".env";

static SETTINGS: OnceLock<Result<Settings, SettingsError>> = OnceLock::new();

/// Build settings from the process environment and [`ENV_FILE`].
pub fn load() -> Result<Loaded, SettingsError> {
    let sources = Sources::from_process(Some(Path::new(ENV_FILE)))?;
    Settings::from_sources(&sources)
}

/// The process-wide settings instance.
///
/// The first call runs [`load`]; every later call, from any thread, returns
/// the same instance. A validation failure is cached the same way: the
/// configuration cannot become valid later in the life of the process.
pub fn get_settings() -> Result<&'static Settings, SettingsError> {
    shared(&SETTINGS, load)
}

fn shared(
    cell: &'static OnceLock<Result<Settings, SettingsError>>,
    init: impl FnOnce() -> Result<Loaded, SettingsError>,
) -> Result<&'static Settings, SettingsError> {
    cell.get_or_init(|| init().map(|loaded| loaded.settings))
        .as_ref()
        .map_err(Clone::clone)
}
