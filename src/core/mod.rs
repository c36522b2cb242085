//! Core infrastructure — shared foundation used across the whole crate.
//!
//! - **settings** — environment-bound application settings.
//! - **error** — application-wide error enum.

pub mod error;
pub mod settings;
