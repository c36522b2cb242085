//! Mercer HR — settings provider and background worker launcher.
//!
//! The `run-worker` binary (src/main.rs) composes these modules; other
//! application crates depend on the library for [`settings`].

pub mod bootstrap;
pub mod core;

pub use crate::core::{error, settings};
