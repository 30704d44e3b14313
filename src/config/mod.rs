//! Configuration module for the dialogue synthesizer.
//!
//! Provides CLI argument parsing, environment overrides and the Kokoro voice catalogue.

#[allow(clippy::module_inception)]
mod config;
mod voices;

pub use config::{AppConfig, BackendKind};
pub use voices::get_voice;
