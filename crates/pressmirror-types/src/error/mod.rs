//! Typed error definitions shared across crates.

mod config;

pub use config::ConfigError;
