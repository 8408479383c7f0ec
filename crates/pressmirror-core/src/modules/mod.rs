//! Process-level concerns: configuration files and logging.

pub mod config;
pub mod logger;
