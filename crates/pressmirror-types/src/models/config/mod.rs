//! Configuration models.

mod app;
mod sections;

pub use app::AppConfig;
pub use sections::{
    AbTestConfig, FeedConfig, PollerConfig, RemoteConfig, ServerConfig, SourceConfig,
};
