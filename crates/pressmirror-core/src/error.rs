//! Unified error type for pressmirror core.

use serde::Serialize;
use thiserror::Error;

use crate::feed::FeedError;
use crate::publish::PipelineError;
use crate::reconcile::ReconcileError;
use crate::remote::RemoteError;
use crate::source::{RenderError, SourceError};
use crate::store::StoreError;
use pressmirror_types::ConfigError;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Publishing platform call failed
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Content source error: {0}")]
    Source(#[from] SourceError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Change feed error: {0}")]
    Feed(#[from] FeedError),

    /// Poll cycle aborted; checkpoint unchanged
    #[error("Reconcile cycle failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Publish pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type AppResult<T> = Result<T, AppError>;
