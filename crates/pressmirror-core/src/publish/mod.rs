//! Test-bucket assignment and publishing.

mod ab_test;
mod pipeline;

pub use ab_test::{AbTestPoller, AbTestReport};
pub use pipeline::{
    random_bucket, BucketDraw, Partition, PipelineReport, PublishPipeline, Testable, Untestable,
    UntestableReason,
};

use crate::remote::RemoteError;
use crate::source::{RenderError, SourceError};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[cfg(test)]
mod tests;
