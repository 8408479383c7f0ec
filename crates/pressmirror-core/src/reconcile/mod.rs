//! Change detection over overlapping poll windows.

mod canonical;
mod reconciler;
mod window;

pub use canonical::{CanonicalResolver, Resolution};
pub use reconciler::{ChangeReconciler, IdOutcome, ReconcileReport, WindowReport};
pub use window::{ChangeSets, PollWindow};

use crate::feed::FeedError;
use crate::remote::RemoteError;
use crate::source::{RenderError, SourceError};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
