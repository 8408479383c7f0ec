//! # Pressmirror Core
//!
//! Keeps a canonical article catalogue mirrored onto a publishing platform
//! and runs the A/B share test.
//!
//! ```text
//! reconcile::ChangeReconciler ──► reconcile::CanonicalResolver ─┐
//!                                                               ├──► remote::RemoteCatalogClient
//! publish::AbTestPoller ──► publish::PublishPipeline ───────────┘         │
//!                                                                         ▼
//!                                              remote::BatchClient ──► retry::RetryExecutor
//! ```
//!
//! Collaborators behind traits: [`feed::ChangeFeed`], [`source::ArticleSource`],
//! [`source::Renderer`], [`store::Store`] and [`remote::GraphTransport`].

#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::indexing_slicing,
        reason = "Tests use panicking assertions"
    )
)]

pub mod error;
pub mod feed;
pub mod modules;
pub mod publish;
pub mod reconcile;
pub mod remote;
pub mod retry;
pub mod services;
pub mod source;
pub mod store;

pub use error::{AppError, AppResult};
pub use services::{Collaborators, Services};
