//! Client for the publishing platform's graph API.
//!
//! Layers, bottom up: [`transport`] moves bytes, [`batch`] packs logical
//! requests into one round trip, [`catalog`] exposes article operations.

pub mod batch;
pub mod catalog;
pub mod error;
pub mod sanitize;
pub mod token_pool;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchClient, BatchOptions, ErrorHandler};
pub use catalog::{ImportOutcome, Reassemble, RemoteArticle, RemoteCatalogClient, MAX_IDS_PER_CALL};
pub use error::{CallContext, PartFailure, PartFailureKind, RemoteError};
pub use sanitize::redact_secrets;
pub use token_pool::TokenPool;
pub use transport::{BatchPart, BatchRequest, GraphTransport, HttpGraphTransport, HttpMethod};
