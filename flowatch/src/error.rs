use thiserror::Error;

use flowatch_core::client::FetchError;

use crate::store::StoreError;

/// Errors that terminate the process. Everything transient (fetch
/// hiccups, sink failures) is absorbed by the poll loop's backoff and
/// retry policies and never reaches this type.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Remote authorization failed, re-authorize and restart: {0}")]
    Authorization(FetchError),
    #[error("Snapshot store error: {0}")]
    Store(#[from] StoreError),
    #[error("Unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}
