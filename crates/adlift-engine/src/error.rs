//! Engine errors
//!
//! Remote-call failures are resolved internally (retried, reported, or
//! rolled back) before a job reaches a terminal state; the caller only
//! ever sees terminal job statuses and structured reports. `EngineError`
//! therefore covers infrastructure and usage failures, not individual
//! remote errors.

use crate::remote::RemoteError;
use adlift_model::ModelError;
use adlift_store::StoreError;

/// Engine-level errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Store access or compare-and-set failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Request rejected before a job row was created
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ModelError),

    /// A remote collaborator failed outside the retried creation path
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The job is being driven by another runner
    #[error("job already running")]
    AlreadyRunning,
}
