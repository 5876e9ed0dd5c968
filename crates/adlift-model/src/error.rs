//! Model-level errors

use crate::job::JobStatus;
use crate::slot::SlotStatus;

/// Errors raised by the data model itself
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Job status transition not in the legality table
    #[error("illegal job transition: {from:?} -> {to:?}")]
    IllegalJobTransition {
        /// Current status
        from: JobStatus,
        /// Requested status
        to: JobStatus,
    },

    /// Slot status transition not in the legality table
    #[error("illegal slot transition: {from:?} -> {to:?}")]
    IllegalSlotTransition {
        /// Current status
        from: SlotStatus,
        /// Requested status
        to: SlotStatus,
    },

    /// External id set twice on the same slot
    #[error("external id is immutable once set")]
    ExternalIdAlreadySet,

    /// Move into `created` with no external id
    #[error("created status requires an external id")]
    MissingExternalId,

    /// Request failed validation before a job was created
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
