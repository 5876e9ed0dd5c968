//! External collaborator interfaces
//!
//! The engine never talks to the advertising platform directly; it goes
//! through these traits. Production wires HTTP clients in, tests wire
//! scripted mocks. Remote failures arrive as a closed `RemoteError`
//! taxonomy: new error codes discovered in production get added to the
//! classifier, not handled ad hoc at call sites.

use adlift_model::{AccountRef, EntityKind, ExternalId, SlotError, SlotErrorKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Closed classification of remote API failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// Per-account call rate exceeded
    RateLimited,
    /// Network or remote timeout
    Timeout,
    /// 5xx-equivalent server failure
    ServerError,
    /// Entity spec rejected by platform validation
    Validation,
    /// Auth or permission refusal
    Permission,
    /// Resource already exists
    Duplicate,
}

/// One failed remote call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct RemoteError {
    /// Classification
    pub kind: RemoteErrorKind,
    /// Detail from the platform
    pub message: String,
    /// Server-supplied retry-after hint, if any
    pub retry_after: Option<Duration>,
}

impl RemoteError {
    /// Create a remote error
    #[inline]
    #[must_use]
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Rate-limit error
    #[inline]
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::RateLimited, message)
    }

    /// Timeout error
    #[inline]
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Timeout, message)
    }

    /// Server error
    #[inline]
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::ServerError, message)
    }

    /// Validation refusal
    #[inline]
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Validation, message)
    }

    /// Permission refusal
    #[inline]
    #[must_use]
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Permission, message)
    }

    /// Duplicate-resource refusal
    #[inline]
    #[must_use]
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Duplicate, message)
    }

    /// Attach a retry-after hint
    #[inline]
    #[must_use]
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Convert into the slot-level error record
    #[must_use]
    pub fn to_slot_error(&self) -> SlotError {
        let kind = match self.kind {
            RemoteErrorKind::RateLimited => SlotErrorKind::RateLimited,
            RemoteErrorKind::Timeout => SlotErrorKind::Timeout,
            RemoteErrorKind::ServerError => SlotErrorKind::ServerError,
            RemoteErrorKind::Validation => SlotErrorKind::Validation,
            RemoteErrorKind::Permission => SlotErrorKind::Permission,
            RemoteErrorKind::Duplicate => SlotErrorKind::Duplicate,
        };
        SlotError::new(kind, self.message.clone())
    }
}

/// Snapshot of the target account's standing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    /// Account not suspended or closed
    pub active: bool,
    /// A payment method is on file
    pub has_payment_method: bool,
    /// Account age in days
    pub age_days: u32,
    /// Remaining entity quota
    pub quota_remaining: u32,
}

/// Entity create/delete/exists surface of the advertising platform
#[async_trait::async_trait]
pub trait EntityCreationApi: Send + Sync {
    /// Create one entity under the given parent; returns the platform id
    async fn create(
        &self,
        kind: EntityKind,
        parent: Option<&ExternalId>,
        spec: &serde_json::Value,
    ) -> Result<ExternalId, RemoteError>;

    /// Delete one entity
    async fn delete(&self, kind: EntityKind, id: &ExternalId) -> Result<(), RemoteError>;

    /// Confirm an entity exists under the expected parent
    async fn exists(
        &self,
        kind: EntityKind,
        id: &ExternalId,
        parent: Option<&ExternalId>,
    ) -> Result<bool, RemoteError>;
}

/// Read-only account standing collaborator
#[async_trait::async_trait]
pub trait AccountStatusApi: Send + Sync {
    /// Fetch the account's current standing
    async fn status(&self, account: &AccountRef) -> Result<AccountStatus, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display() {
        let err = RemoteError::rate_limited("too many calls");
        assert!(err.to_string().contains("too many calls"));
    }

    #[test]
    fn retry_after_hint_round_trip() {
        let err = RemoteError::rate_limited("429").with_retry_after(Duration::from_secs(3));
        assert_eq!(err.retry_after, Some(Duration::from_secs(3)));
    }

    #[test]
    fn slot_error_conversion_keeps_message() {
        let err = RemoteError::validation("budget below minimum");
        let slot_err = err.to_slot_error();
        assert_eq!(slot_err.kind, SlotErrorKind::Validation);
        assert_eq!(slot_err.message, "budget below minimum");
    }
}
