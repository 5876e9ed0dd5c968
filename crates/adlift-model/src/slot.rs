//! Slot record and its attempt state machine
//!
//! A slot is one remote entity (campaign, ad set, or ad) its owning job
//! must bring into existence. Slots are the unit of retry, verification,
//! and rollback.

use crate::error::ModelError;
use crate::ids::{ExternalId, JobId, SlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of remote entity a slot stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Top of the hierarchy; exactly one per job
    Campaign,
    /// Child of the campaign
    AdSet,
    /// Child of an ad set
    Ad,
}

impl EntityKind {
    /// Depth in the hierarchy, campaign first
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> u8 {
        match self {
            Self::Campaign => 0,
            Self::AdSet => 1,
            Self::Ad => 2,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Campaign => write!(f, "campaign"),
            Self::AdSet => write!(f, "ad_set"),
            Self::Ad => write!(f, "ad"),
        }
    }
}

/// Per-slot attempt state machine
///
/// `pending → creating → {created | failed_transient → creating |
/// failed_permanent}`. A slot stranded `pending` by a permanently failed
/// parent is terminal for its job. `created` may only move to
/// `rolled_back`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Not yet attempted
    Pending,
    /// A worker holds the slot and the remote call is in flight
    Creating,
    /// Remote create succeeded; `external_id` is set
    Created,
    /// Last attempt failed retryably; waiting for backoff
    FailedTransient,
    /// Not retryable, or retry budget exhausted
    FailedPermanent,
    /// Compensating delete completed
    RolledBack,
}

impl SlotStatus {
    /// Returns true if no further attempt transitions are possible
    ///
    /// `Pending` is not listed: it is terminal only in the stranded-parent
    /// case, which the store cannot distinguish locally.
    #[inline]
    #[must_use]
    pub const fn is_attempt_terminal(&self) -> bool {
        matches!(self, Self::Created | Self::FailedPermanent | Self::RolledBack)
    }

    /// Check if transition from this status to target is valid
    #[must_use]
    pub fn can_transition_to(&self, target: SlotStatus) -> bool {
        use SlotStatus::*;
        matches!(
            (self, target),
            (Pending, Creating)
                | (Creating, Created)
                | (Creating, FailedTransient)
                | (Creating, FailedPermanent)
                | (FailedTransient, Creating)
                | (FailedTransient, FailedPermanent)
                | (Created, RolledBack)
        )
    }
}

/// Closed classification of a slot's last recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotErrorKind {
    /// Remote rate limit hit
    RateLimited,
    /// Network or remote timeout
    Timeout,
    /// Remote 5xx-equivalent
    ServerError,
    /// Remote rejected the entity spec
    Validation,
    /// Auth/permission refusal
    Permission,
    /// Duplicate-resource refusal
    Duplicate,
    /// Transient failures outlasted the job retry budget
    RetryBudgetExhausted,
    /// Claimed-created entity not found on re-check
    VerificationDiscrepancy,
    /// Compensating delete failed; the entity remains remotely
    RollbackFailed,
}

/// Last error recorded against a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotError {
    /// Classification
    pub kind: SlotErrorKind,
    /// Human-readable detail from the remote API
    pub message: String,
}

impl SlotError {
    /// Create a new slot error
    #[inline]
    #[must_use]
    pub fn new(kind: SlotErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One remote entity a job must create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    /// Slot identifier
    pub id: SlotId,
    /// Owning job
    pub job_id: JobId,
    /// Entity kind
    pub kind: EntityKind,
    /// Parent slot; `None` only for the campaign slot
    pub parent: Option<SlotId>,
    /// Position within its kind, for deterministic naming/ordering
    pub index: usize,
    /// Current attempt status
    pub status: SlotStatus,
    /// Remote id; immutable once set
    pub external_id: Option<ExternalId>,
    /// Opaque creation payload handed to the remote API
    pub spec: serde_json::Value,
    /// Number of create attempts made
    pub attempt_count: u32,
    /// Most recent failure, if any
    pub last_error: Option<SlotError>,
    /// First transition into `Creating`
    pub first_attempt_at: Option<DateTime<Utc>>,
    /// Transition into an attempt-terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

impl Slot {
    /// Create a new slot in `Pending`
    #[must_use]
    pub fn new(
        job_id: JobId,
        kind: EntityKind,
        parent: Option<SlotId>,
        index: usize,
        spec: serde_json::Value,
    ) -> Self {
        Self {
            id: SlotId::new(),
            job_id,
            kind,
            parent,
            index,
            status: SlotStatus::Pending,
            external_id: None,
            spec,
            attempt_count: 0,
            last_error: None,
            first_attempt_at: None,
            finished_at: None,
        }
    }

    /// Transition to a new status, enforcing legality and bookkeeping
    ///
    /// `external_id` must accompany the move into `Created` and may never
    /// be supplied twice. Attempt counting happens on each entry into
    /// `Creating`.
    pub fn transition(
        &mut self,
        to: SlotStatus,
        external_id: Option<ExternalId>,
        error: Option<SlotError>,
    ) -> Result<(), ModelError> {
        if !self.status.can_transition_to(to) {
            return Err(ModelError::IllegalSlotTransition {
                from: self.status,
                to,
            });
        }
        if to == SlotStatus::Created && external_id.is_none() && self.external_id.is_none() {
            return Err(ModelError::MissingExternalId);
        }
        if let Some(id) = external_id {
            if self.external_id.is_some() {
                return Err(ModelError::ExternalIdAlreadySet);
            }
            self.external_id = Some(id);
        }
        if to == SlotStatus::Creating {
            self.attempt_count += 1;
            if self.first_attempt_at.is_none() {
                self.first_attempt_at = Some(Utc::now());
            }
        }
        if let Some(err) = error {
            self.last_error = Some(err);
        }
        self.status = to;
        if to.is_attempt_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn slot() -> Slot {
        Slot::new(
            JobId::new(),
            EntityKind::AdSet,
            Some(SlotId::new()),
            0,
            json!({"name": "ad set 1"}),
        )
    }

    #[test]
    fn create_success_path() {
        let mut s = slot();
        s.transition(SlotStatus::Creating, None, None).unwrap();
        assert_eq!(s.attempt_count, 1);
        assert!(s.first_attempt_at.is_some());
        s.transition(SlotStatus::Created, Some(ExternalId::new("as_1")), None)
            .unwrap();
        assert_eq!(s.external_id, Some(ExternalId::new("as_1")));
        assert!(s.finished_at.is_some());
    }

    #[test]
    fn retry_path_counts_attempts() {
        let mut s = slot();
        s.transition(SlotStatus::Creating, None, None).unwrap();
        s.transition(
            SlotStatus::FailedTransient,
            None,
            Some(SlotError::new(SlotErrorKind::RateLimited, "429")),
        )
        .unwrap();
        s.transition(SlotStatus::Creating, None, None).unwrap();
        s.transition(SlotStatus::Created, Some(ExternalId::new("as_2")), None)
            .unwrap();
        assert_eq!(s.attempt_count, 2);
        assert_eq!(s.last_error.as_ref().unwrap().kind, SlotErrorKind::RateLimited);
    }

    #[test]
    fn external_id_immutable() {
        let mut s = slot();
        s.transition(SlotStatus::Creating, None, None).unwrap();
        s.transition(SlotStatus::Created, Some(ExternalId::new("as_1")), None)
            .unwrap();
        let err = s.transition(SlotStatus::RolledBack, Some(ExternalId::new("as_other")), None);
        assert_eq!(err, Err(ModelError::ExternalIdAlreadySet));
    }

    #[test]
    fn created_only_moves_to_rolled_back() {
        let mut s = slot();
        s.transition(SlotStatus::Creating, None, None).unwrap();
        s.transition(SlotStatus::Created, Some(ExternalId::new("as_1")), None)
            .unwrap();
        assert!(s.transition(SlotStatus::Pending, None, None).is_err());
        assert!(s.transition(SlotStatus::Creating, None, None).is_err());
        assert!(s.transition(SlotStatus::RolledBack, None, None).is_ok());
    }

    #[test]
    fn created_requires_external_id() {
        let mut s = slot();
        s.transition(SlotStatus::Creating, None, None).unwrap();
        let err = s.transition(SlotStatus::Created, None, None);
        assert_eq!(err, Err(ModelError::MissingExternalId));
        // Status untouched by the rejected move.
        assert_eq!(s.status, SlotStatus::Creating);
    }

    #[test]
    fn pending_cannot_jump_to_created() {
        let mut s = slot();
        let err = s.transition(SlotStatus::Created, Some(ExternalId::new("x")), None);
        assert!(matches!(err, Err(ModelError::IllegalSlotTransition { .. })));
    }

    #[test]
    fn entity_kind_depth_ordering() {
        assert!(EntityKind::Campaign.depth() < EntityKind::AdSet.depth());
        assert!(EntityKind::AdSet.depth() < EntityKind::Ad.depth());
    }
}
