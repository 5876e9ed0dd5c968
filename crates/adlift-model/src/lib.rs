//! Data model for the adlift creation-orchestration core
//!
//! Defines the durable records the rest of the system coordinates on:
//! - Identifiers (jobs, slots, external entities, accounts)
//! - Job: one bulk-creation request and its status state machine
//! - Slot: one remote entity a job must bring into existence
//! - Creation requests and their validation
//! - Verification snapshots

pub mod error;
pub mod ids;
pub mod job;
pub mod request;
pub mod slot;
pub mod verification;

pub use error::ModelError;
pub use ids::{AccountRef, ExternalId, IdempotencyKey, JobId, SlotId};
pub use job::{Job, JobStatus, RequestedCounts};
pub use request::{AdSetRequest, CreationRequest};
pub use slot::{EntityKind, Slot, SlotError, SlotErrorKind, SlotStatus};
pub use verification::VerificationResult;
