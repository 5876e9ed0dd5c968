//! Creation orchestration engine
//!
//! Drives one bulk-creation job from submission to a terminal state:
//! - EligibilityGate: pre-flight account checks, zero side effects
//! - Creator: bounded-concurrency worker pool with retry and backoff
//! - Verifier: post-creation remote existence re-check
//! - RollbackCoordinator: accept / accept-partial / compensate decision
//! - Orchestrator: the job state machine tying the phases together

pub mod config;
pub mod creator;
pub mod eligibility;
pub mod error;
pub mod orchestrator;
pub mod remote;
pub mod report;
pub mod retry;
pub mod rollback;
pub mod telemetry;
pub mod verifier;

pub use config::EngineConfig;
pub use creator::Creator;
pub use eligibility::{EligibilityGate, EligibilityReport};
pub use error::EngineError;
pub use orchestrator::Orchestrator;
pub use remote::{AccountStatus, AccountStatusApi, EntityCreationApi, RemoteError, RemoteErrorKind};
pub use report::{JobStatusReport, KindCounts, MissingEntity, ResidualEntity};
pub use retry::{FailureClass, RetryPolicy};
pub use rollback::{Decision, RollbackCoordinator, RollbackReport};
pub use verifier::Verifier;
