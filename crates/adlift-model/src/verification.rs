//! Post-creation verification snapshot

use crate::ids::{JobId, SlotId};
use serde::{Deserialize, Serialize};

/// Result of re-checking every claimed-created entity against the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Job this snapshot belongs to
    pub job_id: JobId,
    /// Slots the job was asked to create
    pub expected_count: usize,
    /// Slots confirmed to exist remotely with the right parent linkage
    pub confirmed_count: usize,
    /// Slots whose claimed existence could not be confirmed
    pub discrepancies: Vec<SlotId>,
}

impl VerificationResult {
    /// True when every claimed-created slot was confirmed
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}
