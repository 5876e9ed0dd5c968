//! Creation request types
//!
//! The surrounding application hands the core one of these per user
//! action. Entity field values are opaque JSON payloads; the core never
//! interprets them beyond passing them to the remote API.

use crate::error::ModelError;
use crate::ids::AccountRef;
use crate::job::RequestedCounts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of ad set duplicates per request
pub const MAX_AD_SETS: usize = 49;

/// One requested ad set and the ads it should contain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSetRequest {
    /// Opaque ad set creation payload
    pub spec: serde_json::Value,
    /// Opaque ad creation payloads, one per requested ad
    pub ads: Vec<serde_json::Value>,
}

impl AdSetRequest {
    /// Create an ad set request
    #[inline]
    #[must_use]
    pub fn new(spec: serde_json::Value, ads: Vec<serde_json::Value>) -> Self {
        Self { spec, ads }
    }
}

/// One bulk-creation request: one campaign, N ad sets, ads per ad set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationRequest {
    /// Target ad account
    pub account: AccountRef,
    /// Opaque campaign creation payload
    pub campaign_spec: serde_json::Value,
    /// Requested ad sets, in index order
    pub ad_sets: Vec<AdSetRequest>,
    /// Refuse partial results and compensate instead
    pub all_or_nothing: bool,
    /// Override the engine's default job-wide retry budget
    pub retry_budget: Option<u32>,
}

impl CreationRequest {
    /// Create a request with no ad sets
    #[must_use]
    pub fn new(account: AccountRef, campaign_spec: serde_json::Value) -> Self {
        Self {
            account,
            campaign_spec,
            ad_sets: Vec::new(),
            all_or_nothing: false,
            retry_budget: None,
        }
    }

    /// Append an ad set
    #[inline]
    #[must_use]
    pub fn with_ad_set(mut self, ad_set: AdSetRequest) -> Self {
        self.ad_sets.push(ad_set);
        self
    }

    /// Mark the request all-or-nothing
    #[inline]
    #[must_use]
    pub fn all_or_nothing(mut self) -> Self {
        self.all_or_nothing = true;
        self
    }

    /// Override the retry budget
    #[inline]
    #[must_use]
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = Some(budget);
        self
    }

    /// Validate the request before any job row exists
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.account.as_str().is_empty() {
            return Err(ModelError::InvalidRequest("account ref is empty".into()));
        }
        if self.ad_sets.len() > MAX_AD_SETS {
            return Err(ModelError::InvalidRequest(format!(
                "requested {} ad sets, maximum is {MAX_AD_SETS}",
                self.ad_sets.len()
            )));
        }
        Ok(())
    }

    /// Entity counts this request expands to
    #[must_use]
    pub fn requested_counts(&self) -> RequestedCounts {
        let ads_per_ad_set: BTreeMap<usize, usize> = self
            .ad_sets
            .iter()
            .enumerate()
            .map(|(i, a)| (i, a.ads.len()))
            .collect();
        RequestedCounts {
            campaigns: 1,
            ad_sets: self.ad_sets.len(),
            ads_per_ad_set,
        }
    }
}
