//! Pre-flight eligibility gate
//!
//! Read-only account checks run exactly once per job, before any slot
//! moves to `creating`. A refusal aborts the job with zero creation
//! calls made, which is the primary cost-avoidance guarantee.

use crate::config::EngineConfig;
use crate::remote::AccountStatusApi;
use adlift_model::AccountRef;
use std::sync::Arc;

/// Outcome of the eligibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityReport {
    /// All criteria passed
    pub pass: bool,
    /// Human-readable refusal reasons; empty on pass
    pub reasons: Vec<String>,
}

/// Pre-flight account gate
pub struct EligibilityGate {
    api: Arc<dyn AccountStatusApi>,
    min_age_days: u32,
}

impl EligibilityGate {
    /// Create a gate over the account-status collaborator
    #[must_use]
    pub fn new(api: Arc<dyn AccountStatusApi>, config: &EngineConfig) -> Self {
        Self {
            api,
            min_age_days: config.min_account_age_days,
        }
    }

    /// Run all criteria, collecting every failing reason
    ///
    /// `required_quota` is the total number of entities the job would
    /// create. An unreadable account status is a refusal, not an error:
    /// nothing may be created against an account we cannot vouch for.
    pub async fn check(&self, account: &AccountRef, required_quota: usize) -> EligibilityReport {
        let status = match self.api.status(account).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(account = %account, error = %err, "account status unavailable");
                return EligibilityReport {
                    pass: false,
                    reasons: vec![format!("account status unavailable: {err}")],
                };
            }
        };

        let mut reasons = Vec::new();
        if !status.active {
            reasons.push("account is not active".to_string());
        }
        if !status.has_payment_method {
            reasons.push("no payment method on file".to_string());
        }
        if status.age_days < self.min_age_days {
            reasons.push(format!(
                "account is {} days old, minimum is {}",
                status.age_days, self.min_age_days
            ));
        }
        if (status.quota_remaining as usize) < required_quota {
            reasons.push(format!(
                "quota headroom insufficient: need {required_quota}, have {}",
                status.quota_remaining
            ));
        }

        let pass = reasons.is_empty();
        if pass {
            tracing::debug!(account = %account, "eligibility check passed");
        } else {
            tracing::info!(account = %account, ?reasons, "eligibility check refused");
        }
        EligibilityReport { pass, reasons }
    }
}
