//! Gatekeeper configuration

use passgate_domain::Score;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on a single scoring call (seconds)
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Configuration for score gating
///
/// Owned by the host and read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatingConfig {
    /// Master switch; nothing is gated while false
    #[serde(default)]
    pub enabled: bool,

    /// Scorer identifier passed to the scoring provider
    #[serde(default)]
    pub scorer_id: String,

    /// Minimum score to create an account (0 disables account gating)
    #[serde(default)]
    pub min_score_to_create_account: f64,

    /// Upper bound on a single scoring call, in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

impl Default for GatingConfig {
    /// Gating switched off
    fn default() -> Self {
        Self {
            enabled: false,
            scorer_id: String::new(),
            min_score_to_create_account: 0.0,
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl GatingConfig {
    /// Gating switched on for `scorer_id` with an account-creation threshold
    pub fn enabled(scorer_id: impl Into<String>, min_score_to_create_account: f64) -> Self {
        Self {
            enabled: true,
            scorer_id: scorer_id.into(),
            min_score_to_create_account,
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }

    /// Get the provider timeout as a Duration
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Account-creation threshold, if account creation is gated at all
    ///
    /// Gated only when the feature is on, a scorer is configured and the
    /// threshold is positive.
    pub fn account_threshold(&self) -> Option<Score> {
        if !self.enabled || self.scorer_id.trim().is_empty() {
            return None;
        }
        Score::new(self.min_score_to_create_account)
            .ok()
            .filter(Score::is_positive)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.scorer_id.trim().is_empty() {
            return Err("scorer_id must be set when gating is enabled".to_string());
        }
        if let Err(e) = Score::new(self.min_score_to_create_account) {
            return Err(format!("min_score_to_create_account is invalid: {}", e));
        }
        if self.provider_timeout_secs == 0 {
            return Err("provider_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}
