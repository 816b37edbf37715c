//! Gatekeeper error types

use passgate_domain::UserId;
use passgate_provider::ProviderError;
use thiserror::Error;

/// Message shown to users when a score could not be obtained
pub const GENERIC_FAILURE_MESSAGE: &str =
    "We could not verify your passport score right now. Please try again later.";

/// Errors that can occur during gating operations
#[derive(Error, Debug)]
pub enum GatingError {
    /// Scoring provider unreachable, timed out or temporarily failing
    #[error("Scoring provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Scoring provider answered with an unusable payload
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The user has no external identity linked
    #[error("No identity linked for user {0}")]
    IdentityNotLinked(UserId),

    /// Store error while reading or writing gating state
    #[error("Store error: {0}")]
    Store(String),
}

impl GatingError {
    /// Text safe to show to the end user
    pub fn user_message(&self) -> &'static str {
        GENERIC_FAILURE_MESSAGE
    }

    /// Whether the failure came from the scoring provider
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            GatingError::ProviderUnavailable(_) | GatingError::InvalidResponse(_)
        )
    }
}

impl From<ProviderError> for GatingError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unavailable(msg) => GatingError::ProviderUnavailable(msg),
            ProviderError::InvalidResponse(msg) => GatingError::InvalidResponse(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_mapping() {
        let e: GatingError = ProviderError::Unavailable("timeout".to_string()).into();
        assert!(matches!(e, GatingError::ProviderUnavailable(_)));
        assert!(e.is_provider_failure());

        let e: GatingError = ProviderError::InvalidResponse("bad".to_string()).into();
        assert!(matches!(e, GatingError::InvalidResponse(_)));
    }

    #[test]
    fn test_store_error_is_not_provider_failure() {
        assert!(!GatingError::Store("locked".to_string()).is_provider_failure());
        assert!(!GatingError::IdentityNotLinked(UserId(3)).is_provider_failure());
    }

    #[test]
    fn test_user_message_hides_details() {
        let e = GatingError::ProviderUnavailable("10.0.0.7 refused".to_string());
        assert!(!e.user_message().contains("10.0.0.7"));
        assert_eq!(
            GatingError::IdentityNotLinked(UserId(3)).to_string(),
            "No identity linked for user 3"
        );
    }
}
