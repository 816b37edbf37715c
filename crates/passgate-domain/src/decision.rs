//! Gating decisions

use crate::Score;

/// Outcome of an account-creation check
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The action may proceed
    Allow,

    /// The action is refused
    Deny(DenyReason),
}

/// Why an action was refused
#[derive(Debug, Clone, PartialEq)]
pub enum DenyReason {
    /// No wallet address is associated with the principal
    WalletNotLinked,

    /// The principal's score is below the threshold
    InsufficientScore {
        /// Score used for the comparison
        score: Score,
        /// Threshold that was not met
        required: Score,
    },
}

impl Decision {
    /// Whether the decision allows the action
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Deny reason, if denied
    pub fn reason(&self) -> Option<&DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(reason),
        }
    }
}

impl DenyReason {
    /// User-facing explanation
    pub fn message(&self) -> String {
        match self {
            DenyReason::WalletNotLinked => {
                "Connect your wallet to create an account.".to_string()
            }
            DenyReason::InsufficientScore { score, required } => format!(
                "Your passport score of {} does not meet the minimum score of {} required to create an account.",
                score, required
            ),
        }
    }
}
