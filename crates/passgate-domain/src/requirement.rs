//! Minimum-score requirements

use crate::{ActionKind, Score, Scope};

/// Minimum score required to perform `action` within `scope`
///
/// At most one requirement exists per (scope, action). A required score of
/// zero means the pair is not gated.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    /// Where the requirement applies
    pub scope: Scope,

    /// Which action it gates
    pub action: ActionKind,

    /// Minimum score (inclusive)
    pub required_score: Score,
}

impl Requirement {
    /// Create a requirement
    pub fn new(scope: Scope, action: ActionKind, required_score: Score) -> Self {
        Self {
            scope,
            action,
            required_score,
        }
    }

    /// Whether `score` satisfies this requirement (boundary inclusive)
    pub fn is_met_by(&self, score: Score) -> bool {
        score >= self.required_score
    }
}
