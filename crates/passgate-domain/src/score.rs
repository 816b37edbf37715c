//! Scores and cached score records

use crate::Identity;
use std::fmt;

/// Reputation score reported by the scoring provider
///
/// Always finite and non-negative. There is no upper cap.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Score(f64);

impl Score {
    /// The zero score (also the effective score when nothing is cached)
    pub const ZERO: Score = Score(0.0);

    /// Create a score
    ///
    /// # Errors
    /// Returns error if the value is negative, NaN or infinite
    ///
    /// # Examples
    ///
    /// ```
    /// use passgate_domain::Score;
    ///
    /// assert_eq!(Score::new(12.5).unwrap().value(), 12.5);
    /// assert!(Score::new(-1.0).is_err());
    /// ```
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err(format!("Score must be finite, got {}", value));
        }
        if value < 0.0 {
            return Err(format!("Score must be non-negative, got {}", value));
        }
        Ok(Self(value))
    }

    /// Get the raw value
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Score with its fractional part dropped
    pub fn truncated(&self) -> Score {
        Score(self.0.trunc())
    }

    /// Whether this score is strictly positive (i.e. gates something when used as a threshold)
    pub fn is_positive(&self) -> bool {
        self.0 > 0.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last known score for an identity
///
/// One record exists per identity; a refresh replaces the whole record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    /// Identity the score belongs to
    pub identity: Identity,

    /// Score returned by the provider
    pub score: Score,

    /// When the score was fetched (Unix seconds)
    pub fetched_at: u64,
}

impl ScoreRecord {
    /// Create a new record
    pub fn new(identity: Identity, score: Score, fetched_at: u64) -> Self {
        Self {
            identity,
            score,
            fetched_at,
        }
    }

    /// Whether the record is older than `max_age_secs` at time `now`
    ///
    /// A record fetched "in the future" (clock skew) is never stale.
    pub fn is_stale(&self, max_age_secs: u64, now: u64) -> bool {
        now.saturating_sub(self.fetched_at) > max_age_secs
    }
}
