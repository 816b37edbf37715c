//! Bypass window - a grace period during which gating is not enforced

use std::time::Duration;

/// Time-bounded grace period computed once at startup
///
/// A window that was never configured is treated as already expired, so
/// gating is enforced unless an operator explicitly opts into a grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BypassWindow {
    /// Unix second at which the window ends, if one was configured
    ends_at: Option<u64>,
}

impl BypassWindow {
    /// No grace period: gating is always enforced
    pub fn disabled() -> Self {
        Self { ends_at: None }
    }

    /// Grace period of `duration` beginning at `starts_at` (Unix seconds)
    ///
    /// # Examples
    ///
    /// ```
    /// use passgate_domain::BypassWindow;
    /// use std::time::Duration;
    ///
    /// let window = BypassWindow::starting_at(1_000, Duration::from_secs(60));
    /// assert!(!window.is_expired(1_059));
    /// assert!(window.is_expired(1_060));
    /// ```
    pub fn starting_at(starts_at: u64, duration: Duration) -> Self {
        Self {
            ends_at: Some(starts_at.saturating_add(duration.as_secs())),
        }
    }

    /// When the window ends, if one was configured
    pub fn ends_at(&self) -> Option<u64> {
        self.ends_at
    }

    /// Whether the grace period is over at `now` and gating must be enforced
    pub fn is_expired(&self, now: u64) -> bool {
        match self.ends_at {
            Some(ends_at) => now >= ends_at,
            None => true,
        }
    }
}

impl Default for BypassWindow {
    fn default() -> Self {
        Self::disabled()
    }
}
