//! Passgate Score Provider Layer
//!
//! Clients for the external identity-scoring service.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `PassportClient`: HTTP client for a Gitcoin Passport style scorer API
//!
//! Providers never retry and never cache. Retry policy belongs to the caller
//! and caching belongs to the score cache.
//!
//! # Examples
//!
//! ```
//! use passgate_provider::{MockProvider, ScoreProvider};
//! use passgate_domain::{Identity, Score};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let provider = MockProvider::new(Score::new(21.5).unwrap());
//! let identity = Identity::new("0xabc").unwrap();
//! let score = provider.fetch_score(&identity, "335").await.unwrap();
//! assert_eq!(score.value(), 21.5);
//! # }
//! ```

#![warn(missing_docs)]

pub mod passport;

use passgate_domain::{Identity, Score};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

pub use passport::PassportClient;

/// Errors that can occur while fetching a score
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network failure, timeout or a transient provider-side error
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with something that is not a usable score
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Source of identity scores
///
/// Implementations perform at most one remote call per invocation and must
/// bound it with a timeout.
pub trait ScoreProvider: Send + Sync {
    /// Fetch the current score of `identity` using the scorer `scorer_id`
    fn fetch_score(
        &self,
        identity: &Identity,
        scorer_id: &str,
    ) -> impl Future<Output = Result<Score, ProviderError>> + Send;
}

#[derive(Debug, Clone)]
enum MockResponse {
    Score(Score),
    Error(ProviderError),
}

/// Mock score provider for deterministic testing
///
/// Returns pre-configured scores without making any network calls. Clones
/// share configuration and call counts.
///
/// # Examples
///
/// ```
/// use passgate_provider::{MockProvider, ProviderError};
/// use passgate_domain::{Identity, Score};
///
/// let provider = MockProvider::new(Score::ZERO);
/// provider.set_score(&Identity::new("0xaaa").unwrap(), Score::new(30.0).unwrap());
/// provider.set_error(
///     &Identity::new("0xbbb").unwrap(),
///     ProviderError::Unavailable("down".to_string()),
/// );
/// assert_eq!(provider.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: Arc<Mutex<MockResponse>>,
    responses: Arc<Mutex<HashMap<Identity, MockResponse>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    call_count: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// Create a MockProvider returning `score` for every identity
    pub fn new(score: Score) -> Self {
        Self {
            default_response: Arc::new(Mutex::new(MockResponse::Score(score))),
            responses: Arc::new(Mutex::new(HashMap::new())),
            delay: Arc::new(Mutex::new(None)),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return `score` for a specific identity
    pub fn set_score(&self, identity: &Identity, score: Score) {
        lock(&self.responses).insert(identity.clone(), MockResponse::Score(score));
    }

    /// Fail calls for a specific identity with `error`
    pub fn set_error(&self, identity: &Identity, error: ProviderError) {
        lock(&self.responses).insert(identity.clone(), MockResponse::Error(error));
    }

    /// Fail calls for every identity without a specific response
    pub fn fail_by_default(&self, error: ProviderError) {
        *lock(&self.default_response) = MockResponse::Error(error);
    }

    /// Sleep for `delay` before answering (simulates a slow provider)
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Get the number of times fetch_score was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }

    fn response_for(&self, identity: &Identity) -> MockResponse {
        lock(&self.responses)
            .get(identity)
            .cloned()
            .unwrap_or_else(|| lock(&self.default_response).clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Score::ZERO)
    }
}

impl ScoreProvider for MockProvider {
    async fn fetch_score(&self, identity: &Identity, _scorer_id: &str) -> Result<Score, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.response_for(identity) {
            MockResponse::Score(score) => Ok(score),
            MockResponse::Error(error) => Err(error),
        }
    }
}
