//! Passport Scorer Client
//!
//! Talks to a Gitcoin Passport style scorer API: the address is submitted to
//! a scorer and the response carries the computed score.
//!
//! # Features
//!
//! - Async HTTP communication with a bounded per-request timeout
//! - API key authentication via the `X-API-KEY` header
//! - Scores accepted as JSON numbers or decimal strings
//! - No retries: a failed call is reported to the caller immediately
//!
//! # Examples
//!
//! ```no_run
//! use passgate_provider::PassportClient;
//!
//! let client = PassportClient::new("https://api.scorer.gitcoin.co", "my-api-key").unwrap();
//! ```

use crate::{ProviderError, ScoreProvider};
use passgate_domain::{Identity, Score};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default scorer API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.scorer.gitcoin.co";

/// Default timeout for scoring requests (10 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Path of the submit endpoint, relative to the API root
const SUBMIT_PATH: &str = "/registry/submit-passport";

/// Header carrying the API key
const API_KEY_HEADER: &str = "X-API-KEY";

/// HTTP client for the passport scorer API
pub struct PassportClient {
    endpoint: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

/// Request body for the submit endpoint
#[derive(Serialize)]
struct SubmitPassportRequest<'a> {
    address: &'a str,
    scorer_id: &'a str,
}

/// Response from the submit endpoint
#[derive(Deserialize)]
struct SubmitPassportResponse {
    #[serde(default)]
    score: Option<RawScore>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// The API has returned scores both as strings and as numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

impl RawScore {
    fn into_score(self) -> Result<Score, ProviderError> {
        let value = match self {
            RawScore::Number(n) => n,
            RawScore::Text(s) => s.trim().parse::<f64>().map_err(|e| {
                ProviderError::InvalidResponse(format!("Unparseable score '{}': {}", s, e))
            })?,
        };
        Score::new(value).map_err(ProviderError::InvalidResponse)
    }
}

impl SubmitPassportResponse {
    fn into_score(self) -> Result<Score, ProviderError> {
        match self.status.as_deref().map(str::to_ascii_uppercase).as_deref() {
            Some("ERROR") => {
                return Err(ProviderError::InvalidResponse(format!(
                    "Scorer reported an error: {}",
                    self.error.unwrap_or_else(|| "unknown error".to_string())
                )));
            }
            Some("PROCESSING") => {
                return Err(ProviderError::Unavailable(
                    "Score is still being computed".to_string(),
                ));
            }
            _ => {}
        }

        self.score
            .ok_or_else(|| ProviderError::InvalidResponse("Response has no score".to_string()))?
            .into_score()
    }
}

impl PassportClient {
    /// Create a new client with the default timeout
    ///
    /// # Parameters
    ///
    /// - `endpoint`: API root (e.g., "https://api.scorer.gitcoin.co")
    /// - `api_key`: scorer API key
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_timeout(endpoint, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new client with an explicit request timeout
    pub fn with_timeout(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
            client,
        })
    }

    /// Configured request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the score of `identity` from scorer `scorer_id`
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if:
    /// - the scorer cannot be reached or the request times out
    /// - the scorer answers 5xx or 429
    /// - the score is still being computed
    ///
    /// Returns [`ProviderError::InvalidResponse`] if:
    /// - the scorer answers any other non-success status
    /// - the body is not the expected JSON or carries no usable score
    pub async fn submit_passport(&self, identity: &Identity, scorer_id: &str) -> Result<Score, ProviderError> {
        let url = format!("{}{}", self.endpoint, SUBMIT_PATH);

        let request_body = SubmitPassportRequest {
            address: identity.as_str(),
            scorer_id,
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Unavailable(format!("Request timed out after {:?}", self.timeout))
                } else {
                    ProviderError::Unavailable(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(
                if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    ProviderError::Unavailable(format!("HTTP {}: {}", status, error_text))
                } else {
                    ProviderError::InvalidResponse(format!("HTTP {}: {}", status, error_text))
                },
            );
        }

        let body: SubmitPassportResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let score = body.into_score()?;
        debug!("Scorer {} returned {} for {}", scorer_id, score, identity);
        Ok(score)
    }
}

impl ScoreProvider for PassportClient {
    async fn fetch_score(&self, identity: &Identity, scorer_id: &str) -> Result<Score, ProviderError> {
        self.submit_passport(identity, scorer_id).await
    }
}
