//! Passgate Gatekeeper
//!
//! Decides whether principals may perform gated actions based on an identity
//! score.
//!
//! The Gatekeeper provides:
//! - Account-creation checks against a fresh provider score
//! - Cached-score checks for replying and creating topics, site-wide and per category
//! - Score refresh on sign-in and account creation
//! - A decorator that layers requirements over the host's own permission policy
//!
//! # Examples
//!
//! ```
//! use passgate_gatekeeper::{GatingConfig, GatingEngine};
//! use passgate_domain::{BypassWindow, Decision, Score};
//! use passgate_provider::MockProvider;
//! use passgate_store::SqliteStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = GatingEngine::new(
//!     GatingConfig::enabled("335", 20.0),
//!     BypassWindow::disabled(),
//!     MockProvider::new(Score::new(25.0).unwrap()),
//!     SqliteStore::new(":memory:").unwrap(),
//! );
//!
//! let decision = engine.can_create_account(None).await.unwrap();
//! assert!(!decision.is_allowed());
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod guardian;

pub use config::{GatingConfig, DEFAULT_PROVIDER_TIMEOUT_SECS};
pub use engine::GatingEngine;
pub use error::{GatingError, GENERIC_FAILURE_MESSAGE};
pub use guardian::{GatedGuardian, TopicGuardian};
