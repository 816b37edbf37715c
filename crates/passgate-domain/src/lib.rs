//! Passgate Domain Layer
//!
//! Core vocabulary for score-gated forum actions. Like every domain layer in
//! this workspace it has ZERO external dependencies: value objects, the
//! bypass window and the storage traits the infrastructure crates implement.
//!
//! ## Key Concepts
//!
//! - **Identity**: an external address (e.g. a wallet) linked to at most one user
//! - **Score**: a non-negative reputation value reported by a scoring provider
//! - **Requirement**: minimum score for an (scope, action) pair
//! - **Bypass window**: a grace period during which nothing is gated
//! - **Decision**: the outcome of an account-creation check
//!
//! ## Architecture
//!
//! - No external crate dependencies
//! - Time is passed in as Unix seconds (see [`Clock`]) so every rule is pure
//! - Trait definitions for every persistence interaction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod bypass;
pub mod clock;
pub mod decision;
pub mod identity;
pub mod requirement;
pub mod score;
pub mod traits;

// Re-exports for convenience
pub use action::{ActionKind, Scope};
pub use bypass::BypassWindow;
pub use clock::{Clock, FixedClock, SystemClock};
pub use decision::{Decision, DenyReason};
pub use identity::{CategoryId, Identity, Topic, TopicId, UserId};
pub use requirement::Requirement;
pub use score::{Score, ScoreRecord};
