//! Trait definitions for external interactions
//!
//! These traits define the boundaries between gating logic and infrastructure.
//! Implementations live in other crates (`passgate-store` for SQLite).
//!
//! All methods take `&self`: implementations are shared across request
//! handlers and provide their own synchronization. Each write must be atomic
//! per key so concurrent readers never observe a partial record.

use crate::{ActionKind, Identity, Requirement, ScoreRecord, Scope, UserId};

/// Last-known score per identity
///
/// Implemented by the infrastructure layer (passgate-store)
pub trait ScoreCache {
    /// Error type for cache operations
    type Error;

    /// Get the cached record for an identity
    fn get_score(&self, identity: &Identity) -> Result<Option<ScoreRecord>, Self::Error>;

    /// Insert or replace the record for `record.identity`
    ///
    /// A record older than the stored one (by `fetched_at`) is ignored, so
    /// `fetched_at` never moves backwards.
    fn put_score(&self, record: &ScoreRecord) -> Result<(), Self::Error>;
}

/// Configured minimum-score requirements
///
/// Implemented by the infrastructure layer (passgate-store)
pub trait RequirementStore {
    /// Error type for requirement operations
    type Error;

    /// Insert or replace the requirement for `(requirement.scope, requirement.action)`
    fn set_requirement(&self, requirement: &Requirement) -> Result<(), Self::Error>;

    /// Get the requirement for a (scope, action) pair
    fn get_requirement(
        &self,
        scope: Scope,
        action: ActionKind,
    ) -> Result<Option<Requirement>, Self::Error>;

    /// All requirements configured for a scope
    fn requirements_for_scope(&self, scope: Scope) -> Result<Vec<Requirement>, Self::Error>;
}

/// Maps host users to their external identity
///
/// Supplied by the host's authentication subsystem; the SQLite store keeps a
/// link table the host writes into.
pub trait IdentityResolver {
    /// Error type for resolution
    type Error;

    /// Identity associated with the user, if any
    fn identity_for_user(&self, user: UserId) -> Result<Option<Identity>, Self::Error>;
}

/// Everything the gating engine needs from persistence
pub trait GatingStore: ScoreCache + RequirementStore + IdentityResolver {}

impl<T> GatingStore for T where T: ScoreCache + RequirementStore + IdentityResolver {}
