//! Score gating logic

use crate::{GatedGuardian, GatingConfig, GatingError, TopicGuardian};
use passgate_domain::traits::{GatingStore, IdentityResolver, RequirementStore, ScoreCache};
use passgate_domain::{
    ActionKind, BypassWindow, CategoryId, Clock, Decision, DenyReason, Identity, Requirement,
    Score, ScoreRecord, Scope, SystemClock, UserId,
};
use passgate_provider::ScoreProvider;
use std::fmt::Display;
use tracing::{debug, error, info, warn};

fn store_error(e: impl Display) -> GatingError {
    GatingError::Store(e.to_string())
}

/// The gating engine decides whether principals may create accounts, topics
/// and posts based on their identity score
///
/// Account-creation checks always consult the provider. Topic and post checks
/// only read the score cache and never block on the network.
pub struct GatingEngine<P, S, C = SystemClock> {
    config: GatingConfig,
    bypass: BypassWindow,
    provider: P,
    store: S,
    clock: C,
}

impl<P, S> GatingEngine<P, S, SystemClock> {
    /// Create a new engine reading the system clock
    pub fn new(config: GatingConfig, bypass: BypassWindow, provider: P, store: S) -> Self {
        Self::with_clock(config, bypass, provider, store, SystemClock)
    }
}

impl<P, S, C> GatingEngine<P, S, C> {
    /// Create a new engine with an explicit clock
    pub fn with_clock(
        config: GatingConfig,
        bypass: BypassWindow,
        provider: P,
        store: S,
        clock: C,
    ) -> Self {
        Self {
            config,
            bypass,
            provider,
            store,
            clock,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &GatingConfig {
        &self.config
    }

    /// Bypass window computed at startup
    pub fn bypass(&self) -> BypassWindow {
        self.bypass
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Underlying provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Wrap a host permission policy so it also enforces score requirements
    pub fn guard<G: TopicGuardian>(&self, base: G) -> GatedGuardian<'_, P, S, C, G> {
        GatedGuardian::new(self, base)
    }
}

impl<P, S, C> GatingEngine<P, S, C>
where
    P: ScoreProvider,
    S: GatingStore,
    <S as ScoreCache>::Error: Display,
    <S as RequirementStore>::Error: Display,
    <S as IdentityResolver>::Error: Display,
    C: Clock,
{
    /// Decide whether a prospective account may be created
    ///
    /// `identity` is the wallet the prospective user authenticated with, if
    /// any. A fresh score is always fetched; the cache is not consulted.
    ///
    /// # Errors
    ///
    /// Returns a provider error if the score could not be fetched. The caller
    /// must treat it as a denial and show [`GatingError::user_message`].
    pub async fn can_create_account(
        &self,
        identity: Option<&Identity>,
    ) -> Result<Decision, GatingError> {
        // 1. Feature and threshold
        let Some(required) = self.config.account_threshold() else {
            debug!("Account gating inactive, allowing");
            return Ok(Decision::Allow);
        };

        // 2. Wallet
        let Some(identity) = identity else {
            info!("Account creation denied: no wallet linked");
            return Ok(Decision::Deny(DenyReason::WalletNotLinked));
        };

        // 3. Fresh score
        let score = self.fetch_score(identity).await.inspect_err(|e| {
            warn!("Account check for {} failed: {}", identity, e);
        })?;

        // Fractional scores are truncated before comparing
        if score.truncated() < required {
            info!(
                "Account creation denied for {}: score {} below {}",
                identity, score, required
            );
            return Ok(Decision::Deny(DenyReason::InsufficientScore { score, required }));
        }

        debug!("Account creation allowed for {} with score {}", identity, score);
        Ok(Decision::Allow)
    }

    /// Fetch a fresh score for `user` and store it in the cache
    ///
    /// Returns zero without calling the provider when no identity is linked.
    /// The cache is left untouched when the provider fails.
    pub async fn refresh_score(&self, user: UserId) -> Result<Score, GatingError> {
        let Some(identity) = self.store.identity_for_user(user).map_err(store_error)? else {
            debug!("User {} has no linked identity, score is 0", user);
            return Ok(Score::ZERO);
        };

        let score = self.fetch_score(&identity).await?;
        let record = ScoreRecord::new(identity, score, self.clock.now());
        self.store.put_score(&record).map_err(store_error)?;

        info!("Refreshed score for user {} ({}): {}", user, record.identity, score);
        Ok(score)
    }

    /// Whether `user` satisfies the requirement for `(scope, action)`
    ///
    /// Reads cached state only. A user with no cached score is treated as
    /// scoring zero.
    pub fn has_minimum_required_score(
        &self,
        user: UserId,
        scope: Scope,
        action: ActionKind,
    ) -> Result<bool, GatingError> {
        // 1. Feature switch and grace period
        if !self.is_enforcing() {
            return Ok(true);
        }

        // 2. Requirement
        let requirement = Requirement::new(scope, action, self.required_score(scope, action)?);
        if !requirement.required_score.is_positive() {
            return Ok(true);
        }

        // 3. Cached score
        let score = self
            .cached_score(user)?
            .map(|record| record.score)
            .unwrap_or(Score::ZERO);

        let allowed = requirement.is_met_by(score);
        if !allowed {
            debug!(
                "User {} below {} requirement on {}: {} < {}",
                user, action, scope, score, requirement.required_score
            );
        }
        Ok(allowed)
    }

    /// Whether `user` meets every requirement that applies to `action` in
    /// `category`
    ///
    /// The site-wide requirement always applies; the category requirement
    /// applies when the target has a category.
    pub fn meets_requirements(
        &self,
        user: UserId,
        category: Option<CategoryId>,
        action: ActionKind,
    ) -> Result<bool, GatingError> {
        let scopes = std::iter::once(Scope::UserLevel).chain(category.map(Scope::Category));
        for scope in scopes {
            if !self.has_minimum_required_score(user, scope, action)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether gating is currently enforced
    pub fn is_enforcing(&self) -> bool {
        self.config.enabled && self.bypass.is_expired(self.clock.now())
    }

    /// Required score for `(scope, action)`; zero when none is configured
    pub fn required_score(&self, scope: Scope, action: ActionKind) -> Result<Score, GatingError> {
        Ok(self
            .store
            .get_requirement(scope, action)
            .map_err(store_error)?
            .map(|requirement| requirement.required_score)
            .unwrap_or(Score::ZERO))
    }

    /// Set the requirement for `(scope, action)`
    pub fn set_requirement(
        &self,
        scope: Scope,
        action: ActionKind,
        required_score: Score,
    ) -> Result<(), GatingError> {
        let requirement = Requirement::new(scope, action, required_score);
        self.store.set_requirement(&requirement).map_err(store_error)?;
        info!("Requirement for {} on {} set to {}", action, scope, required_score);
        Ok(())
    }

    /// All requirements configured for `scope`
    pub fn requirements(&self, scope: Scope) -> Result<Vec<Requirement>, GatingError> {
        self.store.requirements_for_scope(scope).map_err(store_error)
    }

    /// Cached score record for `user`, if any
    pub fn cached_score(&self, user: UserId) -> Result<Option<ScoreRecord>, GatingError> {
        match self.store.identity_for_user(user).map_err(store_error)? {
            Some(identity) => self.store.get_score(&identity).map_err(store_error),
            None => Ok(None),
        }
    }

    /// Identity linked to `user`
    ///
    /// # Errors
    ///
    /// Returns [`GatingError::IdentityNotLinked`] when the user has none.
    pub fn linked_identity(&self, user: UserId) -> Result<Identity, GatingError> {
        self.store
            .identity_for_user(user)
            .map_err(store_error)?
            .ok_or(GatingError::IdentityNotLinked(user))
    }

    /// Current time according to the engine clock
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Hook for a successful sign-in
    ///
    /// Refreshes the cached score. Failures are logged and swallowed so they
    /// never block the sign-in.
    pub async fn on_authenticated(&self, user: UserId) -> Option<Score> {
        match self.refresh_score(user).await {
            Ok(score) => Some(score),
            Err(e) => {
                warn!("Score refresh after sign-in failed for user {}: {}", user, e);
                None
            }
        }
    }

    /// Hook for a newly created account
    ///
    /// Seeds the cache when gating is enabled. Failures are logged and
    /// swallowed.
    pub async fn on_account_created(&self, user: UserId) -> Option<Score> {
        if !self.config.enabled {
            return None;
        }
        match self.refresh_score(user).await {
            Ok(score) => Some(score),
            Err(e) => {
                warn!("Initial score fetch failed for user {}: {}", user, e);
                None
            }
        }
    }

    /// Fetch a score, bounded by the configured provider timeout
    async fn fetch_score(&self, identity: &Identity) -> Result<Score, GatingError> {
        let timeout = self.config.provider_timeout();
        match tokio::time::timeout(
            timeout,
            self.provider.fetch_score(identity, &self.config.scorer_id),
        )
        .await
        {
            Ok(result) => result.map_err(GatingError::from),
            Err(_) => {
                error!("Scoring provider did not answer for {} within {:?}", identity, timeout);
                Err(GatingError::ProviderUnavailable(format!(
                    "No answer within {:?}",
                    timeout
                )))
            }
        }
    }
}
