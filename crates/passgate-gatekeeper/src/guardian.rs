//! Host permission decoration
//!
//! The host owns its own permission policy (trust levels, closed topics,
//! category permissions). [`GatedGuardian`] wraps that policy so score
//! requirements are checked first and the host policy only runs for users
//! who meet them.

use crate::GatingEngine;
use passgate_domain::traits::{GatingStore, IdentityResolver, RequirementStore, ScoreCache};
use passgate_domain::{ActionKind, CategoryId, Clock, Topic, UserId};
use passgate_provider::ScoreProvider;
use std::fmt::Display;
use tracing::{error, info};

/// Permission checks for creating posts and topics
pub trait TopicGuardian {
    /// Whether `user` may reply in `topic`
    fn can_create_post_on_topic(&self, user: UserId, topic: &Topic) -> bool;

    /// Whether `user` may start a topic in `category`
    fn can_create_topic_on_category(&self, user: UserId, category: CategoryId) -> bool;
}

impl<G: TopicGuardian + ?Sized> TopicGuardian for &G {
    fn can_create_post_on_topic(&self, user: UserId, topic: &Topic) -> bool {
        (**self).can_create_post_on_topic(user, topic)
    }

    fn can_create_topic_on_category(&self, user: UserId, category: CategoryId) -> bool {
        (**self).can_create_topic_on_category(user, category)
    }
}

/// A host policy with score requirements layered on top
///
/// Score requirements can only narrow what the host policy allows. A store
/// failure while reading requirements denies the action.
pub struct GatedGuardian<'e, P, S, C, G> {
    engine: &'e GatingEngine<P, S, C>,
    base: G,
}

impl<'e, P, S, C, G> GatedGuardian<'e, P, S, C, G> {
    /// Wrap `base` with the requirements enforced by `engine`
    pub fn new(engine: &'e GatingEngine<P, S, C>, base: G) -> Self {
        Self { engine, base }
    }

    /// The wrapped host policy
    pub fn base(&self) -> &G {
        &self.base
    }
}

impl<P, S, C, G> GatedGuardian<'_, P, S, C, G>
where
    P: ScoreProvider,
    S: GatingStore,
    <S as ScoreCache>::Error: Display,
    <S as RequirementStore>::Error: Display,
    <S as IdentityResolver>::Error: Display,
    C: Clock,
{
    fn passes(&self, user: UserId, category: Option<CategoryId>, action: ActionKind) -> bool {
        match self.engine.meets_requirements(user, category, action) {
            Ok(true) => true,
            Ok(false) => {
                info!("User {} blocked from {}: score requirement not met", user, action);
                false
            }
            Err(e) => {
                error!("Requirement check for user {} failed, denying {}: {}", user, action, e);
                false
            }
        }
    }
}

impl<P, S, C, G> TopicGuardian for GatedGuardian<'_, P, S, C, G>
where
    P: ScoreProvider,
    S: GatingStore,
    <S as ScoreCache>::Error: Display,
    <S as RequirementStore>::Error: Display,
    <S as IdentityResolver>::Error: Display,
    C: Clock,
    G: TopicGuardian,
{
    fn can_create_post_on_topic(&self, user: UserId, topic: &Topic) -> bool {
        self.passes(user, topic.category_id, ActionKind::Reply)
            && self.base.can_create_post_on_topic(user, topic)
    }

    fn can_create_topic_on_category(&self, user: UserId, category: CategoryId) -> bool {
        self.passes(user, Some(category), ActionKind::NewTopic)
            && self.base.can_create_topic_on_category(user, category)
    }
}
