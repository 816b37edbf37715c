//! Gated actions and the scopes requirements apply to

use crate::CategoryId;
use std::fmt;

/// An action that can be gated behind a minimum score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Signing up for a new account
    CreateAccount,

    /// Posting a reply on an existing topic
    Reply,

    /// Starting a new topic
    NewTopic,
}

impl ActionKind {
    /// Get the action name as used on the wire and in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateAccount => "create_account",
            ActionKind::Reply => "reply",
            ActionKind::NewTopic => "new_topic",
        }
    }

    /// Parse an action from its wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create_account" => Some(ActionKind::CreateAccount),
            "reply" => Some(ActionKind::Reply),
            "new_topic" => Some(ActionKind::NewTopic),
            _ => None,
        }
    }

    /// Whether admins may configure a per-scope requirement for this action
    ///
    /// Account creation uses a single forum-wide threshold from configuration.
    pub fn is_scoped(&self) -> bool {
        !matches!(self, ActionKind::CreateAccount)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid action: {}", s))
    }
}

/// Boundary a requirement applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Forum-wide
    UserLevel,

    /// A single category
    Category(CategoryId),
}

impl Scope {
    /// Category this scope is bound to, if any
    pub fn category(&self) -> Option<CategoryId> {
        match self {
            Scope::UserLevel => None,
            Scope::Category(id) => Some(*id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::UserLevel => f.write_str("user-level"),
            Scope::Category(id) => write!(f, "category {}", id),
        }
    }
}
