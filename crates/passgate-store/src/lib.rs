//! Passgate Storage Layer
//!
//! Implements the score cache, requirement store and identity links on SQLite.
//!
//! # Architecture
//!
//! - One SQLite connection guarded by a mutex, shared by every request handler
//! - Every trait operation is a single statement, so readers never see a
//!   half-written record
//! - Score upserts refuse to move `fetched_at` backwards
//!
//! # Examples
//!
//! ```no_run
//! use passgate_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for gating operations
//! ```

#![warn(missing_docs)]

use passgate_domain::traits::{IdentityResolver, RequirementStore, ScoreCache};
use passgate_domain::{
    ActionKind, CategoryId, Clock, Identity, Requirement, Score, ScoreRecord, Scope, SystemClock,
    UserId,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Identity already linked to a different user
    #[error("Identity {identity} is already linked to user {user}")]
    IdentityInUse {
        /// The contested identity
        identity: String,
        /// The user currently holding it
        user: u64,
    },

    /// A previous holder of the connection lock panicked
    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// SQLite-backed store for scores, requirements and identity links
///
/// # Thread Safety
///
/// The connection is wrapped in a mutex, so a single `SqliteStore` can be
/// shared (e.g. behind an `Arc`) across threads and tasks. The lock is only
/// held for the duration of one statement.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use passgate_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("passgate.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Associate an identity with a user, replacing any previous identity for that user
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IdentityInUse`] if the identity belongs to another user.
    pub fn link_identity(&self, user: UserId, identity: &Identity) -> Result<(), StoreError> {
        let conn = self.conn()?;

        let holder: Option<i64> = conn
            .query_row(
                "SELECT user_id FROM user_identities WHERE identity = ?1",
                params![identity.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(holder) = holder.map(Self::from_sql_id).transpose()? {
            if holder != user.0 {
                return Err(StoreError::IdentityInUse {
                    identity: identity.to_string(),
                    user: holder,
                });
            }
        }

        conn.execute(
            "INSERT INTO user_identities (user_id, identity, linked_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
             identity = excluded.identity, linked_at = excluded.linked_at",
            params![Self::to_sql_id(user.0)?, identity.as_str(), SystemClock.now() as i64],
        )?;

        debug!("Linked user {} to identity {}", user, identity);
        Ok(())
    }

    /// SQLite integers are signed; ids past `i64::MAX` are refused
    fn to_sql_id(id: u64) -> Result<i64, StoreError> {
        i64::try_from(id).map_err(|_| StoreError::InvalidData(format!("Id out of range: {}", id)))
    }

    fn from_sql_id(value: i64) -> Result<u64, StoreError> {
        u64::try_from(value)
            .map_err(|_| StoreError::InvalidData(format!("Negative id in store: {}", value)))
    }

    /// Storage form of a scope: (scope column, category_id column)
    fn scope_to_columns(scope: Scope) -> Result<(&'static str, i64), StoreError> {
        match scope {
            Scope::UserLevel => Ok(("user_level", 0)),
            Scope::Category(CategoryId(id)) => Ok(("category", Self::to_sql_id(id)?)),
        }
    }

    /// Convert stored columns back into a scope
    fn columns_to_scope(kind: &str, category_id: i64) -> Result<Scope, StoreError> {
        match kind {
            "user_level" => Ok(Scope::UserLevel),
            "category" => Ok(Scope::Category(CategoryId(Self::from_sql_id(category_id)?))),
            _ => Err(StoreError::InvalidData(format!("Unknown scope: {}", kind))),
        }
    }

    fn parse_score(value: f64) -> Result<Score, StoreError> {
        Score::new(value).map_err(StoreError::InvalidData)
    }

    fn parse_action(value: &str) -> Result<ActionKind, StoreError> {
        ActionKind::parse(value)
            .ok_or_else(|| StoreError::InvalidData(format!("Unknown action: {}", value)))
    }
}

impl ScoreCache for SqliteStore {
    type Error = StoreError;

    fn get_score(&self, identity: &Identity) -> Result<Option<ScoreRecord>, Self::Error> {
        let row: Option<(f64, i64)> = self
            .conn()?
            .query_row(
                "SELECT score, fetched_at FROM score_records WHERE identity = ?1",
                params![identity.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(score, fetched_at)| {
            Ok::<_, StoreError>(ScoreRecord::new(
                identity.clone(),
                Self::parse_score(score)?,
                fetched_at as u64,
            ))
        })
        .transpose()
    }

    fn put_score(&self, record: &ScoreRecord) -> Result<(), Self::Error> {
        let changed = self.conn()?.execute(
            "INSERT INTO score_records (identity, score, fetched_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(identity) DO UPDATE SET
             score = excluded.score, fetched_at = excluded.fetched_at
             WHERE excluded.fetched_at >= score_records.fetched_at",
            params![
                record.identity.as_str(),
                record.score.value(),
                record.fetched_at as i64,
            ],
        )?;

        if changed == 0 {
            debug!(
                "Ignored out-of-order score for {} fetched at {}",
                record.identity, record.fetched_at
            );
        }

        Ok(())
    }
}

impl RequirementStore for SqliteStore {
    type Error = StoreError;

    fn set_requirement(&self, requirement: &Requirement) -> Result<(), Self::Error> {
        let (scope, category_id) = Self::scope_to_columns(requirement.scope)?;

        self.conn()?.execute(
            "INSERT INTO requirements (scope, category_id, action, required_score, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(scope, category_id, action) DO UPDATE SET
             required_score = excluded.required_score, updated_at = excluded.updated_at",
            params![
                scope,
                category_id,
                requirement.action.as_str(),
                requirement.required_score.value(),
                SystemClock.now() as i64,
            ],
        )?;

        Ok(())
    }

    fn get_requirement(
        &self,
        scope: Scope,
        action: ActionKind,
    ) -> Result<Option<Requirement>, Self::Error> {
        let (kind, category_id) = Self::scope_to_columns(scope)?;

        let required: Option<f64> = self
            .conn()?
            .query_row(
                "SELECT required_score FROM requirements
                 WHERE scope = ?1 AND category_id = ?2 AND action = ?3",
                params![kind, category_id, action.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        required
            .map(|value| Ok::<_, StoreError>(Requirement::new(scope, action, Self::parse_score(value)?)))
            .transpose()
    }

    fn requirements_for_scope(&self, scope: Scope) -> Result<Vec<Requirement>, Self::Error> {
        let (kind, category_id) = Self::scope_to_columns(scope)?;

        let rows: Vec<(String, i64, String, f64)> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT scope, category_id, action, required_score FROM requirements
                 WHERE scope = ?1 AND category_id = ?2 ORDER BY action",
            )?;
            let rows = stmt
                .query_map(params![kind, category_id], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter()
            .map(|(kind, category_id, action, required)| {
                Ok::<_, StoreError>(Requirement::new(
                    Self::columns_to_scope(&kind, category_id)?,
                    Self::parse_action(&action)?,
                    Self::parse_score(required)?,
                ))
            })
            .collect()
    }
}

impl IdentityResolver for SqliteStore {
    type Error = StoreError;

    fn identity_for_user(&self, user: UserId) -> Result<Option<Identity>, Self::Error> {
        let address: Option<String> = self
            .conn()?
            .query_row(
                "SELECT identity FROM user_identities WHERE user_id = ?1",
                params![Self::to_sql_id(user.0)?],
                |row| row.get(0),
            )
            .optional()?;

        address
            .map(|a| Identity::new(a).map_err(StoreError::InvalidData))
            .transpose()
    }
}
