//! Storage collaborator interface.
//!
//! The repository only talks to these traits; concrete implementations are
//! chosen at process wiring time. [`crate::db::PgConnectionStore`] backs
//! production, [`MemoryConnectionStore`] backs tests and embedding without a
//! database. Implementations must close the check-then-insert race on the
//! unordered pair and the token, and must apply activity increments as a
//! relative update, never read-modify-write.

pub mod memory;

pub use memory::MemoryConnectionStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Connection, Status, User};

/// Fields supplied when persisting a new connection. The store fills in
/// `activity_count` (1), `email_sent` (false) and `created_at`.
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub id: Uuid,
    pub initiator_user_id: i32,
    pub recipient_user_id: i32,
    pub status: Status,
    pub token: String,
}

/// Listing order for [`ConnectionStore::get_by_user`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionOrder {
    /// Most-recent-first, the conventional listing order.
    #[default]
    MostRecent,
    /// Highest activity count first, for relevance-ranked listings.
    MostActive,
}

/// Optional restrictions applied on top of the both-roles pair membership.
#[derive(Debug, Clone, Default)]
pub struct ConnectionFilter {
    pub status: Option<Status>,
    pub order: ConnectionOrder,
}

impl ConnectionFilter {
    pub fn with_status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Persists a new connection. Fails with [`crate::Error::DuplicatePair`]
    /// when a record for the unordered pair already exists and with
    /// [`crate::Error::DuplicateToken`] when the token is taken. The
    /// uniqueness checks and the insert must be atomic with respect to
    /// concurrent writers.
    async fn insert(&self, new: NewConnection) -> Result<Connection>;

    async fn get(&self, id: Uuid) -> Result<Option<Connection>>;

    async fn get_by_token(&self, token: &str) -> Result<Option<Connection>>;

    /// Symmetric pair lookup: matches regardless of which user initiated.
    async fn get_for_pair(&self, user_a: i32, user_b: i32) -> Result<Option<Connection>>;

    /// All connections where `user_id` is either participant, restricted and
    /// ordered by `filter`.
    async fn get_by_user(&self, user_id: i32, filter: &ConnectionFilter)
    -> Result<Vec<Connection>>;

    /// Fails with [`crate::Error::NotFound`] when the record is gone.
    async fn set_status(&self, id: Uuid, status: Status) -> Result<()>;

    /// Fails with [`crate::Error::NotFound`] when the record is gone.
    async fn set_email_sent(&self, id: Uuid, email_sent: bool) -> Result<()>;

    /// Atomically adds 1 to the activity count. Returns the new count, or
    /// `None` when the record no longer exists.
    async fn increment_activity(&self, id: Uuid) -> Result<Option<i32>>;

    /// Atomically adds 1 to the activity count of the pair's connection.
    /// Returns the new count, or `None` when no such connection exists.
    async fn increment_activity_for_pair(&self, user_a: i32, user_b: i32)
    -> Result<Option<i32>>;

    /// Removes the record, freeing the pair for a new connection. Returns
    /// whether a record was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Read-only access to the identity collaborator's user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: i32) -> Result<Option<User>>;

    /// Fetches the users for `ids`. Unknown ids are silently absent from the
    /// result; ordering is unspecified.
    async fn get_users(&self, ids: &[i32]) -> Result<Vec<User>>;
}
