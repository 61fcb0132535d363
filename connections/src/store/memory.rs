use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Connection, Status, User};
use crate::store::{ConnectionFilter, ConnectionOrder, ConnectionStore, NewConnection, UserDirectory};

/// In-process store backing the test suite and database-free embeddings.
///
/// Every operation takes the single mutex once, so the pair and token
/// uniqueness checks are atomic with the insert and increments cannot lose
/// updates. Insertion order stands in for creation order when listing
/// most-recent-first.
#[derive(Clone, Default)]
pub struct MemoryConnectionStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    connections: Vec<Connection>,
    users: HashMap<i32, User>,
    next_user_id: i32,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user record, assigning the next free id. The connection
    /// core never creates users; this exists so tests and database-free
    /// callers can seed the directory.
    pub fn add_user(&self, username: &str, display_name: &str) -> User {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            username: username.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        user
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().expect("memory store poisoned").connections.len()
    }
}

fn pair_matches(conn: &Connection, user_a: i32, user_b: i32) -> bool {
    (conn.initiator_user_id == user_a && conn.recipient_user_id == user_b)
        || (conn.initiator_user_id == user_b && conn.recipient_user_id == user_a)
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn insert(&self, new: NewConnection) -> Result<Connection> {
        if new.initiator_user_id == new.recipient_user_id {
            return Err(Error::SelfConnection(new.initiator_user_id));
        }

        let mut inner = self.inner.lock().expect("memory store poisoned");

        // Single guard covers both uniqueness checks and the insert.
        if inner
            .connections
            .iter()
            .any(|c| pair_matches(c, new.initiator_user_id, new.recipient_user_id))
        {
            return Err(Error::DuplicatePair);
        }
        if inner.connections.iter().any(|c| c.token == new.token) {
            return Err(Error::DuplicateToken);
        }

        let conn = Connection {
            id: new.id,
            initiator_user_id: new.initiator_user_id,
            recipient_user_id: new.recipient_user_id,
            status: new.status,
            token: new.token,
            activity_count: 1,
            email_sent: false,
            created_at: Utc::now(),
        };
        inner.connections.push(conn.clone());
        Ok(conn)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Connection>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.connections.iter().find(|c| c.id == id).cloned())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Connection>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.connections.iter().find(|c| c.token == token).cloned())
    }

    async fn get_for_pair(&self, user_a: i32, user_b: i32) -> Result<Option<Connection>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .connections
            .iter()
            .find(|c| pair_matches(c, user_a, user_b))
            .cloned())
    }

    async fn get_by_user(
        &self,
        user_id: i32,
        filter: &ConnectionFilter,
    ) -> Result<Vec<Connection>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut result: Vec<Connection> = inner
            .connections
            .iter()
            .rev()
            .filter(|c| c.involves(user_id))
            .filter(|c| filter.status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        if filter.order == ConnectionOrder::MostActive {
            // Stable sort keeps most-recent-first among equal counts.
            result.sort_by(|a, b| b.activity_count.cmp(&a.activity_count));
        }
        Ok(result)
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let conn = inner
            .connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(Error::NotFound)?;
        conn.status = status;
        Ok(())
    }

    async fn set_email_sent(&self, id: Uuid, email_sent: bool) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let conn = inner
            .connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(Error::NotFound)?;
        conn.email_sent = email_sent;
        Ok(())
    }

    async fn increment_activity(&self, id: Uuid) -> Result<Option<i32>> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.connections.iter_mut().find(|c| c.id == id).map(|c| {
            c.activity_count += 1;
            c.activity_count
        }))
    }

    async fn increment_activity_for_pair(
        &self,
        user_a: i32,
        user_b: i32,
    ) -> Result<Option<i32>> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .connections
            .iter_mut()
            .find(|c| pair_matches(c, user_a, user_b))
            .map(|c| {
                c.activity_count += 1;
                c.activity_count
            }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let before = inner.connections.len();
        inner.connections.retain(|c| c.id != id);
        Ok(inner.connections.len() < before)
    }
}

#[async_trait]
impl UserDirectory for MemoryConnectionStore {
    async fn get_user(&self, id: i32) -> Result<Option<User>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.users.get(&id).cloned())
    }

    async fn get_users(&self, ids: &[i32]) -> Result<Vec<User>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }
}
