//! Connection repository: create/get/query operations enforcing
//! pair-uniqueness and both-sides lookup over any [`ConnectionStore`].

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::choices::{self, Choice, ChoiceOptions};
use crate::constants::{DEFAULT_TOKEN_LENGTH, MAX_TOKEN_ATTEMPTS};
use crate::error::{Error, Result};
use crate::models::{Connection, Status, User};
use crate::store::{ConnectionFilter, ConnectionStore, NewConnection, UserDirectory};
use crate::token;

/// All reads and writes against the connection collection go through here;
/// nothing else queries the raw directed pair fields, so the symmetric-pair
/// handling lives in exactly one place.
#[derive(Clone)]
pub struct ConnectionRepository<S> {
    store: S,
}

impl<S: ConnectionStore> ConnectionRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a connection between two users, `initiator` requesting
    /// `recipient`.
    ///
    /// Idempotent against the unordered pair: if a connection already exists
    /// it is returned unchanged, whichever side initiated it. Callers that
    /// need to know which branch occurred should use [`Self::get_or_create`].
    pub async fn create(
        &self,
        initiator_user_id: i32,
        recipient_user_id: i32,
        status: Status,
    ) -> Result<Connection> {
        let (conn, _was_created) = self
            .get_or_create(initiator_user_id, recipient_user_id, status)
            .await?;
        Ok(conn)
    }

    /// Gets the connection for the unordered pair, creating it when absent.
    /// The boolean reports whether this call created the record.
    ///
    /// A uniqueness conflict from a concurrent writer is not an error here:
    /// a lost pair race falls back to re-fetching the winner's record, a lost
    /// token race regenerates and retries.
    pub async fn get_or_create(
        &self,
        initiator_user_id: i32,
        recipient_user_id: i32,
        status: Status,
    ) -> Result<(Connection, bool)> {
        if initiator_user_id == recipient_user_id {
            return Err(Error::SelfConnection(initiator_user_id));
        }

        if let Some(existing) = self
            .store
            .get_for_pair(initiator_user_id, recipient_user_id)
            .await?
        {
            return Ok((existing, false));
        }

        let mut attempts = 0u32;
        loop {
            let token = token::next_token(&self.store, DEFAULT_TOKEN_LENGTH).await?;
            let new = NewConnection {
                id: Uuid::new_v4(),
                initiator_user_id,
                recipient_user_id,
                status,
                token,
            };
            match self.store.insert(new).await {
                Ok(conn) => {
                    tracing::info!(
                        "created connection {} between users {} and {}",
                        conn.id,
                        initiator_user_id,
                        recipient_user_id
                    );
                    return Ok((conn, true));
                }
                Err(Error::DuplicatePair) => {
                    // Lost the race; the winner's record is the connection.
                    if let Some(existing) = self
                        .store
                        .get_for_pair(initiator_user_id, recipient_user_id)
                        .await?
                    {
                        return Ok((existing, false));
                    }
                    // Winner was deleted before we could read it; insert again.
                }
                Err(Error::DuplicateToken) => {
                    tracing::debug!("token claimed by concurrent insert, regenerating");
                }
                Err(e) => return Err(e),
            }
            attempts += 1;
            if attempts >= MAX_TOKEN_ATTEMPTS {
                return Err(Error::TokenSpaceExhausted(attempts));
            }
        }
    }

    /// The connection between two users, regardless of which one initiated.
    pub async fn get_for_pair(&self, user_a: i32, user_b: i32) -> Result<Option<Connection>> {
        self.store.get_for_pair(user_a, user_b).await
    }

    /// All connections where the user is either initiator or recipient.
    pub async fn get_by_user(
        &self,
        user_id: i32,
        filter: &ConnectionFilter,
    ) -> Result<Vec<Connection>> {
        self.store.get_by_user(user_id, filter).await
    }

    /// The user's connections keyed by counterpart user id, for listings that
    /// look up "my connection with this user" directly.
    pub async fn by_counterpart(
        &self,
        user_id: i32,
        filter: &ConnectionFilter,
    ) -> Result<HashMap<i32, Connection>> {
        let connections = self.store.get_by_user(user_id, filter).await?;
        Ok(connections
            .into_iter()
            .filter_map(|c| c.connected_user_id(user_id).map(|id| (id, c)))
            .collect())
    }

    /// The set of all counterpart user ids across every connection involving
    /// `user_id`. Empty when the user has no connections.
    pub async fn get_connected_user_ids(&self, user_id: i32) -> Result<HashSet<i32>> {
        let connections = self
            .store
            .get_by_user(user_id, &ConnectionFilter::default())
            .await?;
        Ok(connections
            .iter()
            .filter_map(|c| c.connected_user_id(user_id))
            .collect())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Connection>> {
        self.store.get(id).await
    }

    pub async fn get_by_id_or_not_found(&self, id: Uuid) -> Result<Connection> {
        self.store.get(id).await?.ok_or(Error::NotFound)
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Option<Connection>> {
        self.store.get_by_token(token).await
    }

    /// Boundary-facing token lookup: a miss is [`Error::NotFound`] instead of
    /// an empty result.
    pub async fn get_by_token_or_not_found(&self, token: &str) -> Result<Connection> {
        self.store.get_by_token(token).await?.ok_or(Error::NotFound)
    }

    /// The other participant of `conn` as a user record, or `None` when
    /// `user_id` is not a participant.
    pub async fn get_connected_user<D>(
        &self,
        directory: &D,
        conn: &Connection,
        user_id: i32,
    ) -> Result<Option<User>>
    where
        D: UserDirectory + ?Sized,
    {
        match conn.connected_user_id(user_id) {
            Some(id) => directory.get_user(id).await,
            None => Ok(None),
        }
    }

    /// Accepts the connection. A plain status write, no further side effects.
    pub async fn accept(&self, conn: &mut Connection) -> Result<()> {
        self.set_status(conn, Status::Accepted).await
    }

    /// Declines the connection.
    pub async fn decline(&self, conn: &mut Connection) -> Result<()> {
        self.set_status(conn, Status::Declined).await
    }

    /// Inactivates a connection that is no longer current.
    pub async fn inactivate(&self, conn: &mut Connection) -> Result<()> {
        self.set_status(conn, Status::Inactive).await
    }

    async fn set_status(&self, conn: &mut Connection, status: Status) -> Result<()> {
        self.store.set_status(conn.id, status).await?;
        tracing::debug!("connection {} moved from {} to {}", conn.id, conn.status, status);
        conn.status = status;
        Ok(())
    }

    /// Records that the one-time connection email went out.
    pub async fn mark_email_sent(&self, conn: &mut Connection) -> Result<()> {
        self.store.set_email_sent(conn.id, true).await?;
        conn.email_sent = true;
        Ok(())
    }

    /// Bumps the activity count by one, atomically at the store. Returns
    /// `false` when the record no longer exists; ordinary contention never
    /// errors.
    pub async fn increment_activity(&self, conn: &mut Connection) -> Result<bool> {
        match self.store.increment_activity(conn.id).await? {
            Some(count) => {
                conn.activity_count = count;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Bumps the activity count for the pair's connection. Returns `false`
    /// when no connection exists between the two users; no side effect in
    /// that case.
    pub async fn increment_activity_by_users(
        &self,
        user_id_1: i32,
        user_id_2: i32,
    ) -> Result<bool> {
        Ok(self
            .store
            .increment_activity_for_pair(user_id_1, user_id_2)
            .await?
            .is_some())
    }

    /// Deletes the connection, freeing the pair for a new one.
    pub async fn delete(&self, conn: &Connection) -> Result<bool> {
        self.store.delete(conn.id).await
    }

    /// Fetches the viewer's connections, joins the counterpart users from
    /// `directory` and projects them into a sorted choice list.
    pub async fn connection_choices<D>(
        &self,
        directory: &D,
        viewer: &User,
        options: &ChoiceOptions,
    ) -> Result<Vec<Choice>>
    where
        D: UserDirectory + ?Sized,
    {
        let filter = ConnectionFilter {
            status: options.status,
            ..ConnectionFilter::default()
        };
        let connections = self.store.get_by_user(viewer.id, &filter).await?;
        let counterpart_ids: Vec<i32> = connections
            .iter()
            .filter_map(|c| c.connected_user_id(viewer.id))
            .collect();
        let users = directory.get_users(&counterpart_ids).await?;
        let users_by_id: HashMap<i32, User> = users.into_iter().map(|u| (u.id, u)).collect();
        Ok(choices::connection_choices(
            viewer,
            &connections,
            &users_by_id,
            options,
        ))
    }
}
