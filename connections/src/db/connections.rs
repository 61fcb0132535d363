//! Postgres-backed connection store.
//!
//! Pair-uniqueness is enforced by a unique expression index over the
//! normalized pair `(LEAST(initiator, recipient), GREATEST(initiator,
//! recipient))`, token uniqueness by a unique constraint; both close the
//! check-then-insert race at the database. Activity increments are relative
//! updates evaluated server-side so concurrent bumps from both participants
//! are never lost.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Connection, Status, User};
use crate::store::{ConnectionFilter, ConnectionOrder, ConnectionStore, NewConnection, UserDirectory};

const CONNECTION_COLUMNS: &str = "id, initiator_user_id, recipient_user_id, status, token, \
                                  activity_count, email_sent, created_at";

/// Constraint names from migrations, used to tell which uniqueness rule a
/// concurrent writer tripped.
const TOKEN_CONSTRAINT: &str = "user_connections_token_key";

#[derive(Clone)]
pub struct PgConnectionStore {
    pool: PgPool,
}

impl PgConnectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_connection(row: &PgRow) -> Result<Connection> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<Status>()?;

    Ok(Connection {
        id: row.try_get("id")?,
        initiator_user_id: row.try_get("initiator_user_id")?,
        recipient_user_id: row.try_get("recipient_user_id")?,
        status,
        token: row.try_get("token")?,
        activity_count: row.try_get("activity_count")?,
        email_sent: row.try_get("email_sent")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_insert_error(e: sqlx::Error) -> Error {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            // Unique index violations report the index name as the constraint.
            return match db_err.constraint() {
                Some(TOKEN_CONSTRAINT) => Error::DuplicateToken,
                _ => Error::DuplicatePair,
            };
        }
    }
    Error::Database(e)
}

#[async_trait]
impl ConnectionStore for PgConnectionStore {
    async fn insert(&self, new: NewConnection) -> Result<Connection> {
        if new.initiator_user_id == new.recipient_user_id {
            return Err(Error::SelfConnection(new.initiator_user_id));
        }

        let sql = format!(
            "INSERT INTO user_connections (id, initiator_user_id, recipient_user_id, status, token) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {CONNECTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.id)
            .bind(new.initiator_user_id)
            .bind(new.recipient_user_id)
            .bind(new.status.as_str())
            .bind(&new.token)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)?;

        row_to_connection(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Connection>> {
        let sql = format!("SELECT {CONNECTION_COLUMNS} FROM user_connections WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_connection).transpose()
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Connection>> {
        let sql = format!("SELECT {CONNECTION_COLUMNS} FROM user_connections WHERE token = $1");
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_connection).transpose()
    }

    async fn get_for_pair(&self, user_a: i32, user_b: i32) -> Result<Option<Connection>> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM user_connections \
             WHERE (initiator_user_id = $1 AND recipient_user_id = $2) \
                OR (initiator_user_id = $2 AND recipient_user_id = $1)"
        );
        let row = sqlx::query(&sql)
            .bind(user_a)
            .bind(user_b)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_connection).transpose()
    }

    async fn get_by_user(
        &self,
        user_id: i32,
        filter: &ConnectionFilter,
    ) -> Result<Vec<Connection>> {
        let mut sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM user_connections \
             WHERE (initiator_user_id = $1 OR recipient_user_id = $1)"
        );
        if filter.status.is_some() {
            sql.push_str(" AND status = $2");
        }
        sql.push_str(match filter.order {
            ConnectionOrder::MostRecent => " ORDER BY created_at DESC, id DESC",
            ConnectionOrder::MostActive => " ORDER BY activity_count DESC, created_at DESC",
        });

        let mut query = sqlx::query(&sql).bind(user_id);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(row_to_connection).collect()
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<()> {
        let result = sqlx::query("UPDATE user_connections SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn set_email_sent(&self, id: Uuid, email_sent: bool) -> Result<()> {
        let result = sqlx::query("UPDATE user_connections SET email_sent = $2 WHERE id = $1")
            .bind(id)
            .bind(email_sent)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn increment_activity(&self, id: Uuid) -> Result<Option<i32>> {
        let count = sqlx::query_scalar::<_, i32>(
            "UPDATE user_connections SET activity_count = activity_count + 1 \
             WHERE id = $1 RETURNING activity_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count)
    }

    async fn increment_activity_for_pair(
        &self,
        user_a: i32,
        user_b: i32,
    ) -> Result<Option<i32>> {
        let count = sqlx::query_scalar::<_, i32>(
            "UPDATE user_connections SET activity_count = activity_count + 1 \
             WHERE (initiator_user_id = $1 AND recipient_user_id = $2) \
                OR (initiator_user_id = $2 AND recipient_user_id = $1) \
             RETURNING activity_count",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_connections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserDirectory for PgConnectionStore {
    async fn get_user(&self, id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, display_name, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_users(&self, ids: &[i32]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, display_name, created_at FROM users WHERE id = ANY($1)",
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
