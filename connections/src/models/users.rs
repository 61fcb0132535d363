use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user as seen by the connection core: identity plus a display name.
/// Users are owned by the identity collaborator; this crate only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}
