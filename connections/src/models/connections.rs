use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Lifecycle state of a connection.
///
/// Transitions are plain field writes: nothing stops a caller from accepting
/// a declined connection. Statuses are labels, not a guarded state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Waiting on a response from the recipient.
    #[default]
    Pending,
    /// An accepted and current connection.
    Accepted,
    /// Declined by the recipient; was never active.
    Declined,
    /// Was once accepted and is no longer.
    Inactive,
}

impl Status {
    /// Canonical string form, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Accepted => "ACCEPTED",
            Status::Declined => "DECLINED",
            Status::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Status::Pending),
            "ACCEPTED" => Ok(Status::Accepted),
            "DECLINED" => Ok(Status::Declined),
            "INACTIVE" => Ok(Status::Inactive),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// The single relationship record between two users.
///
/// The pair is stored as two directed fields (who initiated, who received)
/// but every query treats it as unordered; at most one record exists per
/// unordered pair. `token` is an opaque identifier for external references,
/// distinct from the primary id. `activity_count` starts at 1 and only goes
/// up; it approximates how often the two users interact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub initiator_user_id: i32,
    pub recipient_user_id: i32,
    pub status: Status,
    pub token: String,
    pub activity_count: i32,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    /// The two participant ids, initiator first.
    pub fn user_ids(&self) -> [i32; 2] {
        [self.initiator_user_id, self.recipient_user_id]
    }

    /// Whether `user_id` is one of the two participants.
    pub fn involves(&self, user_id: i32) -> bool {
        self.initiator_user_id == user_id || self.recipient_user_id == user_id
    }

    /// The other participant. Returns `None` when `user_id` is not part of
    /// this connection; that is a normal query outcome, not an error.
    pub fn connected_user_id(&self, user_id: i32) -> Option<i32> {
        if user_id == self.initiator_user_id {
            Some(self.recipient_user_id)
        } else if user_id == self.recipient_user_id {
            Some(self.initiator_user_id)
        } else {
            None
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == Status::Accepted
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    pub fn is_declined(&self) -> bool {
        self.status == Status::Declined
    }

    pub fn is_inactive(&self) -> bool {
        self.status == Status::Inactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(initiator: i32, recipient: i32) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            initiator_user_id: initiator,
            recipient_user_id: recipient,
            status: Status::Pending,
            token: "abcdefghij0123456789".to_string(),
            activity_count: 1,
            email_sent: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_connected_user_id() {
        let conn = connection(1, 2);
        assert_eq!(conn.connected_user_id(1), Some(2));
        assert_eq!(conn.connected_user_id(2), Some(1));
        assert_eq!(conn.connected_user_id(3), None);
    }

    #[test]
    fn test_status_predicates() {
        let mut conn = connection(1, 2);
        assert!(conn.is_pending());
        assert!(!conn.is_accepted());

        conn.status = Status::Accepted;
        assert!(conn.is_accepted());

        conn.status = Status::Declined;
        assert!(conn.is_declined());

        conn.status = Status::Inactive;
        assert!(conn.is_inactive());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("ACCEPTED".parse::<Status>().unwrap(), Status::Accepted);
        assert!(matches!(
            "accepted".parse::<Status>(),
            Err(Error::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_involves() {
        let conn = connection(7, 9);
        assert!(conn.involves(7));
        assert!(conn.involves(9));
        assert!(!conn.involves(8));
    }
}
