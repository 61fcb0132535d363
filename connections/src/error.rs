use thiserror::Error;

/// Errors surfaced by the connection core.
///
/// Point lookups that can reasonably miss (`get_by_token`, `get_for_pair`)
/// return `Ok(None)` instead of an error; the `*_or_not_found` repository
/// variants convert a miss into [`Error::NotFound`] for boundary callers that
/// want the strict behavior.
#[derive(Debug, Error)]
pub enum Error {
    /// A strict point lookup (by id or token) missed.
    #[error("connection not found")]
    NotFound,

    /// Both sides of the requested pair are the same user.
    #[error("user {0} cannot be connected to themselves")]
    SelfConnection(i32),

    /// Requested token length is zero or above the allowed maximum.
    #[error("invalid token length {0}")]
    InvalidTokenLength(usize),

    /// A stored status string did not parse. Only reachable when the backing
    /// store holds a value this crate never wrote.
    #[error("unknown connection status '{0}'")]
    InvalidStatus(String),

    /// The token generator gave up after too many collisions.
    #[error("no unique token found after {0} attempts")]
    TokenSpaceExhausted(u32),

    /// A concurrent writer already created a connection for this pair.
    #[error("a connection already exists for this user pair")]
    DuplicatePair,

    /// A concurrent writer claimed the same token.
    #[error("connection token already in use")]
    DuplicateToken,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Error {
    /// Uniqueness violations raised by a concurrent writer. These are
    /// retry-worthy: `get_or_create` consumes them by re-fetching or
    /// regenerating, so they only escape through raw store calls.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::DuplicatePair | Error::DuplicateToken)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
