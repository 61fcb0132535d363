//! Connection token generation.
//!
//! Tokens are random alphanumeric strings shared between the two connected
//! users, used for external references instead of the primary id.

use rand::{Rng, distr::Alphanumeric};

use crate::constants::{MAX_TOKEN_ATTEMPTS, MAX_TOKEN_LENGTH};
use crate::error::{Error, Result};
use crate::store::ConnectionStore;

/// A random alphanumeric token of `length` characters. No uniqueness check.
pub fn random_token(length: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// The next available token: random candidates are checked against the store
/// and regenerated on collision, up to [`MAX_TOKEN_ATTEMPTS`].
///
/// The store keeps its own unique constraint on the token column, so a
/// candidate that passes this check can still lose a race at insert time;
/// [`crate::ConnectionRepository::get_or_create`] handles that by calling
/// here again.
pub async fn next_token<S>(store: &S, length: usize) -> Result<String>
where
    S: ConnectionStore + ?Sized,
{
    if length == 0 || length > MAX_TOKEN_LENGTH {
        return Err(Error::InvalidTokenLength(length));
    }

    for _ in 0..MAX_TOKEN_ATTEMPTS {
        let candidate = random_token(length);
        if store.get_by_token(&candidate).await?.is_none() {
            return Ok(candidate);
        }
        tracing::debug!("token collision, regenerating");
    }

    Err(Error::TokenSpaceExhausted(MAX_TOKEN_ATTEMPTS))
}
