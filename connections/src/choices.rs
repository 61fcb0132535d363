//! Connection choice projection.
//!
//! Derives sorted, filterable `(token, display name)` option lists from a
//! user's connections, and maps selected tokens back to the counterpart
//! users. These are pure functions over already-fetched records; the
//! fetch-and-join convenience lives on
//! [`crate::ConnectionRepository::connection_choices`].

use std::collections::{HashMap, HashSet};

use crate::constants::{SELF_LABEL, SELF_TOKEN};
use crate::models::{Connection, Status, User};

/// One selectable entry: the connection token and the counterpart's display
/// name.
pub type Choice = (String, String);

/// Options for [`connection_choices`].
#[derive(Debug, Clone, Default)]
pub struct ChoiceOptions {
    /// Restrict the underlying connection fetch to one status. Only honored
    /// by the repository convenience; the pure projector receives connections
    /// already filtered.
    pub status: Option<Status>,
    /// Counterpart user ids to leave out of the list. `None` means no
    /// filtering.
    pub exclude_user_ids: Option<HashSet<i32>>,
    /// Prepend a synthetic `("self", "Me")` entry representing the viewer.
    pub include_self: bool,
}

/// Projects `connections` into choices for `viewer`, sorted ascending by
/// display name. Connections whose counterpart is excluded are skipped, as
/// are connections whose counterpart has no record in `users_by_id` (the
/// directory slice handed in by the caller).
pub fn connection_choices(
    viewer: &User,
    connections: &[Connection],
    users_by_id: &HashMap<i32, User>,
    options: &ChoiceOptions,
) -> Vec<Choice> {
    let mut choices = Vec::new();

    for conn in connections {
        let Some(counterpart_id) = conn.connected_user_id(viewer.id) else {
            continue;
        };
        if let Some(excluded) = &options.exclude_user_ids {
            if excluded.contains(&counterpart_id) {
                continue;
            }
        }
        match users_by_id.get(&counterpart_id) {
            Some(user) => choices.push((conn.token.clone(), user.display_name.clone())),
            None => {
                tracing::warn!(
                    "no user record for counterpart {} of connection {}",
                    counterpart_id,
                    conn.id
                );
            }
        }
    }

    choices.sort_by(|a, b| a.1.cmp(&b.1));

    if options.include_self {
        choices.insert(0, (SELF_TOKEN.to_string(), SELF_LABEL.to_string()));
    }

    choices
}

/// Resolves selected tokens back to the counterpart users. Each connection is
/// matched at most once, so duplicate tokens in the selection do not produce
/// duplicate users. Unknown tokens are ignored.
pub fn users_for_tokens(
    viewer: &User,
    selected_tokens: &[String],
    connections: &[Connection],
    users_by_id: &HashMap<i32, User>,
) -> Vec<User> {
    connections
        .iter()
        .filter(|conn| selected_tokens.iter().any(|t| t == &conn.token))
        .filter_map(|conn| conn.connected_user_id(viewer.id))
        .filter_map(|id| users_by_id.get(&id).cloned())
        .collect()
}

/// Resolves a single token to the counterpart user, or `None` when no
/// connection carries it. The synthetic [`SELF_TOKEN`] resolves to the viewer.
pub fn user_for_token(
    viewer: &User,
    token: &str,
    connections: &[Connection],
    users_by_id: &HashMap<i32, User>,
) -> Option<User> {
    if token == SELF_TOKEN {
        return Some(viewer.clone());
    }
    connections
        .iter()
        .find(|conn| conn.token == token)
        .and_then(|conn| conn.connected_user_id(viewer.id))
        .and_then(|id| users_by_id.get(&id).cloned())
}

/// The token of the viewer's connection with `user_id`, for mapping an
/// initial user selection back onto a choice list.
pub fn token_for_user(viewer_id: i32, connections: &[Connection], user_id: i32) -> Option<&str> {
    connections
        .iter()
        .find(|conn| conn.connected_user_id(viewer_id) == Some(user_id))
        .map(|conn| conn.token.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(id: i32, display_name: &str) -> User {
        User {
            id,
            username: display_name.to_lowercase().replace(' ', "."),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        }
    }

    fn connection(token: &str, initiator: i32, recipient: i32) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            initiator_user_id: initiator,
            recipient_user_id: recipient,
            status: Status::Accepted,
            token: token.to_string(),
            activity_count: 1,
            email_sent: false,
            created_at: Utc::now(),
        }
    }

    fn fixture() -> (User, Vec<Connection>, HashMap<i32, User>) {
        let viewer = user(1, "Viewer");
        // Creation order deliberately differs from name order.
        let connections = vec![
            connection("tok-zoe", 1, 2),
            connection("tok-amy", 3, 1),
            connection("tok-mia", 1, 4),
        ];
        let users_by_id = HashMap::from([
            (2, user(2, "Zoe")),
            (3, user(3, "Amy")),
            (4, user(4, "Mia")),
        ]);
        (viewer, connections, users_by_id)
    }

    #[test]
    fn test_choices_sorted_by_display_name() {
        let (viewer, connections, users) = fixture();
        let choices =
            connection_choices(&viewer, &connections, &users, &ChoiceOptions::default());
        assert_eq!(
            choices,
            vec![
                ("tok-amy".to_string(), "Amy".to_string()),
                ("tok-mia".to_string(), "Mia".to_string()),
                ("tok-zoe".to_string(), "Zoe".to_string()),
            ]
        );
    }

    #[test]
    fn test_choices_exclude_user_ids() {
        let (viewer, connections, users) = fixture();
        let options = ChoiceOptions {
            exclude_user_ids: Some(HashSet::from([4])),
            ..ChoiceOptions::default()
        };
        let choices = connection_choices(&viewer, &connections, &users, &options);
        assert_eq!(choices.len(), 2);
        assert!(choices.iter().all(|(_, name)| name != "Mia"));
    }

    #[test]
    fn test_choices_include_self_entry() {
        let (viewer, connections, users) = fixture();
        let options = ChoiceOptions {
            include_self: true,
            ..ChoiceOptions::default()
        };
        let choices = connection_choices(&viewer, &connections, &users, &options);
        assert_eq!(choices[0], ("self".to_string(), "Me".to_string()));
        assert_eq!(choices.len(), 4);
    }

    #[test]
    fn test_choices_empty_inputs() {
        let viewer = user(1, "Viewer");
        let choices =
            connection_choices(&viewer, &[], &HashMap::new(), &ChoiceOptions::default());
        assert!(choices.is_empty());
    }

    #[test]
    fn test_choices_skip_missing_directory_entry() {
        let (viewer, connections, mut users) = fixture();
        users.remove(&2);
        let choices =
            connection_choices(&viewer, &connections, &users, &ChoiceOptions::default());
        assert_eq!(choices.len(), 2);
    }

    #[test]
    fn test_users_for_tokens_ignores_duplicates_and_unknowns() {
        let (viewer, connections, users) = fixture();
        let selected = vec![
            "tok-amy".to_string(),
            "tok-amy".to_string(),
            "no-such-token".to_string(),
        ];
        let resolved = users_for_tokens(&viewer, &selected, &connections, &users);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].display_name, "Amy");
    }

    #[test]
    fn test_user_for_token() {
        let (viewer, connections, users) = fixture();
        let resolved = user_for_token(&viewer, "tok-mia", &connections, &users).unwrap();
        assert_eq!(resolved.display_name, "Mia");
        assert!(user_for_token(&viewer, "missing", &connections, &users).is_none());

        let this_user = user_for_token(&viewer, SELF_TOKEN, &connections, &users).unwrap();
        assert_eq!(this_user.id, viewer.id);
    }

    #[test]
    fn test_token_for_user() {
        let (viewer, connections, _) = fixture();
        assert_eq!(token_for_user(viewer.id, &connections, 3), Some("tok-amy"));
        assert_eq!(token_for_user(viewer.id, &connections, 99), None);
    }
}
