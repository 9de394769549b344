//! API wrapper plus the pure client-side logic: username validation before
//! any network call, the second-stage set filter, and the action shown next
//! to a candidate friend.

pub mod client;
pub mod session;

use std::collections::HashSet;

use bricklog_common::wire::{ErrorBody, ErrorCode};
use bricklog_common::{LegoSet, UserId};

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally; no request was made.
    #[error("{0}")]
    Validation(String),
    /// The server answered with an error body.
    #[error("{0}")]
    Api(ErrorBody),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api(body) => Some(body.code),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(ErrorCode::UniqueViolation)
    }
}

pub const USERNAME_RULES: &str =
    "Username must be 3-20 characters and contain only letters, numbers, and underscores";

pub fn validate_username(username: &str) -> bool {
    (3..=20).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The search-box narrowing. Runs over the already-fetched page, never
/// against the backend.
pub fn filter_sets(sets: Vec<LegoSet>, query: &str) -> Vec<LegoSet> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return sets;
    }
    sets.into_iter()
        .filter(|set| {
            set.name.to_lowercase().contains(&q)
                || set.set_number.to_lowercase().contains(&q)
                || set.theme.to_lowercase().contains(&q)
        })
        .collect()
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum FriendAction {
    AddFriend,
    RequestSent,
    AlreadyFriends,
}

/// Picks the button for a search result, cross-referenced against current
/// friendships and outstanding sent requests.
pub fn friend_action(
    candidate: &UserId,
    friends: &HashSet<UserId>,
    pending: &HashSet<UserId>,
) -> FriendAction {
    if friends.contains(candidate) {
        FriendAction::AlreadyFriends
    } else if pending.contains(candidate) {
        FriendAction::RequestSent
    } else {
        FriendAction::AddFriend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bricklog_common::wire::ProfileDraft;
    use bricklog_common::{SetId, SetStatus};
    use chrono::Utc;

    fn falcon() -> LegoSet {
        LegoSet {
            id: SetId("s1".into()),
            user_id: UserId("u1".into()),
            set_number: "75192".into(),
            name: "Millennium Falcon".into(),
            theme: "Star Wars".into(),
            year: Some(2017),
            piece_count: Some(7541),
            image_url: None,
            status: SetStatus::Owned,
            notes: None,
            building_progress: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn username_pattern() {
        assert!(validate_username("abc"));
        assert!(validate_username("brick_master_99"));
        assert!(validate_username("a".repeat(20).as_str()));
        assert!(!validate_username("ab"));
        assert!(!validate_username("a".repeat(21).as_str()));
        assert!(!validate_username("has space"));
        assert!(!validate_username("héllo"));
        assert!(!validate_username("dash-ed"));
        assert!(!validate_username(""));
    }

    #[test]
    fn search_matches_name_number_and_theme() {
        let sets = vec![falcon()];
        assert_eq!(filter_sets(sets.clone(), "falcon").len(), 1);
        assert_eq!(filter_sets(sets.clone(), "75192").len(), 1);
        assert_eq!(filter_sets(sets.clone(), "star").len(), 1);
        assert_eq!(filter_sets(sets.clone(), "FALCON").len(), 1);
        assert_eq!(filter_sets(sets.clone(), "titanic").len(), 0);
        // empty and whitespace-only queries keep everything
        assert_eq!(filter_sets(sets.clone(), "").len(), 1);
        assert_eq!(filter_sets(sets, "   ").len(), 1);
    }

    #[test]
    fn friend_action_prefers_friendship_over_pending() {
        let candidate = UserId("u2".into());
        let mut friends = HashSet::new();
        let mut pending = HashSet::new();
        assert_eq!(
            friend_action(&candidate, &friends, &pending),
            FriendAction::AddFriend
        );
        pending.insert(candidate.clone());
        assert_eq!(
            friend_action(&candidate, &friends, &pending),
            FriendAction::RequestSent
        );
        friends.insert(candidate.clone());
        assert_eq!(
            friend_action(&candidate, &friends, &pending),
            FriendAction::AlreadyFriends
        );
    }

    #[tokio::test]
    async fn invalid_username_never_reaches_the_network() {
        // an unroutable base: any request attempt would error as Http, not
        // Validation
        let http = reqwest::Client::new();
        let draft = ProfileDraft {
            username: "x".into(),
            bio: None,
            avatar_url: None,
        };
        let err = client::save_profile(&http, "http://127.0.0.1:9", "token", &draft)
            .await
            .unwrap_err();
        match err {
            ClientError::Validation(msg) => assert_eq!(msg, USERNAME_RULES),
            other => panic!("expected a validation error, got {other:?}"),
        }
    }
}
