//! sled-backed storage: one tree per entity plus small index trees for the
//! uniqueness constraints (email, username, request pair) and for token
//! lookups. The uniqueness points are single `compare_and_swap` claims, so
//! there is no check-then-insert window.

use bricklog_common::wire::{ProfileDraft, SetDraft};
use bricklog_common::{
    FriendRequest, Friendship, FriendshipId, LegoSet, Profile, RequestId, RequestStatus, SetId,
    SetStatus, User, UserId,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sled::{Db, Tree};
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    UniqueViolation(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Sled(#[from] sled::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Server-internal account record; never leaves the server as-is.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub verified: bool,
}

impl Account {
    pub fn user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }

    pub fn password_matches(&self, password: &str) -> bool {
        hash_password(password, &self.salt) == self.password_hash
    }
}

fn hash_password(password: &str, salt: &str) -> String {
    let digest = Sha256::digest(format!("{salt}:{password}").as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn pair_key(sender: &UserId, receiver: &UserId) -> Vec<u8> {
    format!("{}/{}", sender.0, receiver.0).into_bytes()
}

fn get<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> Result<Option<T>> {
    Ok(match tree.get(key)? {
        Some(raw) => Some(serde_json::from_slice(&raw)?),
        None => None,
    })
}

fn put<T: Serialize>(tree: &Tree, key: &[u8], value: &T) -> Result<()> {
    tree.insert(key, serde_json::to_vec(value)?)?;
    Ok(())
}

/// Atomically claim an index key; a lost race or an existing holder both
/// surface as the uniqueness violation for `what`.
fn claim(tree: &Tree, key: &[u8], value: &str, what: &'static str) -> Result<()> {
    tree.compare_and_swap(key, None as Option<&[u8]>, Some(value.as_bytes()))?
        .map_err(|_| StoreError::UniqueViolation(what))
}

fn scan<T: DeserializeOwned>(tree: &Tree) -> impl Iterator<Item = Result<T>> {
    tree.iter().map(|entry| {
        let (_, raw) = entry?;
        Ok(serde_json::from_slice(&raw)?)
    })
}

#[derive(Clone)]
pub struct Store {
    accounts: Tree,      // user id -> Account
    emails: Tree,        // lowercase email -> user id
    sessions: Tree,      // session token -> user id
    verifications: Tree, // verification token -> user id
    profiles: Tree,      // user id -> Profile
    usernames: Tree,     // lowercase username -> user id
    sets: Tree,          // set id -> LegoSet
    requests: Tree,      // request id -> FriendRequest
    request_pairs: Tree, // "sender/receiver" -> request id
    friendships: Tree,   // friendship id -> Friendship
}

impl Store {
    pub fn open(db: &Db) -> Result<Self> {
        Ok(Self {
            accounts: db.open_tree("accounts")?,
            emails: db.open_tree("emails")?,
            sessions: db.open_tree("sessions")?,
            verifications: db.open_tree("verifications")?,
            profiles: db.open_tree("profiles")?,
            usernames: db.open_tree("usernames")?,
            sets: db.open_tree("sets")?,
            requests: db.open_tree("requests")?,
            request_pairs: db.open_tree("request_pairs")?,
            friendships: db.open_tree("friendships")?,
        })
    }

    // -- auth ---------------------------------------------------------------

    pub fn create_account(&self, email: &str, password: &str) -> Result<(Account, String)> {
        let id = UserId(new_id());
        claim(
            &self.emails,
            email.to_lowercase().as_bytes(),
            &id.0,
            "An account with this email already exists",
        )?;
        let salt = new_id();
        let account = Account {
            id: id.clone(),
            email: email.to_string(),
            password_hash: hash_password(password, &salt),
            salt,
            verified: false,
        };
        put(&self.accounts, id.0.as_bytes(), &account)?;
        let token = new_id();
        self.verifications.insert(token.as_bytes(), id.0.as_bytes())?;
        Ok((account, token))
    }

    /// Consumes the verification token and marks the account verified.
    pub fn verify(&self, token: &str) -> Result<()> {
        let raw = self
            .verifications
            .remove(token.as_bytes())?
            .ok_or(StoreError::NotFound("verification token"))?;
        let id = String::from_utf8_lossy(&raw).into_owned();
        let mut account: Account =
            get(&self.accounts, id.as_bytes())?.ok_or(StoreError::NotFound("account"))?;
        account.verified = true;
        put(&self.accounts, id.as_bytes(), &account)
    }

    pub fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        match self.emails.get(email.to_lowercase().as_bytes())? {
            Some(raw) => get(&self.accounts, &raw),
            None => Ok(None),
        }
    }

    pub fn create_session(&self, user: &UserId) -> Result<String> {
        let token = new_id();
        self.sessions.insert(token.as_bytes(), user.0.as_bytes())?;
        Ok(token)
    }

    pub fn session_account(&self, token: &str) -> Result<Option<Account>> {
        match self.sessions.get(token.as_bytes())? {
            Some(raw) => get(&self.accounts, &raw),
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.sessions.remove(token.as_bytes())?;
        Ok(())
    }

    // -- profiles -----------------------------------------------------------

    pub fn profile(&self, user: &UserId) -> Result<Option<Profile>> {
        get(&self.profiles, user.0.as_bytes())
    }

    /// Conditional upsert. The username claim is atomic, and the profile row
    /// itself is written with a compare-and-swap against the version that was
    /// read: if a concurrent save lands in between, the claim is released and
    /// the whole thing retried against the fresh row, so no username index
    /// entry outlives the write it belonged to.
    pub fn upsert_profile(&self, user: &UserId, draft: ProfileDraft) -> Result<Profile> {
        let key = draft.username.to_lowercase();
        loop {
            let previous_raw = self.profiles.get(user.0.as_bytes())?;
            let previous: Option<Profile> = match &previous_raw {
                Some(raw) => Some(serde_json::from_slice(raw)?),
                None => None,
            };
            let renamed = previous
                .as_ref()
                .map(|p| p.username.to_lowercase() != key)
                .unwrap_or(true);
            if renamed {
                claim(
                    &self.usernames,
                    key.as_bytes(),
                    &user.0,
                    "Username already taken",
                )?;
            }
            let profile = Profile {
                id: user.clone(),
                username: draft.username.clone(),
                bio: draft.bio.clone(),
                avatar_url: draft.avatar_url.clone(),
                updated_at: Utc::now(),
            };
            let swapped = self.profiles.compare_and_swap(
                user.0.as_bytes(),
                previous_raw.as_ref(),
                Some(serde_json::to_vec(&profile)?),
            )?;
            if swapped.is_ok() {
                if renamed {
                    if let Some(prev) = &previous {
                        self.usernames.remove(prev.username.to_lowercase().as_bytes())?;
                    }
                }
                return Ok(profile);
            }
            // lost the row race; give the claim back before retrying
            if renamed {
                self.usernames.remove(key.as_bytes())?;
            }
        }
    }

    pub fn search_profiles(&self, query: &str, limit: usize) -> Result<Vec<Profile>> {
        let needle = query.to_lowercase();
        let mut found = Vec::new();
        for profile in scan::<Profile>(&self.profiles) {
            let profile = profile?;
            if profile.username.to_lowercase().contains(&needle) {
                found.push(profile);
                if found.len() == limit {
                    break;
                }
            }
        }
        Ok(found)
    }

    // -- sets ---------------------------------------------------------------

    pub fn sets_for(&self, user: &UserId, status: Option<SetStatus>) -> Result<Vec<LegoSet>> {
        let mut sets = Vec::new();
        for set in scan::<LegoSet>(&self.sets) {
            let set = set?;
            if set.user_id == *user && status.map(|s| s == set.status).unwrap_or(true) {
                sets.push(set);
            }
        }
        sets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sets)
    }

    pub fn insert_set(&self, user: &UserId, draft: SetDraft) -> Result<LegoSet> {
        let set = LegoSet {
            id: SetId(new_id()),
            user_id: user.clone(),
            set_number: draft.set_number,
            name: draft.name,
            theme: draft.theme,
            year: draft.year,
            piece_count: draft.piece_count,
            image_url: draft.image_url,
            status: draft.status,
            notes: draft.notes,
            building_progress: 0,
            created_at: Utc::now(),
        };
        put(&self.sets, set.id.0.as_bytes(), &set)?;
        Ok(set)
    }

    pub fn update_set(&self, user: &UserId, id: &SetId, draft: SetDraft) -> Result<LegoSet> {
        let mut set: LegoSet =
            get(&self.sets, id.0.as_bytes())?.ok_or(StoreError::NotFound("set"))?;
        if set.user_id != *user {
            return Err(StoreError::Forbidden("This set belongs to another user"));
        }
        set.set_number = draft.set_number;
        set.name = draft.name;
        set.theme = draft.theme;
        set.year = draft.year;
        set.piece_count = draft.piece_count;
        set.image_url = draft.image_url;
        set.status = draft.status;
        set.notes = draft.notes;
        put(&self.sets, id.0.as_bytes(), &set)?;
        Ok(set)
    }

    pub fn delete_set(&self, user: &UserId, id: &SetId) -> Result<()> {
        let set: LegoSet = get(&self.sets, id.0.as_bytes())?.ok_or(StoreError::NotFound("set"))?;
        if set.user_id != *user {
            return Err(StoreError::Forbidden("This set belongs to another user"));
        }
        self.sets.remove(id.0.as_bytes())?;
        Ok(())
    }

    // -- friend requests ----------------------------------------------------

    pub fn create_request(&self, sender: &UserId, receiver: &UserId) -> Result<FriendRequest> {
        let id = RequestId(new_id());
        claim(
            &self.request_pairs,
            &pair_key(sender, receiver),
            &id.0,
            "Friend request already sent",
        )?;
        let request = FriendRequest {
            id,
            sender_id: sender.clone(),
            receiver_id: receiver.clone(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        put(&self.requests, request.id.0.as_bytes(), &request)?;
        Ok(request)
    }

    pub fn pending_received(&self, user: &UserId) -> Result<Vec<FriendRequest>> {
        self.pending_where(|r| r.receiver_id == *user)
    }

    pub fn pending_sent(&self, user: &UserId) -> Result<Vec<FriendRequest>> {
        self.pending_where(|r| r.sender_id == *user)
    }

    fn pending_where(&self, keep: impl Fn(&FriendRequest) -> bool) -> Result<Vec<FriendRequest>> {
        let mut requests = Vec::new();
        for request in scan::<FriendRequest>(&self.requests) {
            let request = request?;
            if request.status == RequestStatus::Pending && keep(&request) {
                requests.push(request);
            }
        }
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Flips the request to accepted and writes both directional friendship
    /// rows. The accepted row is kept, so the pair stays claimed.
    pub fn accept_request(&self, user: &UserId, id: &RequestId) -> Result<()> {
        let mut request: FriendRequest =
            get(&self.requests, id.0.as_bytes())?.ok_or(StoreError::NotFound("friend request"))?;
        if request.receiver_id != *user {
            return Err(StoreError::Forbidden("Only the receiver can accept a request"));
        }
        if request.status != RequestStatus::Pending {
            return Err(StoreError::NotFound("pending friend request"));
        }
        request.status = RequestStatus::Accepted;
        put(&self.requests, id.0.as_bytes(), &request)?;
        let now = Utc::now();
        for (user_id, friend_id) in [
            (&request.receiver_id, &request.sender_id),
            (&request.sender_id, &request.receiver_id),
        ] {
            let edge = Friendship {
                id: FriendshipId(new_id()),
                user_id: user_id.clone(),
                friend_id: friend_id.clone(),
                created_at: now,
            };
            put(&self.friendships, edge.id.0.as_bytes(), &edge)?;
        }
        Ok(())
    }

    /// Declining deletes the row outright; the pair becomes requestable
    /// again. No declined state is persisted.
    pub fn decline_request(&self, user: &UserId, id: &RequestId) -> Result<()> {
        let request: FriendRequest =
            get(&self.requests, id.0.as_bytes())?.ok_or(StoreError::NotFound("friend request"))?;
        if request.receiver_id != *user {
            return Err(StoreError::Forbidden("Only the receiver can decline a request"));
        }
        if request.status != RequestStatus::Pending {
            return Err(StoreError::NotFound("pending friend request"));
        }
        self.requests.remove(id.0.as_bytes())?;
        self.request_pairs
            .remove(&pair_key(&request.sender_id, &request.receiver_id))?;
        Ok(())
    }

    // -- friendships --------------------------------------------------------

    pub fn friendships_for(&self, user: &UserId) -> Result<Vec<Friendship>> {
        let mut edges = Vec::new();
        for edge in scan::<Friendship>(&self.friendships) {
            let edge = edge?;
            if edge.user_id == *user {
                edges.push(edge);
            }
        }
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(edges)
    }

    pub fn are_friends(&self, user: &UserId, friend: &UserId) -> Result<bool> {
        for edge in scan::<Friendship>(&self.friendships) {
            let edge = edge?;
            if edge.user_id == *user && edge.friend_id == *friend {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Deletes the caller's directional row only; the reciprocal row stays
    /// until the other party removes it.
    pub fn delete_friendship(&self, user: &UserId, id: &FriendshipId) -> Result<()> {
        let edge: Friendship =
            get(&self.friendships, id.0.as_bytes())?.ok_or(StoreError::NotFound("friendship"))?;
        if edge.user_id != *user {
            return Err(StoreError::Forbidden("This friendship belongs to another user"));
        }
        self.friendships.remove(id.0.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        let db = sled::Config::new().temporary(true).open().unwrap();
        Store::open(&db).unwrap()
    }

    fn draft(username: &str) -> ProfileDraft {
        ProfileDraft {
            username: username.to_string(),
            bio: None,
            avatar_url: None,
        }
    }

    fn set_draft(number: &str, name: &str, status: SetStatus) -> SetDraft {
        SetDraft {
            set_number: number.to_string(),
            name: name.to_string(),
            theme: "Star Wars".to_string(),
            year: None,
            piece_count: None,
            image_url: None,
            status,
            notes: None,
        }
    }

    #[test]
    fn username_claim_is_exclusive() {
        let store = store();
        let a = UserId("a".into());
        let b = UserId("b".into());
        store.upsert_profile(&a, draft("brickmaster")).unwrap();
        let err = store.upsert_profile(&b, draft("BrickMaster")).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        // re-saving your own name is not a conflict
        store.upsert_profile(&a, draft("brickmaster")).unwrap();
        // renaming frees the old name
        store.upsert_profile(&a, draft("studlord")).unwrap();
        store.upsert_profile(&b, draft("brickmaster")).unwrap();
    }

    #[test]
    fn racing_first_saves_do_not_strand_a_username() {
        let store = store();
        let a = UserId("a".into());
        let handles: Vec<_> = ["first_name", "second_name"]
            .into_iter()
            .map(|name| {
                let store = store.clone();
                let a = a.clone();
                let draft = draft(name);
                std::thread::spawn(move || store.upsert_profile(&a, draft))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        // last write wins, and the loser's name is free again
        let kept = store.profile(&a).unwrap().unwrap().username;
        let lost = if kept == "first_name" {
            "second_name"
        } else {
            "first_name"
        };
        let b = UserId("b".into());
        store.upsert_profile(&b, draft(lost)).unwrap();
        // the winner's name is still held
        let err = store.upsert_profile(&b, draft(&kept)).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[test]
    fn duplicate_request_pair_is_rejected() {
        let store = store();
        let a = UserId("a".into());
        let b = UserId("b".into());
        store.create_request(&a, &b).unwrap();
        let err = store.create_request(&a, &b).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        // the reverse direction is a different pair
        store.create_request(&b, &a).unwrap();
    }

    #[test]
    fn accept_writes_both_edges_and_keeps_the_pair_claimed() {
        let store = store();
        let a = UserId("a".into());
        let b = UserId("b".into());
        let request = store.create_request(&a, &b).unwrap();
        // only the receiver may accept
        let err = store.accept_request(&a, &request.id).unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        store.accept_request(&b, &request.id).unwrap();
        assert!(store.are_friends(&a, &b).unwrap());
        assert!(store.are_friends(&b, &a).unwrap());
        assert!(store.pending_received(&b).unwrap().is_empty());
        // the accepted row still blocks a re-request
        let err = store.create_request(&a, &b).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[test]
    fn decline_frees_the_pair() {
        let store = store();
        let a = UserId("a".into());
        let b = UserId("b".into());
        let request = store.create_request(&a, &b).unwrap();
        store.decline_request(&b, &request.id).unwrap();
        assert!(store.pending_received(&b).unwrap().is_empty());
        store.create_request(&a, &b).unwrap();
    }

    #[test]
    fn unfriending_is_one_sided() {
        let store = store();
        let a = UserId("a".into());
        let b = UserId("b".into());
        let request = store.create_request(&a, &b).unwrap();
        store.accept_request(&b, &request.id).unwrap();
        let mine = store.friendships_for(&a).unwrap();
        store.delete_friendship(&a, &mine[0].id).unwrap();
        assert!(!store.are_friends(&a, &b).unwrap());
        assert!(store.are_friends(&b, &a).unwrap());
    }

    #[test]
    fn sets_are_scoped_filtered_and_newest_first() {
        let store = store();
        let a = UserId("a".into());
        let b = UserId("b".into());
        let falcon = store
            .insert_set(&a, set_draft("75192", "Millennium Falcon", SetStatus::Owned))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let titanic = store
            .insert_set(&a, set_draft("10294", "Titanic", SetStatus::Building))
            .unwrap();
        store
            .insert_set(&b, set_draft("10307", "Eiffel Tower", SetStatus::Wanted))
            .unwrap();

        let all = store.sets_for(&a, None).unwrap();
        assert_eq!(
            all.iter().map(|s| s.id.clone()).collect::<Vec<_>>(),
            vec![titanic.id.clone(), falcon.id.clone()]
        );
        let building = store.sets_for(&a, Some(SetStatus::Building)).unwrap();
        assert_eq!(building.len(), 1);
        assert_eq!(building[0].id, titanic.id);

        // row-level authorization: b cannot touch a's sets
        let err = store
            .update_set(&b, &falcon.id, set_draft("75192", "Falcon", SetStatus::Owned))
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        let err = store.delete_set(&b, &falcon.id).unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        store.delete_set(&a, &falcon.id).unwrap();
    }

    #[test]
    fn verification_gates_the_account() {
        let store = store();
        let (account, token) = store.create_account("ole@example.com", "bricks123").unwrap();
        assert!(!account.verified);
        assert!(account.password_matches("bricks123"));
        assert!(!account.password_matches("studs456"));
        let err = store.create_account("OLE@example.com", "other").unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        store.verify(&token).unwrap();
        let account = store.account_by_email("ole@example.com").unwrap().unwrap();
        assert!(account.verified);
        // tokens are single-use
        assert!(matches!(
            store.verify(&token).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
