pub mod wire;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct UserId(pub String);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct SetId(pub String);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct RequestId(pub String);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct FriendshipId(pub String);

/// The identity the auth subsystem hands out: opaque id plus the sign-up
/// email. Everything user-editable lives in [`Profile`].
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Eq, PartialEq, Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetStatus {
    Owned,
    Building,
    Wanted,
}

impl SetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetStatus::Owned => "owned",
            SetStatus::Building => "building",
            SetStatus::Wanted => "wanted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owned" => Some(SetStatus::Owned),
            "building" => Some(SetStatus::Building),
            "wanted" => Some(SetStatus::Wanted),
            _ => None,
        }
    }
}

impl fmt::Display for SetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inventory record. Mutated only by its owner; the server enforces
/// that, not the client.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct LegoSet {
    pub id: SetId,
    pub user_id: UserId,
    pub set_number: String,
    pub name: String,
    pub theme: String,
    pub year: Option<i32>,
    pub piece_count: Option<u32>,
    pub image_url: Option<String>,
    pub status: SetStatus,
    pub notes: Option<String>,
    pub building_progress: u8,
    pub created_at: DateTime<Utc>,
}

#[derive(Eq, PartialEq, Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: RequestId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A directional friendship edge. Acceptance writes one row per direction;
/// each side deletes its own row to unfriend.
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct Friendship {
    pub id: FriendshipId,
    pub user_id: UserId,
    pub friend_id: UserId,
    pub created_at: DateTime<Utc>,
}
