//! Request/response payloads and the error body shared between server and
//! client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{SetStatus, User, UserId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// There is no mailer wired up, so sign-up hands the verification token back
/// in the receipt (it is also logged server-side).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignUpReceipt {
    pub user_id: UserId,
    pub verification_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub token: String,
    pub user: User,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ProfileDraft {
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetDraft {
    pub set_number: String,
    pub name: String,
    pub theme: String,
    pub year: Option<i32>,
    pub piece_count: Option<u32>,
    pub image_url: Option<String>,
    pub status: SetStatus,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendRequest {
    pub receiver_id: UserId,
}

/// Machine-readable half of an error response. `UniqueViolation` is the one
/// code callers special-case per table, everything else is shown verbatim.
#[derive(Eq, PartialEq, Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UniqueViolation,
    Invalid,
    Unauthorized,
    Forbidden,
    NotFound,
    Internal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
