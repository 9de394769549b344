//! One free function per endpoint, in dependency order: auth, profiles,
//! sets, friends. Every function takes the shared [`reqwest::Client`] and
//! the API base URL; authenticated calls also take the session token.

use bricklog_common::wire::{
    Credentials, ErrorBody, ErrorCode, ProfileDraft, SendRequest, SessionInfo, SetDraft,
    SignUpReceipt,
};
use bricklog_common::{
    FriendRequest, Friendship, FriendshipId, LegoSet, Profile, RequestId, SetId, SetStatus, User,
    UserId,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::{validate_username, ClientError, Result, USERNAME_RULES};

async fn error_body(resp: Response) -> ClientError {
    let status = resp.status();
    let body = resp.json::<ErrorBody>().await.unwrap_or_else(|_| ErrorBody {
        code: ErrorCode::Internal,
        message: format!("request failed with status {status}"),
    });
    ClientError::Api(body)
}

async fn take<T: DeserializeOwned>(resp: Response) -> Result<T> {
    if resp.status().is_success() {
        return Ok(resp.json().await?);
    }
    Err(error_body(resp).await)
}

async fn done(resp: Response) -> Result<()> {
    if resp.status().is_success() {
        return Ok(());
    }
    Err(error_body(resp).await)
}

// -- auth -------------------------------------------------------------------

pub async fn sign_up(client: &Client, base: &str, creds: &Credentials) -> Result<SignUpReceipt> {
    take(client
        .post(format!("{base}/auth/sign-up"))
        .json(creds)
        .send()
        .await?)
    .await
}

pub async fn verify(client: &Client, base: &str, token: &str) -> Result<()> {
    done(client
        .get(format!("{base}/auth/verify/{token}"))
        .send()
        .await?)
    .await
}

pub async fn sign_in(client: &Client, base: &str, creds: &Credentials) -> Result<SessionInfo> {
    take(client
        .post(format!("{base}/auth/sign-in"))
        .json(creds)
        .send()
        .await?)
    .await
}

pub async fn session(client: &Client, base: &str, token: &str) -> Result<User> {
    take(client
        .get(format!("{base}/auth/session"))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

pub async fn sign_out(client: &Client, base: &str, token: &str) -> Result<()> {
    done(client
        .post(format!("{base}/auth/sign-out"))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

// -- profiles ---------------------------------------------------------------

pub async fn load_profile(client: &Client, base: &str, token: &str) -> Result<Option<Profile>> {
    take(client
        .get(format!("{base}/profiles/me"))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

/// Validates the username pattern before any network traffic; a violating
/// draft returns [`ClientError::Validation`] without touching the wire.
pub async fn save_profile(
    client: &Client,
    base: &str,
    token: &str,
    draft: &ProfileDraft,
) -> Result<Profile> {
    if !validate_username(&draft.username) {
        return Err(ClientError::Validation(USERNAME_RULES.to_string()));
    }
    take(client
        .put(format!("{base}/profiles/me"))
        .bearer_auth(token)
        .json(draft)
        .send()
        .await?)
    .await
}

pub async fn profile(client: &Client, base: &str, token: &str, user: &UserId) -> Result<Profile> {
    take(client
        .get(format!("{base}/profiles/{}", user.0))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

pub async fn search_users(
    client: &Client,
    base: &str,
    token: &str,
    query: &str,
) -> Result<Vec<Profile>> {
    take(client
        .get(format!("{base}/profiles/search"))
        .query(&[("q", query)])
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

// -- sets -------------------------------------------------------------------

pub async fn load_sets(
    client: &Client,
    base: &str,
    token: &str,
    status: Option<SetStatus>,
) -> Result<Vec<LegoSet>> {
    let mut request = client.get(format!("{base}/sets")).bearer_auth(token);
    if let Some(status) = status {
        request = request.query(&[("status", status.as_str())]);
    }
    take(request.send().await?).await
}

pub async fn add_set(client: &Client, base: &str, token: &str, draft: &SetDraft) -> Result<LegoSet> {
    take(client
        .post(format!("{base}/sets"))
        .bearer_auth(token)
        .json(draft)
        .send()
        .await?)
    .await
}

pub async fn update_set(
    client: &Client,
    base: &str,
    token: &str,
    id: &SetId,
    draft: &SetDraft,
) -> Result<LegoSet> {
    take(client
        .put(format!("{base}/sets/{}", id.0))
        .bearer_auth(token)
        .json(draft)
        .send()
        .await?)
    .await
}

pub async fn delete_set(client: &Client, base: &str, token: &str, id: &SetId) -> Result<()> {
    done(client
        .delete(format!("{base}/sets/{}", id.0))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

pub async fn friend_sets(
    client: &Client,
    base: &str,
    token: &str,
    friend: &UserId,
    status: Option<SetStatus>,
) -> Result<Vec<LegoSet>> {
    let mut request = client
        .get(format!("{base}/users/{}/sets", friend.0))
        .bearer_auth(token);
    if let Some(status) = status {
        request = request.query(&[("status", status.as_str())]);
    }
    take(request.send().await?).await
}

// -- friends ----------------------------------------------------------------

pub async fn send_friend_request(
    client: &Client,
    base: &str,
    token: &str,
    receiver: &UserId,
) -> Result<FriendRequest> {
    take(client
        .post(format!("{base}/requests"))
        .bearer_auth(token)
        .json(&SendRequest {
            receiver_id: receiver.clone(),
        })
        .send()
        .await?)
    .await
}

pub async fn pending_requests(
    client: &Client,
    base: &str,
    token: &str,
) -> Result<Vec<FriendRequest>> {
    take(client
        .get(format!("{base}/requests"))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

pub async fn sent_requests(client: &Client, base: &str, token: &str) -> Result<Vec<FriendRequest>> {
    take(client
        .get(format!("{base}/requests/sent"))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

pub async fn accept_request(client: &Client, base: &str, token: &str, id: &RequestId) -> Result<()> {
    done(client
        .post(format!("{base}/requests/{}/accept", id.0))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

pub async fn decline_request(
    client: &Client,
    base: &str,
    token: &str,
    id: &RequestId,
) -> Result<()> {
    done(client
        .delete(format!("{base}/requests/{}", id.0))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

pub async fn friends(client: &Client, base: &str, token: &str) -> Result<Vec<Friendship>> {
    take(client
        .get(format!("{base}/friends"))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}

pub async fn remove_friend(
    client: &Client,
    base: &str,
    token: &str,
    id: &FriendshipId,
) -> Result<()> {
    done(client
        .delete(format!("{base}/friends/{}", id.0))
        .bearer_auth(token)
        .send()
        .await?)
    .await
}
