use axum::extract::{Extension, Path};
use axum::Json;
use bricklog_common::wire::SendRequest;
use bricklog_common::{FriendRequest, Friendship, FriendshipId, RequestId};

use crate::{ApiError, AppState, AuthedUser, Result};

pub async fn send(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Json(body): Json<SendRequest>,
) -> Result<Json<FriendRequest>> {
    if body.receiver_id == account.id {
        return Err(ApiError::Invalid("You cannot add yourself".into()));
    }
    // the receiver must have set up a profile to be findable at all
    state
        .store
        .profile(&body.receiver_id)?
        .ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
    let request = state.store.create_request(&account.id, &body.receiver_id)?;
    tracing::info!(from = %account.id.0, to = %body.receiver_id.0, "friend request sent");
    Ok(Json(request))
}

pub async fn pending_received(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<FriendRequest>>> {
    Ok(Json(state.store.pending_received(&account.id)?))
}

pub async fn pending_sent(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<FriendRequest>>> {
    Ok(Json(state.store.pending_sent(&account.id)?))
}

pub async fn accept(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<()> {
    state.store.accept_request(&account.id, &RequestId(id))?;
    Ok(())
}

pub async fn decline(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<()> {
    state.store.decline_request(&account.id, &RequestId(id))?;
    Ok(())
}

pub async fn list(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<Friendship>>> {
    Ok(Json(state.store.friendships_for(&account.id)?))
}

pub async fn remove(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<()> {
    state
        .store
        .delete_friendship(&account.id, &FriendshipId(id))?;
    Ok(())
}
