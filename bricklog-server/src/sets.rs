use axum::extract::{Extension, Path, Query};
use axum::Json;
use bricklog_common::wire::SetDraft;
use bricklog_common::{LegoSet, SetId, SetStatus, UserId};
use serde::Deserialize;

use crate::{ApiError, AppState, AuthedUser, Result};

#[derive(Deserialize)]
pub struct SetQuery {
    pub status: Option<SetStatus>,
}

pub async fn list(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Query(query): Query<SetQuery>,
) -> Result<Json<Vec<LegoSet>>> {
    Ok(Json(state.store.sets_for(&account.id, query.status)?))
}

pub async fn create(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Json(draft): Json<SetDraft>,
) -> Result<Json<LegoSet>> {
    Ok(Json(state.store.insert_set(&account.id, draft)?))
}

pub async fn update(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<SetDraft>,
) -> Result<Json<LegoSet>> {
    Ok(Json(state.store.update_set(&account.id, &SetId(id), draft)?))
}

pub async fn remove(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<()> {
    state.store.delete_set(&account.id, &SetId(id))?;
    Ok(())
}

/// Another user's collection is visible only across a friendship edge held
/// by the caller.
pub async fn friend_sets(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<SetQuery>,
) -> Result<Json<Vec<LegoSet>>> {
    let friend = UserId(user_id);
    if !state.store.are_friends(&account.id, &friend)? {
        return Err(ApiError::Forbidden(
            "You are not friends with this user".into(),
        ));
    }
    Ok(Json(state.store.sets_for(&friend, query.status)?))
}
