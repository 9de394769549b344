use axum::extract::{Extension, Path, Query};
use axum::Json;
use bricklog_common::wire::ProfileDraft;
use bricklog_common::{Profile, UserId};
use serde::Deserialize;

use crate::{ApiError, AppState, AuthedUser, Result};

/// Candidate-friend search never returns more than a page of results.
const SEARCH_LIMIT: usize = 20;

pub async fn me(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
) -> Result<Json<Option<Profile>>> {
    Ok(Json(state.store.profile(&account.id)?))
}

/// The username pattern is the client's job; uniqueness is enforced here.
pub async fn save(
    AuthedUser(account): AuthedUser,
    Extension(state): Extension<AppState>,
    Json(draft): Json<ProfileDraft>,
) -> Result<Json<Profile>> {
    Ok(Json(state.store.upsert_profile(&account.id, draft)?))
}

pub async fn by_id(
    AuthedUser(_): AuthedUser,
    Extension(state): Extension<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>> {
    state
        .store
        .profile(&UserId(user_id))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("profile not found".into()))
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub async fn search(
    AuthedUser(_): AuthedUser,
    Extension(state): Extension<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Profile>>> {
    let q = params.q.unwrap_or_default();
    Ok(Json(state.store.search_profiles(q.trim(), SEARCH_LIMIT)?))
}
