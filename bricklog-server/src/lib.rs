pub mod auth;
pub mod friends;
pub mod profiles;
pub mod sets;
pub mod store;

use async_trait::async_trait;
use axum::extract::{Extension, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use bricklog_common::wire::{ErrorBody, ErrorCode};

use crate::store::{Account, Store, StoreError};

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Invalid(String),
    #[error("not signed in")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn code(&self) -> ErrorCode {
        match self {
            ApiError::Invalid(_) => ErrorCode::Invalid,
            ApiError::Unauthorized => ErrorCode::Unauthorized,
            ApiError::Forbidden(_) => ErrorCode::Forbidden,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Conflict(_) => ErrorCode::UniqueViolation,
            ApiError::Internal(_) => ErrorCode::Internal,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Tell axum how to convert `ApiError` into a response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            tracing::error!("request failed: {err:#}");
        }
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(msg) => ApiError::Conflict(msg.to_string()),
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::Forbidden(msg) => ApiError::Forbidden(msg.to_string()),
            StoreError::Sled(e) => ApiError::Internal(e.into()),
            StoreError::Serde(e) => ApiError::Internal(e.into()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
}

impl AppState {
    pub fn new(db: &sled::Db) -> anyhow::Result<Self> {
        Ok(Self {
            store: Store::open(db)?,
        })
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// The resolved session, required by every endpoint past the auth gate.
pub struct AuthedUser(pub Account);

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Extension(app) = Extension::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("app state missing: {e}")))?;
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let account = app
            .store
            .session_account(token)?
            .ok_or(ApiError::Unauthorized)?;
        Ok(AuthedUser(account))
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/auth/sign-up", post(auth::sign_up))
        .route("/auth/verify/:token", get(auth::verify))
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/auth/session", get(auth::session))
        .route("/auth/sign-out", post(auth::sign_out))
        .route("/profiles/me", get(profiles::me).put(profiles::save))
        .route("/profiles/search", get(profiles::search))
        .route("/profiles/:user_id", get(profiles::by_id))
        .route("/sets", get(sets::list).post(sets::create))
        .route("/sets/:id", put(sets::update).delete(sets::remove))
        .route("/users/:user_id/sets", get(sets::friend_sets))
        .route("/requests", get(friends::pending_received).post(friends::send))
        .route("/requests/sent", get(friends::pending_sent))
        .route("/requests/:id/accept", post(friends::accept))
        .route("/requests/:id", delete(friends::decline))
        .route("/friends", get(friends::list))
        .route("/friends/:id", delete(friends::remove))
        .layer(Extension(state))
}

async fn root() -> &'static str {
    "bricklog api"
}
