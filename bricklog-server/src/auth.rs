use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::Json;
use bricklog_common::wire::{Credentials, SessionInfo, SignUpReceipt};
use bricklog_common::User;

use crate::{bearer_token, ApiError, AppState, AuthedUser, Result};

/// Sign-up never establishes a session; the account must be verified first.
pub async fn sign_up(
    Extension(state): Extension<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<SignUpReceipt>> {
    let email = creds.email.trim().to_string();
    if !email.contains('@') {
        return Err(ApiError::Invalid("Enter a valid email address".into()));
    }
    if creds.password.len() < 6 {
        return Err(ApiError::Invalid(
            "Password should be at least 6 characters".into(),
        ));
    }
    let (account, token) = state.store.create_account(&email, &creds.password)?;
    // stands in for the verification email
    tracing::info!(email = %account.email, token = %token, "verification token issued");
    Ok(Json(SignUpReceipt {
        user_id: account.id,
        verification_token: token,
    }))
}

pub async fn verify(
    Extension(state): Extension<AppState>,
    Path(token): Path<String>,
) -> Result<&'static str> {
    state.store.verify(&token)?;
    Ok("Email verified. You can now log in.")
}

pub async fn sign_in(
    Extension(state): Extension<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<SessionInfo>> {
    let account = state
        .store
        .account_by_email(creds.email.trim())?
        .ok_or_else(|| ApiError::Invalid("Invalid login credentials".into()))?;
    if !account.verified {
        return Err(ApiError::Invalid("Email not confirmed".into()));
    }
    if !account.password_matches(&creds.password) {
        return Err(ApiError::Invalid("Invalid login credentials".into()));
    }
    let token = state.store.create_session(&account.id)?;
    tracing::info!(user = %account.id.0, "signed in");
    Ok(Json(SessionInfo {
        token,
        user: account.user(),
    }))
}

pub async fn session(AuthedUser(account): AuthedUser) -> Json<User> {
    Json(account.user())
}

pub async fn sign_out(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<()> {
    if let Some(token) = bearer_token(&headers) {
        state.store.delete_session(token)?;
    }
    Ok(())
}
