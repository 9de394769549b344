//! The page-entry auth gate: resolve the stored token into a user, or tell
//! the caller to bounce to the login page. Any failure, including a missing
//! token, means redirect; no retry.

use bricklog_common::User;
use reqwest::Client;

use crate::client;

#[derive(Clone, Debug)]
pub enum Gate {
    SignedIn(User),
    RedirectToLogin,
}

pub async fn check_auth(client: &Client, base: &str, token: Option<&str>) -> Gate {
    let Some(token) = token else {
        return Gate::RedirectToLogin;
    };
    match client::session(client, base, token).await {
        Ok(user) => Gate::SignedIn(user),
        Err(_) => Gate::RedirectToLogin,
    }
}
