//! Server-rendered frontend. Every handler follows the same shape: resolve
//! the session from the `sid` cookie (or bounce to the login page), call
//! the API, hand the records to `render`, and carry transient notices
//! across redirects as `notice`/`kind` query parameters.

mod render;

use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;

use axum::extract::{Extension, Form, Path, Query};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use bricklog_client::session::{check_auth, Gate};
use bricklog_client::{client, filter_sets, friend_action};
use bricklog_common::wire::{Credentials, ErrorCode, ProfileDraft, SetDraft};
use bricklog_common::{FriendshipId, LegoSet, Profile, RequestId, SetId, SetStatus, User, UserId};
use serde::Deserialize;

const SESSION_COOKIE: &str = "sid";

#[derive(Clone)]
struct WebState {
    http: reqwest::Client,
    api: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let mut port = 3000;
    if let Some(p) = env::args().nth(1) {
        port = p.parse()?;
    }
    let api = env::var("BRICKLOG_API").unwrap_or_else(|_| String::from("http://127.0.0.1:8000"));
    let state = WebState {
        http: reqwest::Client::new(),
        api,
    };
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("serving pages on {addr}, api at {}", state.api);
    axum::Server::bind(&addr)
        .serve(app(state).into_make_service())
        .await?;
    Ok(())
}

fn app(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/auth", post(auth_submit))
        .route("/logout", get(logout))
        .route("/collection", get(collection))
        .route("/sets", post(set_submit))
        .route("/sets/edit", post(set_edit))
        .route("/sets/:id/delete", post(set_delete))
        .route("/profile", get(profile_page).post(profile_submit))
        .route("/friends", get(friends_page))
        .route("/friends/:id/remove", post(friend_remove))
        .route("/requests", post(send_request))
        .route("/requests/:id/accept", post(request_accept))
        .route("/requests/:id/decline", post(request_decline))
        .route("/find-friends", get(find_friends))
        .route("/friend-collection", get(friend_collection))
        .layer(Extension(state))
}

/// The grab-bag of query parameters the pages use; every field is optional
/// so one struct serves them all.
#[derive(Deserialize, Default)]
struct PageParams {
    notice: Option<String>,
    kind: Option<String>,
    status: Option<String>,
    q: Option<String>,
    confirm_delete: Option<String>,
    confirm_remove: Option<String>,
    id: Option<String>,
    name: Option<String>,
    mode: Option<String>,
}

fn toast_from(params: &PageParams, success_ms: u32, other_ms: u32) -> String {
    match &params.notice {
        Some(message) => {
            let kind = params.kind.as_deref().unwrap_or("info");
            let ms = if kind == "success" { success_ms } else { other_ms };
            render::toast(message, kind, ms)
        }
        None => String::new(),
    }
}

fn notify(path: &str, message: &str, kind: &str) -> Redirect {
    let sep = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!(
        "{path}{sep}notice={}&kind={kind}",
        urlencoding::encode(message)
    ))
}

/// The auth gate every page runs first. `None` means redirect to login and
/// do nothing else.
async fn gate(state: &WebState, jar: &CookieJar) -> Option<(String, User)> {
    let token = jar.get(SESSION_COOKIE)?.value().to_string();
    match check_auth(&state.http, &state.api, Some(&token)).await {
        Gate::SignedIn(user) => Some((token, user)),
        Gate::RedirectToLogin => None,
    }
}

/// `@username` when a profile exists, the raw email otherwise.
async fn display_name(state: &WebState, token: &str, user: &User) -> String {
    match client::load_profile(&state.http, &state.api, token).await {
        Ok(Some(profile)) => format!("@{}", profile.username),
        _ => user.email.clone(),
    }
}

/// Decorates rows with their counterpart's profile, one fetch per row.
async fn with_profiles<T>(
    state: &WebState,
    token: &str,
    items: Vec<T>,
    pick: impl Fn(&T) -> &UserId,
) -> Vec<(T, Option<Profile>)> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let profile = client::profile(&state.http, &state.api, token, pick(&item))
            .await
            .ok();
        out.push((item, profile));
    }
    out
}

fn none_if_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// -- auth -------------------------------------------------------------------

async fn index(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Query(params): Query<PageParams>,
) -> Response {
    if gate(&state, &jar).await.is_some() {
        return Redirect::to("/collection").into_response();
    }
    let signup = params.mode.as_deref() == Some("signup");
    let title = if signup { "Sign Up" } else { "Login" };
    let body = render::login_page(signup);
    Html(render::page(title, None, &body, &toast_from(&params, 4000, 4000))).into_response()
}

#[derive(Deserialize)]
struct AuthForm {
    mode: String,
    email: String,
    password: String,
}

async fn auth_submit(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Form(form): Form<AuthForm>,
) -> Response {
    let creds = Credentials {
        email: form.email,
        password: form.password,
    };
    if form.mode == "signup" {
        return match client::sign_up(&state.http, &state.api, &creds).await {
            Ok(_) => notify(
                "/?mode=login",
                "Account created! Please check your email to verify.",
                "success",
            )
            .into_response(),
            Err(err) => notify("/?mode=signup", &err.to_string(), "error").into_response(),
        };
    }
    match client::sign_in(&state.http, &state.api, &creds).await {
        Ok(info) => {
            let jar = jar.add(Cookie::new(SESSION_COOKIE, info.token));
            (jar, Redirect::to("/collection")).into_response()
        }
        Err(err) => notify("/", &err.to_string(), "error").into_response(),
    }
}

async fn logout(Extension(state): Extension<WebState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let _ = client::sign_out(&state.http, &state.api, cookie.value()).await;
    }
    let jar = jar.remove(Cookie::named(SESSION_COOKIE));
    (jar, Redirect::to("/")).into_response()
}

// -- collection -------------------------------------------------------------

async fn collection(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Query(params): Query<PageParams>,
) -> Response {
    let Some((token, user)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    let who = display_name(&state, &token, &user).await;
    let status = params.status.as_deref().and_then(SetStatus::parse);
    let query = params.q.clone().unwrap_or_default();
    let mut toast_html = toast_from(&params, 4000, 4000);
    let sets = match client::load_sets(&state.http, &state.api, &token, status).await {
        Ok(sets) => filter_sets(sets, &query),
        Err(err) => {
            toast_html = render::toast(&err.to_string(), "error", 4000);
            Vec::new()
        }
    };
    let mut body = String::from("<h1>My Collection</h1>");
    body.push_str(&render::set_form(None));
    body.push_str(&render::filter_bar("/collection", status, &query, ""));
    body.push_str(&render::sets_grid(
        &sets,
        true,
        "Start building your collection by adding your first set above",
    ));
    if let Some(id) = &params.confirm_delete {
        body.push_str(&render::confirm_dialog(
            "Are you sure you want to delete this set?",
            &format!("/sets/{id}/delete"),
            "/collection",
        ));
    }
    Html(render::page("My Collection", Some(&who), &body, &toast_html)).into_response()
}

#[derive(Deserialize)]
struct SetForm {
    editing_id: String,
    set_number: String,
    name: String,
    theme: String,
    #[serde(default)]
    year: String,
    #[serde(default)]
    piece_count: String,
    #[serde(default)]
    image_url: String,
    status: String,
    #[serde(default)]
    notes: String,
}

fn draft_from(form: &SetForm) -> SetDraft {
    SetDraft {
        set_number: form.set_number.trim().to_string(),
        name: form.name.trim().to_string(),
        theme: form.theme.trim().to_string(),
        year: form.year.trim().parse().ok(),
        piece_count: form.piece_count.trim().parse().ok(),
        image_url: none_if_empty(&form.image_url),
        status: SetStatus::parse(&form.status).unwrap_or(SetStatus::Owned),
        notes: none_if_empty(&form.notes),
    }
}

async fn set_submit(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Form(form): Form<SetForm>,
) -> Response {
    let Some((token, _)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    let draft = draft_from(&form);
    let result = if form.editing_id.is_empty() {
        client::add_set(&state.http, &state.api, &token, &draft)
            .await
            .map(|_| "Set added successfully!")
    } else {
        client::update_set(
            &state.http,
            &state.api,
            &token,
            &SetId(form.editing_id.clone()),
            &draft,
        )
        .await
        .map(|_| "Set updated successfully!")
    };
    match result {
        Ok(message) => notify("/collection", message, "success").into_response(),
        Err(err) => notify("/collection", &err.to_string(), "error").into_response(),
    }
}

#[derive(Deserialize)]
struct EditForm {
    record: String,
}

/// Edit round-trips on the record embedded in the card, not on a refetch.
async fn set_edit(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Form(form): Form<EditForm>,
) -> Response {
    let Some((token, user)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    let Ok(set) = serde_json::from_str::<LegoSet>(&form.record) else {
        return notify("/collection", "Could not read the set to edit", "error").into_response();
    };
    let who = display_name(&state, &token, &user).await;
    let sets = client::load_sets(&state.http, &state.api, &token, None)
        .await
        .unwrap_or_default();
    let mut body = String::from("<h1>My Collection</h1>");
    body.push_str(&render::set_form(Some(&set)));
    body.push_str(&render::filter_bar("/collection", None, "", ""));
    body.push_str(&render::sets_grid(
        &sets,
        true,
        "Start building your collection by adding your first set above",
    ));
    Html(render::page("My Collection", Some(&who), &body, "")).into_response()
}

async fn set_delete(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let Some((token, _)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    match client::delete_set(&state.http, &state.api, &token, &SetId(id)).await {
        Ok(()) => notify("/collection", "Set deleted successfully!", "success").into_response(),
        Err(err) => notify("/collection", &err.to_string(), "error").into_response(),
    }
}

// -- profile ----------------------------------------------------------------

async fn profile_page(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Query(params): Query<PageParams>,
) -> Response {
    let Some((token, user)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    // success toasts linger longer on this page
    let mut toast_html = toast_from(&params, 6000, 5000);
    let profile = match client::load_profile(&state.http, &state.api, &token).await {
        Ok(profile) => profile,
        Err(err) => {
            toast_html = render::toast(&err.to_string(), "error", 5000);
            None
        }
    };
    let who = profile
        .as_ref()
        .map(|p| format!("@{}", p.username))
        .unwrap_or_else(|| user.email.clone());
    let mut body = String::from("<h1>My Profile</h1>");
    body.push_str(&render::profile_form(profile.as_ref(), &user.email));
    Html(render::page("My Profile", Some(&who), &body, &toast_html)).into_response()
}

#[derive(Deserialize)]
struct ProfileForm {
    username: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    avatar_url: String,
}

async fn profile_submit(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Form(form): Form<ProfileForm>,
) -> Response {
    let Some((token, _)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    let draft = ProfileDraft {
        username: form.username.trim().to_string(),
        bio: none_if_empty(&form.bio),
        avatar_url: none_if_empty(&form.avatar_url),
    };
    match client::save_profile(&state.http, &state.api, &token, &draft).await {
        Ok(_) => notify("/profile", "Profile saved successfully!", "success").into_response(),
        Err(err) if err.is_unique_violation() => notify(
            "/profile",
            "Username already taken. Please choose another.",
            "error",
        )
        .into_response(),
        Err(err) => notify("/profile", &err.to_string(), "error").into_response(),
    }
}

// -- friends ----------------------------------------------------------------

async fn friends_page(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Query(params): Query<PageParams>,
) -> Response {
    let Some((token, user)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    let who = display_name(&state, &token, &user).await;
    let mut toast_html = toast_from(&params, 4000, 4000);
    let requests = match client::pending_requests(&state.http, &state.api, &token).await {
        Ok(requests) => with_profiles(&state, &token, requests, |r| &r.sender_id).await,
        Err(err) => {
            toast_html = render::toast(&err.to_string(), "error", 4000);
            Vec::new()
        }
    };
    let edges = match client::friends(&state.http, &state.api, &token).await {
        Ok(edges) => with_profiles(&state, &token, edges, |f| &f.friend_id).await,
        Err(err) => {
            toast_html = render::toast(&err.to_string(), "error", 4000);
            Vec::new()
        }
    };
    let mut body = String::from("<h1>Friends</h1><h2>Friend Requests</h2>");
    body.push_str(&render::requests_list(&requests));
    body.push_str("<h2>My Friends</h2>");
    body.push_str(&render::friends_list(&edges));
    if let Some(id) = &params.confirm_remove {
        let name = params.name.as_deref().unwrap_or("this friend");
        body.push_str(&render::confirm_dialog(
            &format!("Remove @{name} from your friends?"),
            &format!("/friends/{id}/remove"),
            "/friends",
        ));
    }
    Html(render::page("Friends", Some(&who), &body, &toast_html)).into_response()
}

async fn request_accept(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let Some((token, _)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    match client::accept_request(&state.http, &state.api, &token, &RequestId(id)).await {
        Ok(()) => notify("/friends", "Friend request accepted!", "success").into_response(),
        Err(err) => notify("/friends", &err.to_string(), "error").into_response(),
    }
}

async fn request_decline(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let Some((token, _)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    match client::decline_request(&state.http, &state.api, &token, &RequestId(id)).await {
        Ok(()) => notify("/friends", "Friend request declined", "info").into_response(),
        Err(err) => notify("/friends", &err.to_string(), "error").into_response(),
    }
}

async fn friend_remove(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let Some((token, _)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    match client::remove_friend(&state.http, &state.api, &token, &FriendshipId(id)).await {
        Ok(()) => notify("/friends", "Friend removed", "info").into_response(),
        Err(err) => notify("/friends", &err.to_string(), "error").into_response(),
    }
}

// -- find friends -----------------------------------------------------------

async fn find_friends(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Query(params): Query<PageParams>,
) -> Response {
    let Some((token, user)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    let own_profile = client::load_profile(&state.http, &state.api, &token)
        .await
        .ok()
        .flatten();
    let who = own_profile
        .as_ref()
        .map(|p| format!("@{}", p.username))
        .unwrap_or_else(|| user.email.clone());
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let mut toast_html = toast_from(&params, 4000, 4000);
    let mut body = String::from("<h1>Find Friends</h1>");
    body.push_str(&render::user_search_bar(&query));

    if !query.is_empty() && own_profile.is_none() {
        toast_html = render::toast("Please set up your username first", "error", 4000);
        body.push_str(&render::search_placeholder());
        return Html(render::page("Find Friends", Some(&who), &body, &toast_html))
            .into_response();
    }

    match search_panel(&state, &token, &user, &query).await {
        Ok(html) => body.push_str(&html),
        Err(err) => {
            toast_html = render::toast(&err.to_string(), "error", 4000);
            body.push_str(&render::search_results(&[], &query));
        }
    }
    Html(render::page("Find Friends", Some(&who), &body, &toast_html)).into_response()
}

/// The results half of the page. An empty query renders the placeholder
/// without touching the network.
async fn search_panel(
    state: &WebState,
    token: &str,
    user: &User,
    query: &str,
) -> bricklog_client::Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(render::search_placeholder());
    }
    let results = search_results_for(state, token, user, query).await?;
    Ok(render::search_results(&results, query))
}

/// Search, drop self, then cross-reference friendships and outstanding sent
/// requests to pick each candidate's button.
async fn search_results_for(
    state: &WebState,
    token: &str,
    user: &User,
    query: &str,
) -> bricklog_client::Result<Vec<(Profile, bricklog_client::FriendAction)>> {
    let found = client::search_users(&state.http, &state.api, token, query).await?;
    let candidates: Vec<Profile> = found.into_iter().filter(|p| p.id != user.id).collect();
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let friends: HashSet<UserId> = client::friends(&state.http, &state.api, token)
        .await?
        .into_iter()
        .map(|f| f.friend_id)
        .collect();
    let pending: HashSet<UserId> = client::sent_requests(&state.http, &state.api, token)
        .await?
        .into_iter()
        .map(|r| r.receiver_id)
        .collect();
    Ok(candidates
        .into_iter()
        .map(|p| {
            let action = friend_action(&p.id, &friends, &pending);
            (p, action)
        })
        .collect())
}

#[derive(Deserialize)]
struct SendForm {
    receiver_id: String,
    username: String,
    #[serde(default)]
    q: String,
}

async fn send_request(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Form(form): Form<SendForm>,
) -> Response {
    let Some((token, _)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    let back = format!("/find-friends?q={}", urlencoding::encode(&form.q));
    let receiver = UserId(form.receiver_id);
    match client::send_friend_request(&state.http, &state.api, &token, &receiver).await {
        Ok(_) => notify(
            &back,
            &format!("Friend request sent to @{}!", form.username),
            "success",
        )
        .into_response(),
        Err(err) if err.is_unique_violation() => {
            notify(&back, "Friend request already sent", "error").into_response()
        }
        Err(err) => notify(&back, &err.to_string(), "error").into_response(),
    }
}

// -- friend collection ------------------------------------------------------

async fn friend_collection(
    Extension(state): Extension<WebState>,
    jar: CookieJar,
    Query(params): Query<PageParams>,
) -> Response {
    let Some((token, user)) = gate(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };
    // the viewed friend rides in on the query string
    let Some(id) = params.id.clone() else {
        return Redirect::to("/friends").into_response();
    };
    let name = params.name.clone().unwrap_or_else(|| "friend".to_string());
    let who = display_name(&state, &token, &user).await;
    let status = params.status.as_deref().and_then(SetStatus::parse);
    let query = params.q.clone().unwrap_or_default();
    let friend = UserId(id.clone());
    let mut toast_html = toast_from(&params, 4000, 4000);
    let sets = match client::friend_sets(&state.http, &state.api, &token, &friend, status).await {
        Ok(sets) => filter_sets(sets, &query),
        Err(err) if err.code() == Some(ErrorCode::Forbidden) => {
            return notify("/friends", "You are not friends with this user", "error")
                .into_response();
        }
        Err(err) => {
            toast_html = render::toast(&err.to_string(), "error", 4000);
            Vec::new()
        }
    };
    let title = format!("@{name}'s Collection");
    let mut body = format!("<h1 id=\"friendName\">{}</h1>", render::escape(&title));
    let hidden = format!(
        "{}{}",
        render::hidden_input("id", &id),
        render::hidden_input("name", &name)
    );
    body.push_str(&render::filter_bar("/friend-collection", status, &query, &hidden));
    body.push_str(&render::sets_grid(
        &sets,
        false,
        &format!("@{name} hasn't added any sets yet"),
    ));
    Html(render::page(&title, Some(&who), &body, &toast_html)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bricklog_client::ClientError;

    // any request against this base surfaces as an Http error
    fn unroutable() -> WebState {
        WebState {
            http: reqwest::Client::new(),
            api: "http://127.0.0.1:9".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_search_query_never_reaches_the_network() {
        let state = unroutable();
        let user = User {
            id: UserId("u1".into()),
            email: "alice@example.com".into(),
        };
        for query in ["", "   "] {
            let html = search_panel(&state, "token", &user, query).await.unwrap();
            assert!(html.contains("Enter a username to search"));
        }
        let err = search_panel(&state, "token", &user, "brick")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
    }
}
