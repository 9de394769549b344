//! Drives the API through the client crate, one story per test, against an
//! in-process server bound to an ephemeral port.

use std::net::SocketAddr;

use bricklog_client::client;
use bricklog_common::wire::{Credentials, ErrorCode, ProfileDraft, SetDraft};
use bricklog_common::{SetStatus, User};
use bricklog_server::{app, AppState};
use reqwest::Client;

async fn spawn_api() -> anyhow::Result<String> {
    let db = sled::Config::new().temporary(true).open()?;
    let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(app(AppState::new(&db)?).into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);
    Ok(format!("http://{addr}"))
}

fn creds(email: &str) -> Credentials {
    Credentials {
        email: email.to_string(),
        password: "bricks123".to_string(),
    }
}

/// Sign up, prove the unverified account cannot log in, verify, log in.
async fn register(http: &Client, base: &str, email: &str) -> anyhow::Result<(String, User)> {
    let creds = creds(email);
    let receipt = client::sign_up(http, base, &creds).await?;
    let err = client::sign_in(http, base, &creds).await.unwrap_err();
    assert_eq!(err.to_string(), "Email not confirmed");
    client::verify(http, base, &receipt.verification_token).await?;
    let info = client::sign_in(http, base, &creds).await?;
    Ok((info.token, info.user))
}

async fn claim_username(
    http: &Client,
    base: &str,
    token: &str,
    username: &str,
) -> anyhow::Result<()> {
    let draft = ProfileDraft {
        username: username.to_string(),
        ..Default::default()
    };
    client::save_profile(http, base, token, &draft).await?;
    Ok(())
}

fn draft(number: &str, name: &str, theme: &str, status: SetStatus) -> SetDraft {
    SetDraft {
        set_number: number.to_string(),
        name: name.to_string(),
        theme: theme.to_string(),
        year: Some(2020),
        piece_count: Some(500),
        image_url: None,
        status,
        notes: None,
    }
}

#[tokio::test]
async fn sign_up_verify_sign_in_sign_out() -> anyhow::Result<()> {
    let base = spawn_api().await?;
    let http = Client::new();

    let err = client::sign_up(&http, &base, &creds("not-an-email"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Invalid));

    let short = Credentials {
        email: "alice@example.com".to_string(),
        password: "abc".to_string(),
    };
    let err = client::sign_up(&http, &base, &short).await.unwrap_err();
    assert_eq!(err.to_string(), "Password should be at least 6 characters");

    let (token, user) = register(&http, &base, "alice@example.com").await?;
    assert_eq!(user.email, "alice@example.com");

    // the email column is unique
    let err = client::sign_up(&http, &base, &creds("alice@example.com"))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    // wrong password is indistinguishable from an unknown email
    let mut wrong = creds("alice@example.com");
    wrong.password = "not-the-password".to_string();
    let err = client::sign_in(&http, &base, &wrong).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid login credentials");

    let me = client::session(&http, &base, &token).await?;
    assert_eq!(me.id, user.id);

    client::sign_out(&http, &base, &token).await?;
    let err = client::session(&http, &base, &token).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Unauthorized));
    Ok(())
}

#[tokio::test]
async fn usernames_are_unique_and_searchable() -> anyhow::Result<()> {
    let base = spawn_api().await?;
    let http = Client::new();
    let (alice, _) = register(&http, &base, "alice@example.com").await?;
    let (bob, _) = register(&http, &base, "bob@example.com").await?;

    assert!(client::load_profile(&http, &base, &alice).await?.is_none());
    claim_username(&http, &base, &alice, "brickmaster").await?;

    let err = client::save_profile(
        &http,
        &base,
        &bob,
        &ProfileDraft {
            username: "brickmaster".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(err.is_unique_violation());

    claim_username(&http, &base, &bob, "brickfan").await?;

    // substring match, and renaming frees the old name
    let found = client::search_users(&http, &base, &bob, "brick").await?;
    assert_eq!(found.len(), 2);
    claim_username(&http, &base, &alice, "studcollector").await?;
    claim_username(&http, &base, &bob, "brickmaster").await?;
    let found = client::search_users(&http, &base, &alice, "brickmaster").await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "brickmaster");
    Ok(())
}

#[tokio::test]
async fn sets_are_scoped_filtered_and_owner_guarded() -> anyhow::Result<()> {
    let base = spawn_api().await?;
    let http = Client::new();
    let (alice, _) = register(&http, &base, "alice@example.com").await?;
    let (bob, _) = register(&http, &base, "bob@example.com").await?;

    let falcon = client::add_set(
        &http,
        &base,
        &alice,
        &draft("75192", "Millennium Falcon", "Star Wars", SetStatus::Owned),
    )
    .await?;
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    client::add_set(
        &http,
        &base,
        &alice,
        &draft("10294", "Titanic", "Icons", SetStatus::Building),
    )
    .await?;
    client::add_set(
        &http,
        &base,
        &bob,
        &draft("21330", "Home Alone", "Ideas", SetStatus::Owned),
    )
    .await?;

    // each user sees only their own rows, newest first
    let mine = client::load_sets(&http, &base, &alice, None).await?;
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].set_number, "10294");
    let owned = client::load_sets(&http, &base, &alice, Some(SetStatus::Owned)).await?;
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].set_number, "75192");

    // bob can neither update nor delete alice's set
    let err = client::update_set(
        &http,
        &base,
        &bob,
        &falcon.id,
        &draft("75192", "Stolen Falcon", "Star Wars", SetStatus::Wanted),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Forbidden));
    let err = client::delete_set(&http, &base, &bob, &falcon.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Forbidden));

    let updated = client::update_set(
        &http,
        &base,
        &alice,
        &falcon.id,
        &draft("75192", "Millennium Falcon", "Star Wars", SetStatus::Building),
    )
    .await?;
    assert_eq!(updated.status, SetStatus::Building);
    client::delete_set(&http, &base, &alice, &falcon.id).await?;
    assert_eq!(client::load_sets(&http, &base, &alice, None).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn friend_workflow_end_to_end() -> anyhow::Result<()> {
    let base = spawn_api().await?;
    let http = Client::new();
    let (alice, alice_user) = register(&http, &base, "alice@example.com").await?;
    let (bob, bob_user) = register(&http, &base, "bob@example.com").await?;
    let (carol, carol_user) = register(&http, &base, "carol@example.com").await?;
    claim_username(&http, &base, &alice, "brickmaster").await?;
    claim_username(&http, &base, &bob, "brickfan").await?;
    claim_username(&http, &base, &carol, "studcollector").await?;

    let err = client::send_friend_request(&http, &base, &alice, &alice_user.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "You cannot add yourself");

    let request = client::send_friend_request(&http, &base, &alice, &bob_user.id).await?;
    let err = client::send_friend_request(&http, &base, &alice, &bob_user.id)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    // visible to the sender as sent, to the receiver as pending
    let sent = client::sent_requests(&http, &base, &alice).await?;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].receiver_id, bob_user.id);
    let pending = client::pending_requests(&http, &base, &bob).await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].sender_id, alice_user.id);

    // only the receiver can accept
    let err = client::accept_request(&http, &base, &alice, &request.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Forbidden));
    client::accept_request(&http, &base, &bob, &request.id).await?;

    // acceptance creates the edge on both sides
    let alice_friends = client::friends(&http, &base, &alice).await?;
    assert_eq!(alice_friends.len(), 1);
    assert_eq!(alice_friends[0].friend_id, bob_user.id);
    let bob_friends = client::friends(&http, &base, &bob).await?;
    assert_eq!(bob_friends[0].friend_id, alice_user.id);
    assert!(client::pending_requests(&http, &base, &bob).await?.is_empty());

    // a friend's collection opens, a stranger's stays forbidden
    client::add_set(
        &http,
        &base,
        &bob,
        &draft("21330", "Home Alone", "Ideas", SetStatus::Owned),
    )
    .await?;
    let visible = client::friend_sets(&http, &base, &alice, &bob_user.id, None).await?;
    assert_eq!(visible.len(), 1);
    let err = client::friend_sets(&http, &base, &carol, &bob_user.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "You are not friends with this user");

    // declining removes the request and frees the pair for a retry
    let request = client::send_friend_request(&http, &base, &carol, &alice_user.id).await?;
    client::decline_request(&http, &base, &alice, &request.id).await?;
    assert!(client::pending_requests(&http, &base, &alice).await?.is_empty());
    client::send_friend_request(&http, &base, &carol, &alice_user.id).await?;

    // removal is one-sided; the accepted request keeps the pair claimed
    client::remove_friend(&http, &base, &alice, &alice_friends[0].id).await?;
    assert!(client::friends(&http, &base, &alice).await?.is_empty());
    assert_eq!(client::friends(&http, &base, &bob).await?.len(), 1);
    let err = client::friend_sets(&http, &base, &alice, &bob_user.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Forbidden));
    let err = client::send_friend_request(&http, &base, &alice, &bob_user.id)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());
    Ok(())
}
