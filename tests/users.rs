//! Profiles and account management.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Profiles
// ===========================================================================

#[tokio::test]
async fn get_profile() {
    let app = app().await;
    let user = app.create_user("user_profile").await;

    let resp = app
        .get(&format!("/users/{}", user.id), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["username"].as_str().unwrap(), user.username);
    assert_eq!(body["followers_count"].as_i64().unwrap(), 0);
    assert_eq!(body["following_count"].as_i64().unwrap(), 0);
    assert_eq!(body["posts_count"].as_i64().unwrap(), 0);
    // The public profile never carries the email address.
    assert!(body.get("email").is_none());
}

#[tokio::test]
async fn get_profile_requires_auth() {
    let app = app().await;
    let user = app.create_user("user_profile_noauth").await;

    let resp = app.get(&format!("/users/{}", user.id), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn get_unknown_profile() {
    let app = app().await;
    let user = app.create_user("user_profile_ghost").await;

    let resp = app
        .get(
            &format!("/users/{}", Uuid::new_v4()),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_counts_are_derived() {
    let app = app().await;
    let subject = app.create_user("user_counts_subject").await;
    let fan = app.create_user("user_counts_fan").await;
    let idol = app.create_user("user_counts_idol").await;

    // fan -> subject, subject -> idol, subject posts twice.
    app.post_json(
        &format!("/users/{}/follow", subject.id),
        json!({}),
        Some(&fan.access_token),
    )
    .await;
    app.post_json(
        &format!("/users/{}/follow", idol.id),
        json!({}),
        Some(&subject.access_token),
    )
    .await;
    app.create_post_for_user(subject.id).await;
    app.create_post_for_user(subject.id).await;

    let resp = app
        .get(&format!("/users/{}", subject.id), Some(&fan.access_token))
        .await;
    let body = resp.json();
    assert_eq!(body["followers_count"].as_i64().unwrap(), 1);
    assert_eq!(body["following_count"].as_i64().unwrap(), 1);
    assert_eq!(body["posts_count"].as_i64().unwrap(), 2);
}

// ===========================================================================
// Account updates
// ===========================================================================

#[tokio::test]
async fn update_about_me_and_picture() {
    let app = app().await;
    let user = app.create_user("user_update_about").await;

    let resp = app
        .patch_json(
            "/account",
            json!({"about_me": "rustacean", "picture": "me.png"}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["about_me"].as_str().unwrap(), "rustacean");
    assert_eq!(body["picture"].as_str().unwrap(), "me.png");
    // Untouched fields keep their value.
    assert_eq!(body["username"].as_str().unwrap(), user.username);
}

#[tokio::test]
async fn update_password_rehashes() {
    let app = app().await;
    let user = app.create_user("user_update_pw").await;

    let resp = app
        .patch_json(
            "/account",
            json!({"password": "updatedpassword"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .post_json(
            "/auth/login",
            json!({"email": user.email, "password": "updatedpassword"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .post_json(
            "/auth/login",
            json!({"email": user.email, "password": DEFAULT_PASSWORD}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_username() {
    let app = app().await;
    let user = app.create_user("user_update_name").await;

    let resp = app
        .patch_json(
            "/account",
            json!({"username": "renamed_user"}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["username"].as_str().unwrap(), "renamed_user");
}

#[tokio::test]
async fn update_account_requires_confirmed() {
    let app = app().await;
    let unconfirmed = app.create_unconfirmed_user("user_update_unconf").await;

    let resp = app
        .patch_json(
            "/account",
            json!({"about_me": "nope"}),
            Some(&unconfirmed.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn update_account_validation() {
    let app = app().await;
    let user = app.create_user("user_update_val").await;

    let resp = app
        .patch_json(
            "/account",
            json!({"email": "not-an-email"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .patch_json(
            "/account",
            json!({"password": "tiny"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .patch_json(
            "/account",
            json!({"about_me": "x".repeat(601)}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}
