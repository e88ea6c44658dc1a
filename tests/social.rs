//! Follower graph: follow/unfollow idempotency, relationship probes, and
//! neighbor listings.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Follow
// ===========================================================================

#[tokio::test]
async fn follow_user() {
    let app = app().await;
    let user_a = app.create_user("soc_follow_a").await;
    let user_b = app.create_user("soc_follow_b").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["followed"].as_bool().unwrap(), true);
}

#[tokio::test]
async fn follow_twice_leaves_exactly_one_edge() {
    let app = app().await;
    let user_a = app.create_user("soc_follow_dup_a").await;
    let user_b = app.create_user("soc_follow_dup_b").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["followed"].as_bool().unwrap(), true);

    // Second call is a no-op.
    let resp = app
        .post_json(
            &format!("/users/{}/follow", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["followed"].as_bool().unwrap(), false);

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND followed_id = $2",
    )
    .bind(user_a.id)
    .bind(user_b.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn follow_self_rejected() {
    let app = app().await;
    let user = app.create_user("soc_follow_self").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", user.id),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot follow yourself");
}

#[tokio::test]
async fn follow_nonexistent_user() {
    let app = app().await;
    let user = app.create_user("soc_follow_ghost").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", Uuid::new_v4()),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_requires_confirmed_account() {
    let app = app().await;
    let unconfirmed = app.create_unconfirmed_user("soc_follow_unconf").await;
    let target = app.create_user("soc_follow_target").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", target.id),
            json!({}),
            Some(&unconfirmed.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "account is not confirmed");
}

// ===========================================================================
// Unfollow
// ===========================================================================

#[tokio::test]
async fn unfollow_user() {
    let app = app().await;
    let user_a = app.create_user("soc_unfollow_a").await;
    let user_b = app.create_user("soc_unfollow_b").await;

    app.post_json(
        &format!("/users/{}/follow", user_b.id),
        json!({}),
        Some(&user_a.access_token),
    )
    .await;

    let resp = app
        .post_json(
            &format!("/users/{}/unfollow", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unfollowed"].as_bool().unwrap(), true);

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND followed_id = $2",
    )
    .bind(user_a.id)
    .bind(user_b.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn unfollow_missing_edge_is_noop() {
    let app = app().await;
    let user_a = app.create_user("soc_unfollow_noop_a").await;
    let user_b = app.create_user("soc_unfollow_noop_b").await;

    let resp = app
        .post_json(
            &format!("/users/{}/unfollow", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;

    // No error, no row created.
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unfollowed"].as_bool().unwrap(), false);

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND followed_id = $2",
    )
    .bind(user_a.id)
    .bind(user_b.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(count, 0);
}

// ===========================================================================
// Relationship probes
// ===========================================================================

#[tokio::test]
async fn relationship_is_directed() {
    let app = app().await;
    let user_a = app.create_user("soc_rel_a").await;
    let user_b = app.create_user("soc_rel_b").await;

    app.post_json(
        &format!("/users/{}/follow", user_b.id),
        json!({}),
        Some(&user_a.access_token),
    )
    .await;

    // A follows B, not the reverse.
    let resp = app
        .get(
            &format!("/users/{}/relationship", user_b.id),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["is_following"].as_bool().unwrap(), true);
    assert_eq!(body["is_followed_by"].as_bool().unwrap(), false);

    let resp = app
        .get(
            &format!("/users/{}/relationship", user_a.id),
            Some(&user_b.access_token),
        )
        .await;
    let body = resp.json();
    assert_eq!(body["is_following"].as_bool().unwrap(), false);
    assert_eq!(body["is_followed_by"].as_bool().unwrap(), true);
}

#[tokio::test]
async fn relationship_with_unknown_user_reads_as_not_following() {
    let app = app().await;
    let user = app.create_user("soc_rel_ghost").await;

    let resp = app
        .get(
            &format!("/users/{}/relationship", Uuid::new_v4()),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["is_following"].as_bool().unwrap(), false);
    assert_eq!(body["is_followed_by"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn membership_probes_treat_unknown_ids_as_absent() {
    let app = app().await;
    let user = app.create_user("soc_probe").await;
    let service = quill::app::social::SocialService::new(app.state.db.clone());

    assert!(!service
        .is_following(user.id, Uuid::new_v4())
        .await
        .unwrap());
    assert!(!service
        .is_followed_by(user.id, Uuid::new_v4())
        .await
        .unwrap());
}

// ===========================================================================
// Neighbor listings
// ===========================================================================

#[tokio::test]
async fn followers_and_following_listings() {
    let app = app().await;
    let user_a = app.create_user("soc_list_a").await;
    let user_b = app.create_user("soc_list_b").await;
    let user_c = app.create_user("soc_list_c").await;

    for follower in [&user_a, &user_c] {
        let resp = app
            .post_json(
                &format!("/users/{}/follow", user_b.id),
                json!({}),
                Some(&follower.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    let resp = app
        .get(
            &format!("/users/{}/followers", user_b.id),
            Some(&user_b.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json()["items"].as_array().unwrap().len();
    assert_eq!(items, 2);

    let resp = app
        .get(
            &format!("/users/{}/following", user_a.id),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["username"].as_str().unwrap(), user_b.username);
}

#[tokio::test]
async fn followers_pagination_uses_cursor() {
    let app = app().await;
    let target = app.create_user("soc_page_target").await;
    for i in 0..3 {
        let follower = app.create_user(&format!("soc_page_f{}", i)).await;
        app.post_json(
            &format!("/users/{}/follow", target.id),
            json!({}),
            Some(&follower.access_token),
        )
        .await;
    }

    let resp = app
        .get(
            &format!("/users/{}/followers?limit=2", target.id),
            Some(&target.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    let cursor = body["next_cursor"].as_str().unwrap().to_string();

    let resp = app
        .get(
            &format!("/users/{}/followers?limit=2&cursor={}", target.id, cursor),
            Some(&target.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["next_cursor"].is_null());
}
