//! Moderator takedowns, the audit trail, and the administrator listing.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn moderator_can_take_down_any_post() {
    let app = app().await;
    let author = app.create_user("mod_post_author").await;
    let moderator = app.create_user_with_role("mod_post_mod", "Moderator").await;
    let post_id = app.create_post_for_user(author.id).await;

    let resp = app
        .post_json(
            &format!("/moderation/posts/{}/takedown", post_id),
            json!({"reason": "spam"}),
            Some(&moderator.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
        .bind(post_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(!exists);

    // The action leaves an audit row.
    let audited: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM moderation_actions \
         WHERE target_type = 'post' AND target_id = $1 AND actor_id = $2)",
    )
    .bind(post_id)
    .bind(moderator.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert!(audited);
}

#[tokio::test]
async fn takedown_requires_moderate_permission() {
    let app = app().await;
    let author = app.create_user("mod_perm_author").await;
    let regular = app.create_user("mod_perm_regular").await;
    let post_id = app.create_post_for_user(author.id).await;

    let resp = app
        .post_json(
            &format!("/moderation/posts/{}/takedown", post_id),
            json!({}),
            Some(&regular.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "missing moderate permission");

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
        .bind(post_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(exists);
}

#[tokio::test]
async fn moderator_can_take_down_any_comment() {
    let app = app().await;
    let author = app.create_user("mod_comment_author").await;
    let moderator = app
        .create_user_with_role("mod_comment_mod", "Moderator")
        .await;
    let post_id = app.create_post_for_user(author.id).await;
    let comment_id = app.create_comment(post_id, author.id).await;

    let resp = app
        .post_json(
            &format!("/moderation/comments/{}/takedown", comment_id),
            json!({"reason": "abuse"}),
            Some(&moderator.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM comments WHERE id = $1)")
            .bind(comment_id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn takedown_of_missing_target_rolls_back_audit() {
    let app = app().await;
    let moderator = app
        .create_user_with_role("mod_missing_mod", "Moderator")
        .await;
    let ghost = uuid::Uuid::new_v4();

    let resp = app
        .post_json(
            &format!("/moderation/posts/{}/takedown", ghost),
            json!({}),
            Some(&moderator.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let audited: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM moderation_actions WHERE target_id = $1)",
    )
    .bind(ghost)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert!(!audited);
}

#[tokio::test]
async fn audit_listing_is_moderate_gated() {
    let app = app().await;
    let moderator = app.create_user_with_role("mod_audit_mod", "Moderator").await;
    let regular = app.create_user("mod_audit_regular").await;

    let resp = app
        .get("/moderation/audit", Some(&moderator.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["items"].is_array());

    let resp = app
        .get("/moderation/audit", Some(&regular.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_listing_requires_admin_bit() {
    let app = app().await;
    let admin = app
        .create_user_with_role("mod_admin_list", "Administrator")
        .await;
    let moderator = app
        .create_user_with_role("mod_admin_list_mod", "Moderator")
        .await;

    let resp = app.get("/admin/users", Some(&admin.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json()["items"].as_array().unwrap().clone();
    assert!(!items.is_empty());
    // Administrators see emails in the listing.
    assert!(items[0]["email"].as_str().is_some());

    // A moderator holds MODERATE but not ADMIN: flags are independent.
    let resp = app.get("/admin/users", Some(&moderator.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "missing admin permission");
}
