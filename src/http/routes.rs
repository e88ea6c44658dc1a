use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
        .route("/auth/me", get(handlers::get_current_user))
        .route("/auth/confirm", post(handlers::confirm_email))
        .route(
            "/auth/resend-confirmation",
            post(handlers::resend_confirmation),
        )
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", post(handlers::reset_password))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/posts", get(handlers::list_user_posts))
        .route("/users/:id/follow", post(handlers::follow_user))
        .route("/users/:id/unfollow", post(handlers::unfollow_user))
        .route("/users/:id/followers", get(handlers::list_followers))
        .route("/users/:id/following", get(handlers::list_following))
        .route("/users/:id/relationship", get(handlers::relationship_status))
        .route("/account", patch(handlers::update_account))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route("/posts", get(handlers::list_posts))
        .route("/posts/:id", get(handlers::get_post))
        .route("/posts/:id", patch(handlers::update_post))
        .route("/posts/:id", delete(handlers::delete_post))
        .route("/posts/:id/like", post(handlers::like_post))
        .route("/posts/:id/like", delete(handlers::unlike_post))
        .route("/posts/:id/likes", get(handlers::get_post_likes))
        .route("/posts/:id/comments", post(handlers::comment_post))
        .route("/posts/:id/comments", get(handlers::list_post_comments))
        .route(
            "/posts/:id/comments/:comment_id",
            delete(handlers::delete_comment),
        )
}

pub fn feed() -> Router<AppState> {
    Router::new().route("/feed/following", get(handlers::following_feed))
}

pub fn moderation() -> Router<AppState> {
    Router::new()
        .route(
            "/moderation/posts/:id/takedown",
            post(handlers::takedown_post),
        )
        .route(
            "/moderation/comments/:id/takedown",
            post(handlers::takedown_comment),
        )
        .route("/moderation/audit", get(handlers::list_moderation_audit))
}

pub fn admin() -> Router<AppState> {
    Router::new().route("/admin/users", get(handlers::list_users))
}
