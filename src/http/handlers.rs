use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::engagement::EngagementService;
use crate::app::moderation::ModerationService;
use crate::app::posts::PostService;
use crate::app::roles::RoleService;
use crate::app::social::{SocialService, SocialUserEdge};
use crate::app::users::UserService;
use crate::domain::engagement::Comment;
use crate::domain::moderation::ModerationAction;
use crate::domain::post::Post;
use crate::domain::role::Permission;
use crate::domain::social_graph::Relationship;
use crate::domain::user::{PublicUser, User};
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

fn parse_limit(limit: Option<i64>) -> Result<i64, AppError> {
    let limit = limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    Ok(limit)
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(state.db.clone(), state.tokens, state.admin_email.clone())
}

/// Confirmed-account gate for write-type actions: unconfirmed users can log
/// in and read, nothing more.
async fn require_confirmed(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    let profile = RoleService::new(state.db.clone())
        .access_profile(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to load access profile");
            AppError::internal("failed to check permissions")
        })?
        .ok_or_else(|| AppError::unauthorized("unknown user"))?;

    if !profile.confirmed {
        return Err(AppError::forbidden("account is not confirmed"));
    }
    Ok(())
}

/// Permission gate: the user must be confirmed and their role mask must
/// contain every bit of `flag`.
async fn authorize(state: &AppState, user_id: Uuid, flag: Permission) -> Result<(), AppError> {
    let profile = RoleService::new(state.db.clone())
        .access_profile(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to load access profile");
            AppError::internal("failed to check permissions")
        })?
        .ok_or_else(|| AppError::unauthorized("unknown user"))?;

    if !profile.confirmed {
        return Err(AppError::forbidden("account is not confirmed"));
    }
    if !profile.permissions.contains(flag) {
        return Err(AppError::forbidden(format!(
            "missing {} permission",
            flag.name()
        )));
    }
    Ok(())
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    let username = payload.username.trim();
    let email = payload.email.trim();
    if username.is_empty() || username.len() > 64 {
        return Err(AppError::bad_request(
            "username must be between 1 and 64 characters",
        ));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("email is not valid"));
    }
    if payload.password.len() < 6 {
        return Err(AppError::bad_request(
            "password must be at least 6 characters",
        ));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }

    let service = auth_service(&state);
    let user = service
        .signup(
            username.to_string(),
            email.to_string(),
            payload.password,
        )
        .await
        .map_err(|err| {
            let message = err.to_string();
            if message.contains("already") {
                return AppError::conflict(message);
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    // Delivery failure is non-fatal: registration stands, the outcome is
    // reported to the operational log, and the resend endpoint remains.
    match service.generate_confirmation_token(user.id) {
        Ok(token) => {
            match state
                .mailer
                .send_confirmation(&user.email, &user.username, &token)
                .await
            {
                Ok(()) => {
                    tracing::info!(user_id = %user.id, "confirmation email delivered")
                }
                Err(err) => {
                    tracing::warn!(user_id = %user.id, error = %err, "confirmation email failed")
                }
            }
        }
        Err(err) => {
            tracing::error!(user_id = %user.id, error = ?err, "failed to mint confirmation token")
        }
    }

    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }

    let service = auth_service(&state);
    let tokens = service
        .login(payload.email.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let tokens = service
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

#[derive(Deserialize)]
pub struct RevokeRequest {
    pub refresh_token: String,
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RevokeRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let revoked = service
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    let _ = revoked;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = auth_service(&state);
    let user = service.get_current_user(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
        AppError::internal("failed to fetch current user")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub confirmed: bool,
}

pub async fn confirm_email(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    if payload.token.trim().is_empty() {
        return Err(AppError::bad_request("token is required"));
    }

    let service = auth_service(&state);
    let user = service
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to confirm account")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    if user.confirmed {
        return Ok(Json(ConfirmResponse { confirmed: true }));
    }

    let confirmed = service
        .confirm_email(auth.user_id, &payload.token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to confirm account");
            AppError::internal("failed to confirm account")
        })?;

    if !confirmed {
        return Err(AppError::bad_request(
            "the confirmation token is invalid or expired",
        ));
    }

    Ok(Json(ConfirmResponse { confirmed: true }))
}

pub async fn resend_confirmation(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = auth_service(&state);
    let user = service
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to resend confirmation")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    if user.confirmed {
        return Err(AppError::bad_request("account is already confirmed"));
    }

    let token = service.generate_confirmation_token(user.id).map_err(|err| {
        tracing::error!(user_id = %user.id, error = ?err, "failed to mint confirmation token");
        AppError::internal("failed to resend confirmation")
    })?;

    match state
        .mailer
        .send_confirmation(&user.email, &user.username, &token)
        .await
    {
        Ok(()) => tracing::info!(user_id = %user.id, "confirmation email delivered"),
        Err(err) => {
            tracing::warn!(user_id = %user.id, error = %err, "confirmation email failed")
        }
    }

    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, AppError> {
    if payload.email.trim().is_empty() {
        return Err(AppError::bad_request("email is required"));
    }

    let service = auth_service(&state);
    let reset = service
        .begin_password_reset(&payload.email)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to begin password reset");
            AppError::internal("failed to begin password reset")
        })?;

    // Always accepted: the response never discloses whether the address has
    // an account.
    match reset {
        Some((user, token)) => {
            match state
                .mailer
                .send_password_reset(&user.email, &user.username, &token)
                .await
            {
                Ok(()) => {
                    tracing::info!(user_id = %user.id, "password reset email delivered")
                }
                Err(err) => {
                    tracing::warn!(user_id = %user.id, error = %err, "password reset email failed")
                }
            }
        }
        None => tracing::info!("password reset requested for unknown email"),
    }

    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    if payload.token.trim().is_empty() {
        return Err(AppError::bad_request("token is required"));
    }
    if payload.new_password.len() < 6 {
        return Err(AppError::bad_request(
            "password must be at least 6 characters",
        ));
    }

    let service = auth_service(&state);
    let reset = service
        .reset_password(&payload.token, &payload.new_password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to reset password");
            AppError::internal("failed to reset password")
        })?;

    if !reset {
        return Err(AppError::bad_request(
            "the reset token is invalid or expired",
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Users & account
// ---------------------------------------------------------------------------

pub async fn get_user(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let service = UserService::new(state.db.clone());
    let profile = service.get_profile(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateAccountRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub about_me: Option<String>,
    pub picture: Option<String>,
}

pub async fn update_account(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<User>, AppError> {
    require_confirmed(&state, auth.user_id).await?;

    if let Some(username) = &payload.username {
        if username.trim().is_empty() || username.len() > 64 {
            return Err(AppError::bad_request(
                "username must be between 1 and 64 characters",
            ));
        }
    }
    if let Some(email) = &payload.email {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(AppError::bad_request("email is not valid"));
        }
    }
    if let Some(password) = &payload.password {
        if password.len() < 6 {
            return Err(AppError::bad_request(
                "password must be at least 6 characters",
            ));
        }
    }
    if let Some(about_me) = &payload.about_me {
        if about_me.len() > 600 {
            return Err(AppError::bad_request(
                "about_me must be at most 600 characters",
            ));
        }
    }

    let service = UserService::new(state.db.clone());
    let user = service
        .update_account(
            auth.user_id,
            payload.username,
            payload.email,
            payload.about_me,
            payload.picture,
            payload.password,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update account");
            AppError::internal("failed to update account")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn list_user_posts(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = PostService::new(state.db.clone());
    let mut posts = service
        .list_by_user(id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list user posts");
            AppError::internal("failed to list user posts")
        })?;

    let next_cursor = if posts.len() > limit as usize {
        let last = posts.pop().expect("checked len");
        Some((last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: posts,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Serialize)]
pub struct FollowResponse {
    pub followed: bool,
}

pub async fn follow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    if auth.user_id == id {
        return Err(AppError::bad_request("cannot follow yourself"));
    }
    authorize(&state, auth.user_id, Permission::Follow).await?;

    let service = SocialService::new(state.db.clone());
    let followed = service.follow(auth.user_id, id).await.map_err(|err| {
        if err.to_string().contains("user not found") {
            return AppError::not_found("user not found");
        }
        tracing::error!(error = ?err, follower_id = %auth.user_id, followed_id = %id, "failed to follow user");
        AppError::internal("failed to follow user")
    })?;

    Ok(Json(FollowResponse { followed }))
}

#[derive(Serialize)]
pub struct UnfollowResponse {
    pub unfollowed: bool,
}

pub async fn unfollow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnfollowResponse>, AppError> {
    authorize(&state, auth.user_id, Permission::Follow).await?;

    let service = SocialService::new(state.db.clone());
    let unfollowed = service.unfollow(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, follower_id = %auth.user_id, followed_id = %id, "failed to unfollow user");
        AppError::internal("failed to unfollow user")
    })?;

    Ok(Json(UnfollowResponse { unfollowed }))
}

pub async fn list_followers(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<SocialUserEdge>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = SocialService::new(state.db.clone());
    let mut edges = service
        .list_followers(id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list followers");
            AppError::internal("failed to list followers")
        })?;

    let next_cursor = if edges.len() > limit as usize {
        let last = edges.pop().expect("checked len");
        Some((last.followed_at, last.user_id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: edges,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn list_following(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<SocialUserEdge>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = SocialService::new(state.db.clone());
    let mut edges = service
        .list_following(id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list following");
            AppError::internal("failed to list following")
        })?;

    let next_cursor = if edges.len() > limit as usize {
        let last = edges.pop().expect("checked len");
        Some((last.followed_at, last.user_id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: edges,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn relationship_status(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Relationship>, AppError> {
    let service = SocialService::new(state.db.clone());
    let relationship = service
        .relationship(auth.user_id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, viewer_id = %auth.user_id, other_id = %id, "failed to fetch relationship");
            AppError::internal("failed to fetch relationship")
        })?;

    Ok(Json(relationship))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let title = payload.title.trim();
    if title.is_empty() || title.len() > 80 {
        return Err(AppError::bad_request(
            "title must be between 1 and 80 characters",
        ));
    }
    if payload.body.trim().is_empty() {
        return Err(AppError::bad_request("body cannot be empty"));
    }
    authorize(&state, auth.user_id, Permission::Write).await?;

    let service = PostService::new(state.db.clone());
    let post = service
        .create(auth.user_id, title.to_string(), payload.body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok(Json(post))
}

pub async fn list_posts(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = PostService::new(state.db.clone());
    let mut posts = service.list_recent(cursor, limit + 1).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list posts");
        AppError::internal("failed to list posts")
    })?;

    let next_cursor = if posts.len() > limit as usize {
        let last = posts.pop().expect("checked len");
        Some((last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: posts,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Post>, AppError> {
    let service = PostService::new(state.db.clone());
    let post = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to fetch post");
        AppError::internal("failed to fetch post")
    })?;

    match post {
        Some(post) => Ok(Json(post)),
        None => Err(AppError::not_found("post not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    if let Some(title) = &payload.title {
        if title.trim().is_empty() || title.len() > 80 {
            return Err(AppError::bad_request(
                "title must be between 1 and 80 characters",
            ));
        }
    }
    if let Some(body) = &payload.body {
        if body.trim().is_empty() {
            return Err(AppError::bad_request("body cannot be empty"));
        }
    }
    authorize(&state, auth.user_id, Permission::Write).await?;

    let service = PostService::new(state.db.clone());
    let post = service
        .update(id, auth.user_id, payload.title, payload.body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    match post {
        Some(post) => Ok(Json(post)),
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone());
    let deleted = service.delete(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("post not found"))
    }
}

// ---------------------------------------------------------------------------
// Likes & comments
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

pub async fn like_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    require_confirmed(&state, auth.user_id).await?;

    let service = EngagementService::new(state.db.clone());
    let like = service.like(auth.user_id, id).await.map_err(|err| {
        if err.to_string().contains("post not found") {
            return AppError::not_found("post not found");
        }
        tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to like post");
        AppError::internal("failed to like post")
    })?;

    let like_count = service.like_count(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to count likes");
        AppError::internal("failed to like post")
    })?;

    Ok(Json(LikeResponse {
        liked: like.is_some(),
        like_count,
    }))
}

#[derive(Serialize)]
pub struct UnlikeResponse {
    pub unliked: bool,
    pub like_count: i64,
}

pub async fn unlike_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnlikeResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let unliked = service.unlike(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to unlike post");
        AppError::internal("failed to unlike post")
    })?;

    let like_count = service.like_count(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to count likes");
        AppError::internal("failed to unlike post")
    })?;

    Ok(Json(UnlikeResponse { unliked, like_count }))
}

#[derive(Serialize)]
pub struct PostLikesResponse {
    pub like_count: i64,
    pub liked_by_viewer: bool,
}

pub async fn get_post_likes(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostLikesResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let like_count = service.like_count(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to count likes");
        AppError::internal("failed to count likes")
    })?;
    let liked_by_viewer = service.has_liked(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to check like");
        AppError::internal("failed to count likes")
    })?;

    Ok(Json(PostLikesResponse {
        like_count,
        liked_by_viewer,
    }))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

pub async fn comment_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<Comment>, AppError> {
    if payload.body.trim().is_empty() {
        return Err(AppError::bad_request("body cannot be empty"));
    }
    authorize(&state, auth.user_id, Permission::Comment).await?;

    let service = EngagementService::new(state.db.clone());
    let comment = service
        .comment(auth.user_id, id, payload.body)
        .await
        .map_err(|err| {
            if err.to_string().contains("post not found") {
                return AppError::not_found("post not found");
            }
            tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to comment");
            AppError::internal("failed to comment")
        })?;

    Ok(Json(comment))
}

pub async fn list_post_comments(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Comment>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = EngagementService::new(state.db.clone());
    let mut comments = service
        .list_comments(id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    let next_cursor = if comments.len() > limit as usize {
        let last = comments.pop().expect("checked len");
        Some((last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: comments,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn delete_comment(
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = EngagementService::new(state.db.clone());
    let deleted = service
        .delete_comment(comment_id, id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to delete comment");
            AppError::internal("failed to delete comment")
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("comment not found"))
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

pub async fn following_feed(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = PostService::new(state.db.clone());
    let mut posts = service
        .list_following_feed(auth.user_id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to build following feed");
            AppError::internal("failed to build following feed")
        })?;

    let next_cursor = if posts.len() > limit as usize {
        let last = posts.pop().expect("checked len");
        Some((last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: posts,
        next_cursor: encode_cursor(next_cursor),
    }))
}

// ---------------------------------------------------------------------------
// Moderation & administration
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct TakedownRequest {
    pub reason: Option<String>,
}

pub async fn takedown_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Option<Json<TakedownRequest>>,
) -> Result<StatusCode, AppError> {
    authorize(&state, auth.user_id, Permission::Moderate).await?;

    let reason = payload.and_then(|Json(payload)| payload.reason);
    let service = ModerationService::new(state.db.clone());
    let removed = service
        .takedown_post(auth.user_id, id, reason)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to take down post");
            AppError::internal("failed to take down post")
        })?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("post not found"))
    }
}

pub async fn takedown_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Option<Json<TakedownRequest>>,
) -> Result<StatusCode, AppError> {
    authorize(&state, auth.user_id, Permission::Moderate).await?;

    let reason = payload.and_then(|Json(payload)| payload.reason);
    let service = ModerationService::new(state.db.clone());
    let removed = service
        .takedown_comment(auth.user_id, id, reason)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to take down comment");
            AppError::internal("failed to take down comment")
        })?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("comment not found"))
    }
}

pub async fn list_moderation_audit(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<ModerationAction>>, AppError> {
    authorize(&state, auth.user_id, Permission::Moderate).await?;

    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = ModerationService::new(state.db.clone());
    let mut actions = service.list_audit(cursor, limit + 1).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list moderation audit");
        AppError::internal("failed to list moderation audit")
    })?;

    let next_cursor = if actions.len() > limit as usize {
        let last = actions.pop().expect("checked len");
        Some((last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: actions,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<User>>, AppError> {
    authorize(&state, auth.user_id, Permission::Admin).await?;

    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = UserService::new(state.db.clone());
    let mut users = service.list_users(cursor, limit + 1).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list users");
        AppError::internal("failed to list users")
    })?;

    let next_cursor = if users.len() > limit as usize {
        let last = users.pop().expect("checked len");
        Some((last.member_since, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: users,
        next_cursor: encode_cursor(next_cursor),
    }))
}
