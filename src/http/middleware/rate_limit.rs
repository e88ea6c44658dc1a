use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::app::rate_limiter::{RateLimiter, RateWindow};
use crate::http::AppError;
use crate::AppState;

/// IP-based rate limiting for the unauthenticated endpoints.
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    let method = request.method();

    let rate_limit_config = match (path, method.as_str()) {
        ("/auth/login", "POST") => Some((
            "login",
            state.login_rate_limit_per_hour,
            RateWindow::Hour,
        )),
        ("/auth/register", "POST") => Some((
            "register",
            state.register_rate_limit_per_day,
            RateWindow::Day,
        )),
        _ => None,
    };

    let (action, limit, window) = match rate_limit_config {
        Some(config) => config,
        None => return Ok(next.run(request).await),
    };

    let ip = addr.ip().to_string();
    let rate_limiter = RateLimiter::new(state.cache.clone());

    let is_limited = rate_limiter
        .check_ip(&ip, action, limit, window)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check IP rate limit");
            AppError::internal("failed to check rate limit")
        })?;

    if is_limited {
        tracing::warn!(ip = ip, action = action, "IP rate limit exceeded");
        return Err(AppError::rate_limited(
            "Too many attempts from your IP address. Please try again later.",
        ));
    }

    if let Err(err) = rate_limiter.increment_ip(&ip, action, window).await {
        tracing::warn!(error = ?err, "failed to increment IP rate limit counter");
    }

    Ok(next.run(request).await)
}
