use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quill::app::auth::TokenConfig;
use quill::config::AppConfig;
use quill::infra::{cache::RedisCache, db::Db, mailer::Mailer};
use quill::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    let cache = RedisCache::connect(&config.redis_url).await?;
    let mailer = Mailer::new(config.smtp.as_ref(), config.public_base_url.clone())?;
    if !mailer.is_configured() {
        tracing::warn!("smtp not configured; outbound mail will be reported as failed");
    }

    let state = AppState {
        db,
        cache,
        mailer,
        admin_email: config.admin_email.clone(),
        tokens: TokenConfig {
            access_key: config.paseto_access_key,
            refresh_key: config.paseto_refresh_key,
            email_key: config.paseto_email_key,
            access_ttl_minutes: config.access_ttl_minutes,
            refresh_ttl_days: config.refresh_ttl_days,
            confirm_ttl_seconds: config.confirm_ttl_seconds,
            reset_ttl_seconds: config.reset_ttl_seconds,
        },
        login_rate_limit_per_hour: config.login_rate_limit_per_hour,
        register_rate_limit_per_day: config.register_rate_limit_per_day,
    };

    let app = quill::http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);

    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
