pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::auth::TokenConfig;
use crate::infra::{cache::RedisCache, db::Db, mailer::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub mailer: Mailer,
    pub admin_email: Option<String>,
    pub tokens: TokenConfig,
    pub login_rate_limit_per_hour: u32,
    pub register_rate_limit_per_day: u32,
}
