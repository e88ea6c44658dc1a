pub mod auth;
pub mod engagement;
pub mod moderation;
pub mod posts;
pub mod rate_limiter;
pub mod roles;
pub mod social;
pub mod users;
