use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub about_me: Option<String>,
    /// Opaque reference to a profile picture; never resolved server-side.
    pub picture: String,
    pub confirmed: bool,
    pub role_id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
}

/// Profile view exposed to other users: no email, with derived graph counts.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub about_me: Option<String>,
    pub picture: String,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
}
