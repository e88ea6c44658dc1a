use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ModerationAction {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub target_type: String,
    pub target_id: Uuid,
    pub reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
