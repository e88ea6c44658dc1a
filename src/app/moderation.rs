use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::moderation::ModerationAction;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct ModerationService {
    db: Db,
}

impl ModerationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Remove any post regardless of ownership, recording an audit row in
    /// the same transaction.
    pub async fn takedown_post(
        &self,
        actor_id: Uuid,
        post_id: Uuid,
        reason: Option<String>,
    ) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO moderation_actions (actor_id, target_type, target_id, reason) \
             VALUES ($1, 'post', $2, $3)",
        )
        .bind(actor_id)
        .bind(post_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn takedown_comment(
        &self,
        actor_id: Uuid,
        comment_id: Uuid,
        reason: Option<String>,
    ) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO moderation_actions (actor_id, target_type, target_id, reason) \
             VALUES ($1, 'comment', $2, $3)",
        )
        .bind(actor_id)
        .bind(comment_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn list_audit(
        &self,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<ModerationAction>> {
        let rows = match cursor {
            Some((created_at, action_id)) => {
                sqlx::query(
                    "SELECT id, actor_id, target_type, target_id, reason, created_at \
                     FROM moderation_actions \
                     WHERE (created_at < $1 OR (created_at = $1 AND id < $2)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $3",
                )
                .bind(created_at)
                .bind(action_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, actor_id, target_type, target_id, reason, created_at \
                     FROM moderation_actions \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut actions = Vec::with_capacity(rows.len());
        for row in rows {
            actions.push(ModerationAction {
                id: row.get("id"),
                actor_id: row.get("actor_id"),
                target_type: row.get("target_type"),
                target_id: row.get("target_id"),
                reason: row.get("reason"),
                created_at: row.get("created_at"),
            });
        }

        Ok(actions)
    }
}
