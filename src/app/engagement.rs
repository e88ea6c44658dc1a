use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::engagement::{Comment, Like};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent like: the composite primary key absorbs duplicates, so a
    /// second like of the same post returns None without touching the row.
    pub async fn like(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<Like>> {
        self.ensure_post_exists(post_id).await?;

        let row = sqlx::query(
            "INSERT INTO likes (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING \
             RETURNING user_id, post_id, created_at",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let like = row.map(|row| Like {
            user_id: row.get("user_id"),
            post_id: row.get("post_id"),
            created_at: row.get("created_at"),
        });

        Ok(like)
    }

    /// Idempotent unlike: deleting a missing membership row is a no-op.
    pub async fn unlike(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Derived on demand by counting membership rows.
    pub async fn like_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }

    pub async fn has_liked(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let liked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(liked)
    }

    pub async fn comment(&self, author_id: Uuid, post_id: Uuid, body: String) -> Result<Comment> {
        self.ensure_post_exists(post_id).await?;

        let row = sqlx::query(
            "WITH inserted AS ( \
                INSERT INTO comments (post_id, author_id, body) VALUES ($1, $2, $3) \
                RETURNING id, post_id, author_id, body, created_at \
             ) \
             SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
                    c.body, c.created_at \
             FROM inserted c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(self.db.pool())
        .await?;

        Ok(map_comment(&row))
    }

    pub async fn list_comments(
        &self,
        post_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Comment>> {
        let rows = match cursor {
            Some((created_at, comment_id)) => {
                sqlx::query(
                    "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
                            c.body, c.created_at \
                     FROM comments c \
                     JOIN users u ON u.id = c.author_id \
                     WHERE c.post_id = $1 \
                       AND (c.created_at < $2 OR (c.created_at = $2 AND c.id < $3)) \
                     ORDER BY c.created_at DESC, c.id DESC \
                     LIMIT $4",
                )
                .bind(post_id)
                .bind(created_at)
                .bind(comment_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
                            c.body, c.created_at \
                     FROM comments c \
                     JOIN users u ON u.id = c.author_id \
                     WHERE c.post_id = $1 \
                     ORDER BY c.created_at DESC, c.id DESC \
                     LIMIT $2",
                )
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(map_comment).collect())
    }

    /// Author-scoped delete; moderators go through the moderation service.
    pub async fn delete_comment(
        &self,
        comment_id: Uuid,
        post_id: Uuid,
        author_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM comments WHERE id = $1 AND post_id = $2 AND author_id = $3",
        )
        .bind(comment_id)
        .bind(post_id)
        .bind(author_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ensure_post_exists(&self, post_id: Uuid) -> Result<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
                .bind(post_id)
                .fetch_one(self.db.pool())
                .await?;

        if !exists {
            return Err(anyhow!("post not found"));
        }
        Ok(())
    }
}

fn map_comment(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        author_username: Some(row.get("author_username")),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}
