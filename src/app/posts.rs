use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::post::Post;
use crate::infra::db::Db;

const POST_COLUMNS: &str = "p.id, p.author_id, u.username AS author_username, p.title, p.body, p.created_at, \
     (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count, \
     (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count";

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, author_id: Uuid, title: String, body: String) -> Result<Post> {
        let row = sqlx::query(
            "WITH inserted AS ( \
                INSERT INTO posts (author_id, title, body) \
                VALUES ($1, $2, $3) \
                RETURNING id, author_id, title, body, created_at \
             ) \
             SELECT p.id, p.author_id, u.username AS author_username, p.title, p.body, \
                    p.created_at, 0::bigint AS like_count, 0::bigint AS comment_count \
             FROM inserted p \
             JOIN users u ON u.id = p.author_id",
        )
        .bind(author_id)
        .bind(title)
        .bind(body)
        .fetch_one(self.db.pool())
        .await?;

        Ok(map_post(&row))
    }

    pub async fn get(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p \
             JOIN users u ON u.id = p.author_id \
             WHERE p.id = $1",
        ))
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(map_post))
    }

    /// Owner-scoped partial update; editing another user's post matches no
    /// row and returns None.
    pub async fn update(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        title: Option<String>,
        body: Option<String>,
    ) -> Result<Option<Post>> {
        let row = sqlx::query(
            "WITH updated AS ( \
                UPDATE posts \
                SET title = COALESCE($3, title), body = COALESCE($4, body) \
                WHERE id = $1 AND author_id = $2 \
                RETURNING id, author_id, title, body, created_at \
             ) \
             SELECT p.id, p.author_id, u.username AS author_username, p.title, p.body, \
                    p.created_at, \
                    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count, \
                    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count \
             FROM updated p \
             JOIN users u ON u.id = p.author_id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(title)
        .bind(body)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(map_post))
    }

    pub async fn delete(&self, post_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(post_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Global timeline, newest first.
    pub async fn list_recent(
        &self,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let rows = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query(&format!(
                    "SELECT {POST_COLUMNS} \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     WHERE (p.created_at < $1 OR (p.created_at = $1 AND p.id < $2)) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $3",
                ))
                .bind(created_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {POST_COLUMNS} \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $1",
                ))
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(map_post).collect())
    }

    pub async fn list_by_user(
        &self,
        author_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let rows = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query(&format!(
                    "SELECT {POST_COLUMNS} \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     WHERE p.author_id = $1 \
                       AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3)) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $4",
                ))
                .bind(author_id)
                .bind(created_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {POST_COLUMNS} \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     WHERE p.author_id = $1 \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $2",
                ))
                .bind(author_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(map_post).collect())
    }

    /// Posts from users the viewer follows, joined through the edge set.
    pub async fn list_following_feed(
        &self,
        viewer_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let rows = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query(&format!(
                    "SELECT {POST_COLUMNS} \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     JOIN follows f ON f.followed_id = p.author_id \
                     WHERE f.follower_id = $1 \
                       AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3)) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $4",
                ))
                .bind(viewer_id)
                .bind(created_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {POST_COLUMNS} \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     JOIN follows f ON f.followed_id = p.author_id \
                     WHERE f.follower_id = $1 \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $2",
                ))
                .bind(viewer_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(map_post).collect())
    }
}

fn map_post(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author_username: Some(row.get("author_username")),
        title: row.get("title"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
    }
}
