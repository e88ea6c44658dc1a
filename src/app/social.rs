use anyhow::{anyhow, Result};
use serde::Serialize;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::social_graph::Relationship;
use crate::infra::db::Db;

/// One neighbor in the follower graph, with the edge timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct SocialUserEdge {
    pub user_id: Uuid,
    pub username: String,
    pub picture: String,
    #[serde(with = "time::serde::rfc3339")]
    pub followed_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent follow: the composite primary key absorbs a racing or
    /// repeated insert. Returns whether a new edge was created.
    pub async fn follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(followed_id)
                .fetch_one(self.db.pool())
                .await?;
        if !exists {
            return Err(anyhow!("user not found"));
        }

        let result = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id) \
             SELECT $1, $2 \
             WHERE $1 <> $2 \
             ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Idempotent unfollow: removing a missing edge is a no-op.
    pub async fn unfollow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Membership test on the directed edge set. Unknown identities simply
    /// have no edges, so they read as not following.
    pub async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let following: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(following)
    }

    pub async fn is_followed_by(&self, user_id: Uuid, other_id: Uuid) -> Result<bool> {
        self.is_following(other_id, user_id).await
    }

    pub async fn relationship(&self, viewer_id: Uuid, other_id: Uuid) -> Result<Relationship> {
        let row = sqlx::query(
            "SELECT \
                EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2) AS is_following, \
                EXISTS (SELECT 1 FROM follows WHERE follower_id = $2 AND followed_id = $1) AS is_followed_by",
        )
        .bind(viewer_id)
        .bind(other_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Relationship {
            is_following: row.get("is_following"),
            is_followed_by: row.get("is_followed_by"),
        })
    }

    pub async fn list_followers(
        &self,
        user_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<SocialUserEdge>> {
        let rows = match cursor {
            Some((created_at, follower_id)) => {
                sqlx::query(
                    "SELECT u.id, u.username, u.picture, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.follower_id \
                     WHERE f.followed_id = $1 \
                       AND (f.created_at < $2 OR (f.created_at = $2 AND f.follower_id < $3)) \
                     ORDER BY f.created_at DESC, f.follower_id DESC \
                     LIMIT $4",
                )
                .bind(user_id)
                .bind(created_at)
                .bind(follower_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT u.id, u.username, u.picture, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.follower_id \
                     WHERE f.followed_id = $1 \
                     ORDER BY f.created_at DESC, f.follower_id DESC \
                     LIMIT $2",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(SocialUserEdge {
                user_id: row.get("id"),
                username: row.get("username"),
                picture: row.get("picture"),
                followed_at: row.get("followed_at"),
            });
        }

        Ok(items)
    }

    pub async fn list_following(
        &self,
        user_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<SocialUserEdge>> {
        let rows = match cursor {
            Some((created_at, followed_id)) => {
                sqlx::query(
                    "SELECT u.id, u.username, u.picture, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.followed_id \
                     WHERE f.follower_id = $1 \
                       AND (f.created_at < $2 OR (f.created_at = $2 AND f.followed_id < $3)) \
                     ORDER BY f.created_at DESC, f.followed_id DESC \
                     LIMIT $4",
                )
                .bind(user_id)
                .bind(created_at)
                .bind(followed_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT u.id, u.username, u.picture, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.followed_id \
                     WHERE f.follower_id = $1 \
                     ORDER BY f.created_at DESC, f.followed_id DESC \
                     LIMIT $2",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(SocialUserEdge {
                user_id: row.get("id"),
                username: row.get("username"),
                picture: row.get("picture"),
                followed_at: row.get("followed_at"),
            });
        }

        Ok(items)
    }
}
