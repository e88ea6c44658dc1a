use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::hash_password;
use crate::domain::user::{PublicUser, User};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Public profile with derived graph counts. Counts are computed per
    /// read, never cached.
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<PublicUser>> {
        let row = sqlx::query(
            "SELECT u.id, u.username, u.about_me, u.picture, u.member_since, \
                    (SELECT COUNT(*) FROM follows f WHERE f.followed_id = u.id) AS followers_count, \
                    (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id) AS following_count, \
                    (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id) AS posts_count \
             FROM users u \
             WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let profile = row.map(|row| PublicUser {
            id: row.get("id"),
            username: row.get("username"),
            about_me: row.get("about_me"),
            picture: row.get("picture"),
            member_since: row.get("member_since"),
            followers_count: row.get("followers_count"),
            following_count: row.get("following_count"),
            posts_count: row.get("posts_count"),
        });

        Ok(profile)
    }

    /// Partial account update; absent fields keep their current value. A new
    /// password is re-hashed here. The role is never touched: assignment is
    /// one-time, at registration.
    pub async fn update_account(
        &self,
        user_id: Uuid,
        username: Option<String>,
        email: Option<String>,
        about_me: Option<String>,
        picture: Option<String>,
        password: Option<String>,
    ) -> Result<Option<User>> {
        let password_hash = match password {
            Some(password) => Some(hash_password(&password)?),
            None => None,
        };

        let row = sqlx::query(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 email = COALESCE($3, email), \
                 about_me = COALESCE($4, about_me), \
                 picture = COALESCE($5, picture), \
                 password_hash = COALESCE($6, password_hash) \
             WHERE id = $1 \
             RETURNING id, username, email, about_me, picture, confirmed, role_id, member_since",
        )
        .bind(user_id)
        .bind(username)
        .bind(email)
        .bind(about_me)
        .bind(picture)
        .bind(password_hash)
        .fetch_optional(self.db.pool())
        .await?;

        let user = row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            about_me: row.get("about_me"),
            picture: row.get("picture"),
            confirmed: row.get("confirmed"),
            role_id: row.get("role_id"),
            member_since: row.get("member_since"),
        });

        Ok(user)
    }

    /// Administrator listing: every account, newest first.
    pub async fn list_users(
        &self,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<User>> {
        let rows = match cursor {
            Some((member_since, user_id)) => {
                sqlx::query(
                    "SELECT id, username, email, about_me, picture, confirmed, role_id, member_since \
                     FROM users \
                     WHERE (member_since < $1 OR (member_since = $1 AND id < $2)) \
                     ORDER BY member_since DESC, id DESC \
                     LIMIT $3",
                )
                .bind(member_since)
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, username, email, about_me, picture, confirmed, role_id, member_since \
                     FROM users \
                     ORDER BY member_since DESC, id DESC \
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(User {
                id: row.get("id"),
                username: row.get("username"),
                email: row.get("email"),
                about_me: row.get("about_me"),
                picture: row.get("picture"),
                confirmed: row.get("confirmed"),
                role_id: row.get("role_id"),
                member_since: row.get("member_since"),
            });
        }

        Ok(users)
    }
}
