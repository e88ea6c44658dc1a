use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::roles::RoleService;
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

/// Key material and lifetimes for every token the service mints.
#[derive(Debug, Clone, Copy)]
pub struct TokenConfig {
    pub access_key: [u8; 32],
    pub refresh_key: [u8; 32],
    /// Dedicated key for confirmation and password-reset tokens.
    pub email_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub confirm_ttl_seconds: u64,
    pub reset_ttl_seconds: u64,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    tokens: TokenConfig,
    admin_email: Option<String>,
}

impl AuthService {
    pub fn new(db: Db, tokens: TokenConfig, admin_email: Option<String>) -> Self {
        Self {
            db,
            tokens,
            admin_email,
        }
    }

    /// Register a new account. Duplicate email/username is rejected inside
    /// the transaction; the schema itself carries no unique constraint.
    /// The role is fixed here, once: the default role, or Administrator when
    /// the email matches the configured administrator address.
    pub async fn signup(&self, username: String, email: String, password: String) -> Result<User> {
        let email = email.trim().to_string();
        let username = username.trim().to_string();
        let password_hash = hash_password(&password)?;

        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "SELECT \
                EXISTS (SELECT 1 FROM users WHERE email = $1) AS email_taken, \
                EXISTS (SELECT 1 FROM users WHERE username = $2) AS username_taken",
        )
        .bind(&email)
        .bind(&username)
        .fetch_one(&mut *tx)
        .await?;

        if row.get::<bool, _>("email_taken") {
            return Err(anyhow!("email already in use"));
        }
        if row.get::<bool, _>("username_taken") {
            return Err(anyhow!("username already taken"));
        }

        let role_service = RoleService::new(self.db.clone());
        let is_admin = self
            .admin_email
            .as_deref()
            .map(|admin| admin == email)
            .unwrap_or(false);
        let role = if is_admin {
            role_service
                .role_by_name_with_tx("Administrator", &mut tx)
                .await?
        } else {
            role_service.default_role_with_tx(&mut tx).await?
        };

        let row = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, username, email, about_me, picture, confirmed, role_id, member_since",
        )
        .bind(&username)
        .bind(&email)
        .bind(password_hash)
        .bind(role.id)
        .fetch_one(&mut *tx)
        .await?;

        let user = map_user(&row);

        if is_admin {
            sqlx::query(
                "INSERT INTO moderation_actions (actor_id, target_type, target_id, reason) \
                 VALUES ($1, 'role_grant', $1, $2)",
            )
            .bind(user.id)
            .bind(format!(
                "administrator role assigned to configured address at registration ({})",
                role.name
            ))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if is_admin {
            tracing::info!(user_id = %user.id, "configured administrator address registered");
        }

        Ok(user)
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<Option<TokenPair>> {
        let row = sqlx::query(
            "SELECT id, password_hash \
             FROM users WHERE email = $1 OR username = $1",
        )
        .bind(identifier)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() {
            return Ok(None);
        }

        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let tokens = self.issue_token_pair(user_id).await?;
        Ok(Some(tokens))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<TokenPair>> {
        let (user_id, refresh_id) = match self.verify_refresh_token(refresh_token) {
            Ok((user_id, refresh_id)) => (user_id, refresh_id),
            Err(_) => return Ok(None),
        };
        let token_hash = hash_token(refresh_token);

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "SELECT id \
             FROM refresh_tokens \
             WHERE id = $1 \
               AND user_id = $2 \
               AND token_hash = $3 \
               AND revoked_at IS NULL \
               AND expires_at > now()",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        if row.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let tokens = self.issue_token_pair_with_tx(user_id, &mut tx).await?;
        sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now(), replaced_by = $1 \
             WHERE id = $2 AND revoked_at IS NULL",
        )
        .bind(tokens.refresh_id)
        .bind(refresh_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(tokens.pair))
    }

    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<bool> {
        let (user_id, refresh_id) = match self.verify_refresh_token(refresh_token) {
            Ok((user_id, refresh_id)) => (user_id, refresh_id),
            Err(_) => return Ok(false),
        };
        let token_hash = hash_token(refresh_token);

        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(token_hash)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token, self.tokens.access_key)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }
        let user_id = match claim_uuid(&claims, "sub") {
            Some(user_id) => user_id,
            None => return Ok(None),
        };
        Ok(Some(AuthSession { user_id }))
    }

    pub async fn get_current_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, about_me, picture, confirmed, role_id, member_since \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| map_user(&row)))
    }

    /// Mint a confirmation token for the given user. The token is opaque to
    /// the caller: an encrypted claim set carrying the user id and a purpose.
    pub fn generate_confirmation_token(&self, user_id: Uuid) -> Result<String> {
        self.generate_email_token(user_id, "confirm", self.tokens.confirm_ttl_seconds)
    }

    pub fn generate_reset_token(&self, user_id: Uuid) -> Result<String> {
        self.generate_email_token(user_id, "reset", self.tokens.reset_ttl_seconds)
    }

    /// Verify a confirmation token on behalf of the authenticated user and
    /// mark the account confirmed. Returns false — with no state change —
    /// when the token is invalid, expired, of the wrong purpose, or minted
    /// for a different user.
    pub async fn confirm_email(&self, user_id: Uuid, token: &str) -> Result<bool> {
        let subject = match self.verify_email_token(token, "confirm")? {
            Some(subject) => subject,
            None => return Ok(false),
        };
        if subject != user_id {
            return Ok(false);
        }

        sqlx::query("UPDATE users SET confirmed = true WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(true)
    }

    /// Look up the account for a password-reset request. Returns the user and
    /// a fresh reset token, or None when no account carries that email.
    pub async fn begin_password_reset(&self, email: &str) -> Result<Option<(User, String)>> {
        let row = sqlx::query(
            "SELECT id, username, email, about_me, picture, confirmed, role_id, member_since \
             FROM users WHERE email = $1",
        )
        .bind(email.trim())
        .fetch_optional(self.db.pool())
        .await?;

        let user = match row {
            Some(row) => map_user(&row),
            None => return Ok(None),
        };

        let token = self.generate_reset_token(user.id)?;
        Ok(Some((user, token)))
    }

    /// Complete a password reset. The embedded subject selects the account;
    /// an invalid or expired token changes nothing.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<bool> {
        let subject = match self.verify_email_token(token, "reset")? {
            Some(subject) => subject,
            None => return Ok(false),
        };

        let password_hash = hash_password(new_password)?;
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(subject)
            .bind(password_hash)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn generate_email_token(&self, user_id: Uuid, purpose: &str, ttl_seconds: u64) -> Result<String> {
        let duration = std::time::Duration::from_secs(ttl_seconds);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer("quill")?;
        claims.audience("quill")?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", purpose)?;

        let key = SymmetricKey::<V4>::from(&self.tokens.email_key)?;
        Ok(local::encrypt(&key, &claims, None, None)?)
    }

    fn verify_email_token(&self, token: &str, expected_purpose: &str) -> Result<Option<Uuid>> {
        let claims = match self.decrypt_claims(token, self.tokens.email_key)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, expected_purpose) {
            return Ok(None);
        }
        Ok(claim_uuid(&claims, "sub"))
    }

    fn decrypt_claims(&self, token: &str, key_bytes: [u8; 32]) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&key_bytes)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with("quill");
        rules.validate_audience_with("quill");

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }

    fn build_access_claims(&self, user_id: Uuid) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.tokens.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer("quill")?;
        claims.audience("quill")?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "access")?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(self.tokens.access_ttl_minutes as i64);
        Ok((claims, expires_at))
    }

    fn build_refresh_claims(
        &self,
        user_id: Uuid,
        refresh_id: Uuid,
    ) -> Result<(Claims, OffsetDateTime)> {
        let duration =
            std::time::Duration::from_secs(self.tokens.refresh_ttl_days * 24 * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer("quill")?;
        claims.audience("quill")?;
        claims.subject(&user_id.to_string())?;
        claims.token_identifier(&refresh_id.to_string())?;
        claims.add_additional("typ", "refresh")?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::days(self.tokens.refresh_ttl_days as i64);
        Ok((claims, expires_at))
    }

    pub async fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let mut tx = self.db.pool().begin().await?;
        let tokens = self.issue_token_pair_with_tx(user_id, &mut tx).await?;
        tx.commit().await?;
        Ok(tokens.pair)
    }

    async fn issue_token_pair_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<IssuedTokens> {
        let (access_claims, access_expires_at) = self.build_access_claims(user_id)?;
        let access_key = SymmetricKey::<V4>::from(&self.tokens.access_key)?;
        let access_token = local::encrypt(&access_key, &access_claims, None, None)?;

        let refresh_id = Uuid::new_v4();
        let (refresh_claims, refresh_expires_at) = self.build_refresh_claims(user_id, refresh_id)?;
        let refresh_key = SymmetricKey::<V4>::from(&self.tokens.refresh_key)?;
        let refresh_token = local::encrypt(&refresh_key, &refresh_claims, None, None)?;
        let token_hash = hash_token(&refresh_token);

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(token_hash)
        .bind(refresh_expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(IssuedTokens {
            refresh_id,
            pair: TokenPair {
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
            },
        })
    }

    fn verify_refresh_token(&self, token: &str) -> Result<(Uuid, Uuid)> {
        let claims = match self.decrypt_claims(token, self.tokens.refresh_key)? {
            Some(claims) => claims,
            None => return Err(anyhow!("invalid refresh token")),
        };
        if !has_token_type(&claims, "refresh") {
            return Err(anyhow!("invalid refresh token"));
        }
        let user_id =
            claim_uuid(&claims, "sub").ok_or_else(|| anyhow!("invalid refresh token"))?;
        let refresh_id =
            claim_uuid(&claims, "jti").ok_or_else(|| anyhow!("invalid refresh token"))?;
        Ok((user_id, refresh_id))
    }
}

struct IssuedTokens {
    refresh_id: Uuid,
    pair: TokenPair,
}

fn map_user(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        about_me: row.get("about_me"),
        picture: row.get("picture"),
        confirmed: row.get("confirmed"),
        role_id: row.get("role_id"),
        member_since: row.get("member_since"),
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

fn claim_uuid(claims: &Claims, name: &str) -> Option<Uuid> {
    claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .and_then(|value| Uuid::parse_str(value).ok())
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
