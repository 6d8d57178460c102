use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

const TOKEN_COLUMNS: &str = "id, token, user_id, expires_at, is_active, is_revoked, \
     revoked_at, replaced_by_token, created_at, updated_at";

/// Session continuation record. Created on login/registration/refresh,
/// revoked on logout, rotation and password reset; never mutated otherwise.
#[derive(Debug, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshToken {
    /// valid ⇔ active ∧ ¬revoked ∧ now < expiry. Computed on read; expired
    /// rows are never swept.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_revoked && now < self.expires_at
    }

    pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token = $1");
        sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        executor: impl PgExecutor<'_>,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO refresh_tokens (id, token, user_id, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {TOKEN_COLUMNS}"
        );
        sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(Uuid::new_v4())
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .fetch_one(executor)
            .await
    }

    /// Marks the token revoked. Idempotent: revoking an unknown or
    /// already-revoked token is a no-op.
    pub async fn revoke(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE refresh_tokens \
             SET is_revoked = true, revoked_at = now(), updated_at = now() \
             WHERE token = $1 AND is_revoked = false",
        )
        .bind(token)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// One-time-use claim for rotation. The conditional update is the
    /// serialization point: of two concurrent redeems of the same token,
    /// exactly one sees an affected row. Callers run the claim and the
    /// replacement insert in one transaction so a token is only burned
    /// once its successor is durable.
    pub async fn claim_for_rotation(
        executor: impl PgExecutor<'_>,
        token: &str,
        replaced_by: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET is_revoked = true, revoked_at = now(), replaced_by_token = $2, \
                 updated_at = now() \
             WHERE token = $1 AND is_revoked = false",
        )
        .bind(token)
        .bind(replaced_by)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Revokes every currently-valid token the user owns (password reset and
    /// change force re-login everywhere).
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET is_revoked = true, revoked_at = now(), updated_at = now() \
             WHERE user_id = $1 AND is_active = true AND is_revoked = false",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Single-use, time-boxed password-reset token.
pub struct PasswordResetToken;

impl PasswordResetToken {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (id, user_id, token, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Burns the token if it matches, is unused and has not expired; one
    /// statement, so a token can be consumed at most once.
    pub async fn consume(
        pool: &PgPool,
        user_id: Uuid,
        token: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens \
             SET used = true \
             WHERE user_id = $1 AND token = $2 AND used = false AND expires_at > now()",
        )
        .bind(user_id)
        .bind(token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
