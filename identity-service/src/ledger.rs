use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::{ServiceError, ServiceResult};
use crate::users::is_unique_violation;

/// One issued refresh token. At most one live record exists per token
/// string; rotation replaces the record rather than mutating it.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Durable registry of issued refresh tokens. A signed token cannot be
/// invalidated by signature alone, so server-side revocation deletes its
/// record here.
#[derive(Clone)]
pub struct RefreshTokenLedger {
    pool: PgPool,
}

impl RefreshTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn store(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> ServiceResult<RefreshTokenRecord> {
        sqlx::query_as::<_, RefreshTokenRecord>(
            "INSERT INTO refresh_tokens (user_id, token, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, token, expires_at, created_at",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::Integrity("refresh token collision".to_string())
            } else {
                err.into()
            }
        })
    }

    pub async fn find_by_token(&self, token: &str) -> ServiceResult<Option<RefreshTokenRecord>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT id, user_id, token, expires_at, created_at
             FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Returns whether a record was actually removed, so callers can treat
    /// repeated deletion as a no-op success.
    pub async fn delete_by_token(&self, token: &str) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_id(&self, id: i64) -> ServiceResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Replaces a consumed token with its successor in a single transaction:
    /// delete old, insert new. Returns `None` when the old token was already
    /// gone, which is how the loser of a concurrent rotation race finds out.
    pub async fn rotate(
        &self,
        old_token: &str,
        user_id: i64,
        new_token: &str,
        expires_at: DateTime<Utc>,
    ) -> ServiceResult<Option<RefreshTokenRecord>> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(old_token)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "INSERT INTO refresh_tokens (user_id, token, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, token, expires_at, created_at",
        )
        .bind(user_id)
        .bind(new_token)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::Integrity("refresh token collision".to_string())
            } else {
                ServiceError::from(err)
            }
        })?;

        tx.commit().await?;
        Ok(Some(record))
    }
}
