use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::{ServiceError, ServiceResult};

/// Public account representation. Never carries the password hash.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Internal row used by the login flow; includes the password hash.
#[derive(Debug, FromRow)]
pub struct CredentialRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRow {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Emails are stored lowercased so the unique constraint enforces
/// case-insensitive uniqueness.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub async fn insert_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> ServiceResult<User> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash)
         VALUES ($1, $2, $3)
         RETURNING id, name, email, role, is_active, created_at, updated_at",
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ServiceError::DuplicateEmail
        } else {
            err.into()
        }
    })
}

pub async fn find_credentials_by_email(
    pool: &PgPool,
    email: &str,
) -> ServiceResult<Option<CredentialRow>> {
    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, name, email, role, password_hash, is_active, created_at, updated_at
         FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> ServiceResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, is_active, created_at, updated_at
         FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn list_users(pool: &PgPool) -> ServiceResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, is_active, created_at, updated_at
         FROM users ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(users)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
