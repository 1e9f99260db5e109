use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use dirs::cache_dir;
use pg_embed::pg_enums::PgAuthMethod;
use pg_embed::pg_fetch::{PgFetchSettings, PG_V13};
use pg_embed::postgres::{PgEmbed, PgSettings};
use portpicker::pick_unused_port;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tempfile::{tempdir, TempDir};

use common_auth::TokenCodec;
use identity_service::config::AuthConfig;
use identity_service::AppState;

pub struct TestDatabase {
    pool: PgPool,
    embedded: Option<EmbeddedPg>,
}

impl TestDatabase {
    pub async fn setup() -> Result<Option<Self>> {
        if env::var("IDENTITY_TEST_DATABASE_URL").is_err()
            && !env_flag_enabled("IDENTITY_TEST_USE_EMBED")
        {
            eprintln!(
                "Skipping identity-service integration tests: set IDENTITY_TEST_DATABASE_URL or IDENTITY_TEST_USE_EMBED=1 to run them.",
            );
            return Ok(None);
        }

        let mut embedded = None;
        let database_url = if let Ok(url) = env::var("IDENTITY_TEST_DATABASE_URL") {
            url
        } else {
            if env_flag_enabled("IDENTITY_TEST_EMBED_CLEAR_CACHE") {
                if let Some(cache_dir) = cache_dir() {
                    let _ = std::fs::remove_dir_all(cache_dir.join("pg-embed"));
                }
            }

            let temp = tempdir()?;
            let port = pick_unused_port()
                .context("failed to find available port for embedded Postgres")?;

            let mut fetch_settings = PgFetchSettings::default();
            fetch_settings.version = PG_V13;

            let mut pg = PgEmbed::new(
                PgSettings {
                    database_dir: temp.path().to_path_buf(),
                    port,
                    user: "postgres".to_string(),
                    password: "postgres".to_string(),
                    auth_method: PgAuthMethod::Plain,
                    persistent: false,
                    timeout: Some(Duration::from_secs(30)),
                    migration_dir: None,
                },
                fetch_settings,
            )
            .await?;

            pg.setup().await?;
            pg.start_db().await?;

            let uri = format!("{}/postgres", pg.db_uri);
            embedded = Some(EmbeddedPg {
                pg,
                _temp_dir: temp,
            });
            uri
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        if embedded.is_some() || env_flag_enabled("IDENTITY_TEST_APPLY_MIGRATIONS") {
            run_migrations(&pool).await?;
        }

        // Start each suite from a clean slate.
        sqlx::query("DELETE FROM refresh_tokens").execute(&pool).await?;
        sqlx::query("DELETE FROM users").execute(&pool).await?;

        Ok(Some(Self { pool, embedded }))
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }

    pub async fn teardown(self) -> Result<()> {
        if let Some(embedded) = self.embedded {
            embedded.shutdown().await;
        }
        Ok(())
    }
}

struct EmbeddedPg {
    pg: PgEmbed,
    _temp_dir: TempDir,
}

impl EmbeddedPg {
    async fn shutdown(mut self) {
        let _ = self.pg.stop_db().await;
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrations_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let mut entries = std::fs::read_dir(&migrations_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        let sql = std::fs::read_to_string(&path)?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed).execute(pool).await?;
        }
    }

    Ok(())
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        access_secret: "test-access-secret".to_string(),
        refresh_secret: "test-refresh-secret".to_string(),
        access_lifetime: ChronoDuration::minutes(15),
        refresh_lifetime: ChronoDuration::days(7),
        // Minimum bcrypt cost keeps the suites fast.
        hash_cost: 4,
        production: false,
    }
}

pub fn build_state(pool: PgPool) -> AppState {
    let config = test_auth_config();
    let codec = TokenCodec::new(
        &config.access_secret,
        config.access_lifetime,
        &config.refresh_secret,
        config.refresh_lifetime,
    );
    AppState::new(pool, codec, config)
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct SeededUser {
    pub user_id: i64,
    pub email: String,
    pub password: String,
}

#[allow(dead_code)]
pub async fn seed_test_user(pool: &PgPool, role: &str, is_active: bool) -> Result<SeededUser> {
    let email = "user@example.com".to_string();
    let password = "CorrectHorseBatteryStaple!".to_string();
    let password_hash = bcrypt::hash(&password, 4)?;

    let (user_id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (name, email, password_hash, role, is_active)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind("Test User")
    .bind(&email)
    .bind(&password_hash)
    .bind(role)
    .bind(is_active)
    .fetch_one(pool)
    .await?;

    Ok(SeededUser {
        user_id,
        email,
        password,
    })
}

#[allow(dead_code)]
pub async fn read_json(response: axum::response::Response) -> Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[allow(dead_code)]
pub async fn refresh_token_count(pool: &PgPool, user_id: i64) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

fn env_flag_enabled(key: &str) -> bool {
    matches!(env::var(key), Ok(value) if is_truthy(value.as_str()))
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}
