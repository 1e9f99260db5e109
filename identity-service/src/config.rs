use anyhow::{anyhow, Result};
use chrono::Duration;
use std::env;
use tracing::warn;

use common_auth::codec::parse_duration;

const DEV_ACCESS_SECRET: &str = "dev-access-secret-change-me";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-me";

const DEFAULT_ACCESS_LIFETIME: &str = "15m";
const DEFAULT_REFRESH_LIFETIME: &str = "7d";
const DEFAULT_HASH_COST: u32 = 12;

/// Authentication configuration, built from the environment exactly once at
/// startup and injected into the codec and handlers. Business logic never
/// reads process-wide state.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_lifetime: Duration,
    pub refresh_lifetime: Duration,
    pub hash_cost: u32,
    pub production: bool,
}

pub fn load_auth_config() -> Result<AuthConfig> {
    let production = env::var("APP_ENV")
        .map(|value| value.trim().eq_ignore_ascii_case("production"))
        .unwrap_or(false);

    let access_secret = resolve_secret(
        "AUTH_ACCESS_SECRET",
        env::var("AUTH_ACCESS_SECRET").ok(),
        DEV_ACCESS_SECRET,
        production,
    )?;
    let refresh_secret = resolve_secret(
        "AUTH_REFRESH_SECRET",
        env::var("AUTH_REFRESH_SECRET").ok(),
        DEV_REFRESH_SECRET,
        production,
    )?;

    if production && access_secret == refresh_secret {
        return Err(anyhow!(
            "AUTH_ACCESS_SECRET and AUTH_REFRESH_SECRET must differ in production"
        ));
    }

    let access_lifetime = resolve_lifetime(
        "AUTH_ACCESS_LIFETIME",
        env::var("AUTH_ACCESS_LIFETIME").ok(),
        DEFAULT_ACCESS_LIFETIME,
    )?;
    let refresh_lifetime = resolve_lifetime(
        "AUTH_REFRESH_LIFETIME",
        env::var("AUTH_REFRESH_LIFETIME").ok(),
        DEFAULT_REFRESH_LIFETIME,
    )?;

    let hash_cost = resolve_hash_cost(env::var("AUTH_HASH_COST").ok())?;

    Ok(AuthConfig {
        access_secret,
        refresh_secret,
        access_lifetime,
        refresh_lifetime,
        hash_cost,
        production,
    })
}

fn resolve_secret(
    key: &'static str,
    value: Option<String>,
    dev_fallback: &str,
    production: bool,
) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ if production => Err(anyhow!("{key} must be set in production")),
        _ => {
            warn!(key, "secret not configured, using development fallback");
            Ok(dev_fallback.to_string())
        }
    }
}

fn resolve_lifetime(key: &'static str, value: Option<String>, default: &str) -> Result<Duration> {
    let raw = value.unwrap_or_else(|| default.to_string());
    parse_duration(&raw).map_err(|err| anyhow!("Failed to parse {key}: {err}"))
}

fn resolve_hash_cost(value: Option<String>) -> Result<u32> {
    let cost = match value {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|err| anyhow!("Failed to parse AUTH_HASH_COST: {err}"))?,
        None => DEFAULT_HASH_COST,
    };

    // bcrypt only accepts costs in this range.
    if !(4..=31).contains(&cost) {
        return Err(anyhow!("AUTH_HASH_COST must be between 4 and 31, got {cost}"));
    }
    Ok(cost)
}
