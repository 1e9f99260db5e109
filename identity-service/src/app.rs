use std::sync::Arc;

use axum::extract::FromRef;
use common_auth::TokenCodec;
use sqlx::PgPool;

use crate::config::AuthConfig;
use crate::ledger::RefreshTokenLedger;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub codec: Arc<TokenCodec>,
    pub config: Arc<AuthConfig>,
    pub ledger: RefreshTokenLedger,
}

impl AppState {
    pub fn new(db: PgPool, codec: TokenCodec, config: AuthConfig) -> Self {
        Self {
            ledger: RefreshTokenLedger::new(db.clone()),
            db,
            codec: Arc::new(codec),
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Arc<TokenCodec> {
    fn from_ref(state: &AppState) -> Self {
        state.codec.clone()
    }
}

impl FromRef<AppState> for Arc<AuthConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
