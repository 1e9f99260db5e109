use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common_auth::{ensure_role, AuthContext, Role, TokenSubject};

use crate::error::{ServiceError, ServiceResult};
use crate::users::{self, User};
use crate::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairData {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileData {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageData {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UsersData {
    pub users: Vec<User>,
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionData>>), ServiceError> {
    let RegisterRequest {
        name,
        email,
        password,
    } = req;

    let email = users::normalize_email(&email);
    let password_hash = hash_password(password, state.config.hash_cost).await?;
    let user = users::insert_user(&state.db, &name, &email, &password_hash).await?;

    let (access_token, refresh_token) = issue_session(&state, &user).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(SessionData {
            user,
            access_token,
            refresh_token,
        })),
    ))
}

pub async fn login_user(
    State(state): State<AppState>,
    Json(login): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionData>>, ServiceError> {
    let LoginRequest { email, password } = login;
    let email = users::normalize_email(&email);

    let row = match users::find_credentials_by_email(&state.db, &email).await? {
        Some(row) => row,
        None => {
            warn!(email = %email, reason = "unknown_email", "login rejected");
            return Err(ServiceError::InvalidCredentials);
        }
    };

    if !row.is_active {
        // Logged distinctly, surfaced as plain invalid credentials so the
        // response does not reveal whether the account exists or is disabled.
        warn!(user_id = row.id, reason = "account_inactive", "login rejected");
        return Err(ServiceError::InvalidCredentials);
    }

    let password_hash = row.password_hash.clone();
    if !verify_password(password, password_hash).await? {
        warn!(user_id = row.id, reason = "password_mismatch", "login rejected");
        return Err(ServiceError::InvalidCredentials);
    }

    let user = row.into_user();
    let (access_token, refresh_token) = issue_session(&state, &user).await?;

    Ok(Json(ApiResponse::ok(SessionData {
        user,
        access_token,
        refresh_token,
    })))
}

pub async fn refresh_session(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenPairData>>, ServiceError> {
    let token = req.refresh_token;

    // Signature and expiry first: malformed input is rejected before any
    // storage I/O happens.
    let claims = state
        .codec
        .verify_refresh_token(&token)
        .ok_or(ServiceError::InvalidToken)?;

    let record = state
        .ledger
        .find_by_token(&token)
        .await?
        .ok_or_else(|| {
            debug!(
                user_id = claims.user_id,
                "refresh token absent from ledger (revoked or already rotated)"
            );
            ServiceError::InvalidToken
        })?;

    let now = Utc::now();
    if record.expires_at <= now {
        state.ledger.delete_by_id(record.id).await?;
        return Err(ServiceError::TokenExpired);
    }

    let user = users::find_by_id(&state.db, claims.user_id)
        .await?
        .ok_or(ServiceError::UserNotFound)?;

    let subject = token_subject(&user)?;
    let access_token = state.codec.issue_access_token(&subject)?;
    let new_refresh = state.codec.issue_refresh_token(&subject)?;
    let expires_at = now + state.codec.refresh_lifetime();

    let rotated = state
        .ledger
        .rotate(&record.token, user.id, &new_refresh, expires_at)
        .await?;
    if rotated.is_none() {
        // Lost a concurrent rotation race; the token was consumed elsewhere.
        debug!(user_id = user.id, "refresh token consumed concurrently");
        return Err(ServiceError::InvalidToken);
    }

    Ok(Json(ApiResponse::ok(TokenPairData {
        access_token,
        refresh_token: new_refresh,
    })))
}

pub async fn logout_user(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<MessageData>>, ServiceError> {
    let removed = state.ledger.delete_by_token(&req.refresh_token).await?;
    if !removed {
        debug!("logout for unknown refresh token, treating as success");
    }

    Ok(Json(ApiResponse::ok(MessageData {
        message: "logged out",
    })))
}

pub async fn profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<ProfileData>>, ServiceError> {
    // The token may outlive its account; a verified identity still has to
    // resolve to a live user row.
    let user = users::find_by_id(&state.db, auth.claims.user_id)
        .await?
        .ok_or(ServiceError::UserNotFound)?;

    Ok(Json(ApiResponse::ok(ProfileData { user })))
}

pub async fn list_users(State(state): State<AppState>, auth: AuthContext) -> Response {
    if let Err(err) = ensure_role(&auth, &[Role::Admin]) {
        return err.into_response();
    }

    match users::list_users(&state.db).await {
        Ok(users) => Json(ApiResponse::ok(UsersData { users })).into_response(),
        Err(err) => err.into_response(),
    }
}

fn token_subject(user: &User) -> ServiceResult<TokenSubject> {
    let role = Role::parse(&user.role).ok_or_else(|| {
        ServiceError::internal(format!("unknown role '{}' for user {}", user.role, user.id))
    })?;

    Ok(TokenSubject {
        user_id: user.id,
        email: user.email.clone(),
        role,
    })
}

/// Issues an access/refresh pair and persists the refresh token, expiring
/// the ledger record at now + refresh lifetime.
async fn issue_session(state: &AppState, user: &User) -> ServiceResult<(String, String)> {
    let subject = token_subject(user)?;
    let access_token = state.codec.issue_access_token(&subject)?;
    let refresh_token = state.codec.issue_refresh_token(&subject)?;

    let expires_at = Utc::now() + state.codec.refresh_lifetime();
    state
        .ledger
        .store(user.id, &refresh_token, expires_at)
        .await?;

    Ok((access_token, refresh_token))
}

/// Password hashing is CPU-bound; both directions run on the blocking pool
/// so they cannot stall the request executor.
async fn hash_password(password: String, cost: u32) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|err| ServiceError::internal(err.to_string()))?
        .map_err(|err| ServiceError::internal(err.to_string()))
}

async fn verify_password(password: String, hash: String) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|err| ServiceError::internal(err.to_string()))?
        .map_err(|err| ServiceError::internal(err.to_string()))
}
