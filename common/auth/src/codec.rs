use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use crate::claims::{Claims, ClaimsRepr, Role};
use crate::error::{AuthError, AuthResult};

/// Identity snapshot embedded into issued tokens.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenKeys {
    fn from_secret(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }
}

/// Stateless signer/verifier for access and refresh tokens.
///
/// Access and refresh tokens are signed with independent secrets, so a leak
/// of one cannot be used to mint tokens of the other kind.
pub struct TokenCodec {
    access: TokenKeys,
    refresh: TokenKeys,
}

impl TokenCodec {
    pub fn new(
        access_secret: &str,
        access_lifetime: Duration,
        refresh_secret: &str,
        refresh_lifetime: Duration,
    ) -> Self {
        Self {
            access: TokenKeys::from_secret(access_secret, access_lifetime),
            refresh: TokenKeys::from_secret(refresh_secret, refresh_lifetime),
        }
    }

    pub fn access_lifetime(&self) -> Duration {
        self.access.lifetime
    }

    pub fn refresh_lifetime(&self) -> Duration {
        self.refresh.lifetime
    }

    pub fn issue_access_token(&self, subject: &TokenSubject) -> AuthResult<String> {
        Self::issue(&self.access, subject)
    }

    pub fn issue_refresh_token(&self, subject: &TokenSubject) -> AuthResult<String> {
        Self::issue(&self.refresh, subject)
    }

    /// Returns the verified payload, or `None` for any malformed, expired,
    /// or wrongly-signed token. Failures are logged, never escalated.
    pub fn verify_access_token(&self, token: &str) -> Option<Claims> {
        Self::verify(&self.access, token, "access")
    }

    pub fn verify_refresh_token(&self, token: &str) -> Option<Claims> {
        Self::verify(&self.refresh, token, "refresh")
    }

    fn issue(keys: &TokenKeys, subject: &TokenSubject) -> AuthResult<String> {
        let now = Utc::now();
        let claims = ClaimsRepr {
            sub: subject.user_id.to_string(),
            email: subject.email.clone(),
            role: subject.role,
            iat: now.timestamp(),
            exp: (now + keys.lifetime).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    fn verify(keys: &TokenKeys, token: &str, kind: &'static str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = match decode::<ClaimsRepr>(token, &keys.decoding, &validation) {
            Ok(data) => data,
            Err(err) => {
                debug!(kind, error = %err, "token verification failed");
                return None;
            }
        };

        match Claims::try_from(data.claims) {
            Ok(claims) => Some(claims),
            Err(err) => {
                debug!(kind, error = %err, "token payload rejected");
                None
            }
        }
    }
}

/// Parses a duration expression of the form `<integer><unit>` with unit
/// `s`, `m`, `h`, or `d`.
pub fn parse_duration(spec: &str) -> AuthResult<Duration> {
    let trimmed = spec.trim();
    let mut chars = trimmed.chars();
    let unit = chars
        .next_back()
        .ok_or_else(|| AuthError::InvalidDurationFormat(spec.to_string()))?;

    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::InvalidDurationFormat(spec.to_string()));
    }
    let value = digits
        .parse::<i64>()
        .map_err(|_| AuthError::InvalidDurationFormat(spec.to_string()))?;

    match unit {
        's' => Ok(Duration::seconds(value)),
        'm' => Ok(Duration::minutes(value)),
        'h' => Ok(Duration::hours(value)),
        'd' => Ok(Duration::days(value)),
        _ => Err(AuthError::InvalidDurationFormat(spec.to_string())),
    }
}

/// Resolves a duration expression against a fixed instant.
pub fn compute_expiry(from: DateTime<Utc>, spec: &str) -> AuthResult<DateTime<Utc>> {
    Ok(from + parse_duration(spec)?)
}
