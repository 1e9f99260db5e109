use crate::claims::Role;
use crate::error::{AuthError, AuthResult};
use crate::extractors::{AuthContext, OptionalAuthContext};

/// Passes when the verified identity holds one of the allowed roles. An
/// empty allow-list means any authenticated identity passes.
pub fn ensure_role(auth: &AuthContext, allowed: &[Role]) -> AuthResult<()> {
    if allowed.is_empty() || allowed.contains(&auth.claims.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            required: allowed.to_vec(),
        })
    }
}

/// Resolves an optional identity, failing when none was attached.
pub fn require_identity(auth: &OptionalAuthContext) -> AuthResult<&AuthContext> {
    auth.identity().ok_or(AuthError::Unauthenticated)
}
