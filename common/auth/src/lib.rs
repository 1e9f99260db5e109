pub mod claims;
pub mod codec;
pub mod error;
pub mod extractors;
pub mod guards;

pub use claims::{Claims, Role};
pub use codec::{compute_expiry, parse_duration, TokenCodec, TokenSubject};
pub use error::{AuthError, AuthResult};
pub use extractors::{AuthContext, OptionalAuthContext};
pub use guards::{ensure_role, require_identity};
