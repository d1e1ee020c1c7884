//! Admin authentication: opaque bearer tokens, bcrypt password checks and
//! TOTP-based two-factor login.

pub mod middleware;
pub mod session;

pub use middleware::{AuthContext, auth_middleware};
pub use session::{MemorySessionStore, Session, SessionStage, SessionStore};

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{ApiError, ApiResult};

const TOTP_ISSUER: &str = "Back Office";

/// Generate an opaque session token (32 random bytes, hex-encoded).
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    hex::encode(bytes)
}

/// Generate a fresh base32-encoded TOTP secret for enrolment.
pub fn generate_totp_secret() -> String {
    Secret::generate_secret().to_encoded().to_string()
}

/// Build the RFC-6238 verifier for a stored base32 secret. Six digits, 30s
/// step, one step of clock skew tolerated.
pub fn build_totp(secret_base32: &str, account: &str) -> ApiResult<TOTP> {
    let secret = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| ApiError::Internal(format!("invalid TOTP secret: {e:?}")))?;

    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret,
        Some(TOTP_ISSUER.to_string()),
        account.to_string(),
    )
    .map_err(|e| ApiError::Internal(format!("failed to build TOTP: {e}")))
}

/// Check a user-supplied TOTP code against a base32 secret.
pub fn verify_totp_code(secret_base32: &str, account: &str, code: &str) -> ApiResult<bool> {
    let totp = build_totp(secret_base32, account)?;
    totp.check_current(code)
        .map_err(|e| ApiError::Internal(format!("system clock error: {e}")))
}
