//! Admin account storage: bcrypt password hashes and TOTP enrolment state.

use sqlx::PgPool;
use tracing::info;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminAccount {
    pub username: String,
    pub password_hash: String,
    pub totp_secret: Option<String>,
    pub totp_enabled: bool,
}

pub async fn get_account(pool: &PgPool, username: &str) -> ApiResult<Option<AdminAccount>> {
    let account: Option<AdminAccount> = sqlx::query_as(
        "SELECT username, password_hash, totp_secret, totp_enabled FROM admin_accounts WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// Seed the default admin account on first boot. Idempotent: an existing
/// account (including a changed password or enrolled TOTP) is left alone.
pub async fn seed_default_admin(pool: &PgPool, username: &str, password: &str) -> ApiResult<()> {
    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))?;

    let result = sqlx::query(
        r#"
        INSERT INTO admin_accounts (username, password_hash)
        VALUES ($1, $2)
        ON CONFLICT (username) DO NOTHING
        "#,
    )
    .bind(username)
    .bind(&hash)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        info!(username, "seeded default admin account");
    }
    Ok(())
}

/// Persist the verified TOTP secret and mark the account enrolled.
pub async fn enable_totp(pool: &PgPool, username: &str, secret: &str) -> ApiResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE admin_accounts
        SET totp_secret = $1, totp_enabled = TRUE, updated_at = NOW()
        WHERE username = $2
        "#,
    )
    .bind(secret)
    .bind(username)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Admin account {username}")));
    }
    Ok(())
}

pub async fn update_password(pool: &PgPool, username: &str, new_password: &str) -> ApiResult<()> {
    let hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))?;

    let result = sqlx::query(
        "UPDATE admin_accounts SET password_hash = $1, updated_at = NOW() WHERE username = $2",
    )
    .bind(&hash)
    .bind(username)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Admin account {username}")));
    }
    Ok(())
}

/// Constant-cost bcrypt verification, mapped away from the raw library error.
pub fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| ApiError::Internal(format!("password verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        // MIN_COST keeps the test fast; production paths use DEFAULT_COST.
        // bcrypt doesn't export its MIN_COST (4), so mirror it here.
        const MIN_COST: u32 = 4;
        let hash = bcrypt::hash("correct horse", MIN_COST).expect("hash");
        assert!(verify_password("correct horse", &hash).expect("verify"));
        assert!(!verify_password("wrong horse", &hash).expect("verify"));
    }
}
