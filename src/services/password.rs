//! Password hashing module
//!
//! Passwords are stored as bcrypt hashes (`$2b$`), cost 10, so rows written
//! by earlier deployments of the CMS keep validating.

use anyhow::{Context, Result};

/// bcrypt work factor for new hashes
pub const BCRYPT_COST: u32 = 10;

/// Hash a password with bcrypt and a random salt.
///
/// # Errors
///
/// Returns an error if password hashing fails
///
/// # Example
///
/// ```ignore
/// use cms_server::services::password::hash_password;
///
/// let hash = hash_password("my_secure_password")?;
/// assert!(hash.starts_with("$2b$10$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, BCRYPT_COST).context("Password hashing failed")
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` on a mismatch.
///
/// # Errors
///
/// Returns an error if the stored hash is not a valid bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).context("Password verification error")
}

/// Well-formed cost-10 hash verified on the unknown-account path, so a miss
/// costs the same bcrypt work as a wrong password.
const DUMMY_HASH: &str = "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

/// Run a full bcrypt verification whose result is discarded
pub fn verify_dummy(password: &str) {
    let _ = bcrypt::verify(password, DUMMY_HASH);
}
