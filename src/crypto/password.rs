use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;

use crate::error::AppError;

/// Argon2id work factor.
#[derive(Debug, Clone, Copy)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashParams {
    /// Check the work factor against argon2's limits.
    pub fn argon2_params(&self) -> Result<Params, argon2::Error> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
    }

    fn hasher(&self) -> Result<Argon2<'static>, AppError> {
        let params = self
            .argon2_params()
            .map_err(|e| AppError::Crypto(format!("Invalid hash parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> [u8; 16] {
    rand::thread_rng().gen()
}

/// Hash a password with Argon2id into a PHC string (salt and params embedded)
pub fn hash_password(password: &str, params: &HashParams) -> Result<String, AppError> {
    let salt = SaltString::encode_b64(&generate_salt())
        .map_err(|e| AppError::Crypto(format!("Salt encoding failed: {}", e)))?;

    let hash = params
        .hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Crypto(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string.
///
/// The comparison runs with the work factor recorded in the hash, so hashes
/// made under an older configuration keep verifying.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| AppError::Crypto(format!("Invalid stored hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(e) => Err(AppError::Crypto(format!("Password verification failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: HashParams = HashParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn test_hash_verify() {
        let password = "test_password_123";

        let hash = hash_password(password, &FAST).unwrap();
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted_and_hides_plaintext() {
        let first = hash_password("pw1", &FAST).unwrap();
        let second = hash_password("pw1", &FAST).unwrap();

        assert_ne!(first, second);
        assert!(!first.contains("pw1"));
        assert!(first.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify_uses_params_from_hash() {
        let stronger = HashParams {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        };
        let hash = hash_password("pw1", &stronger).unwrap();
        assert!(verify_password("pw1", &hash).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(matches!(
            verify_password("pw1", "not-a-phc-string"),
            Err(AppError::Crypto(_))
        ));
    }
}
