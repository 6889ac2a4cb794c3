use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Claims carried by a session token.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    username: String,
    /// Issued at (Unix timestamp)
    iat: i64,
}

/// Mints and checks stateless HS256 session tokens.
///
/// Tokens carry no expiry: a token stays valid for as long as the signing
/// key is unchanged.
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionIssuer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, username: &str) -> Result<String, AppError> {
        let claims = SessionClaims {
            username: username.to_string(),
            iat: chrono::Utc::now().timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Crypto(format!("Failed to sign token: {}", e)))
    }

    /// Recover the username a token was issued for.
    pub fn verify(&self, token: &str) -> Result<String, AppError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| AppError::InvalidToken(format!("Token rejected: {}", e)))?;

        Ok(data.claims.username)
    }
}
