//! JSON Web Token issuance and verification.
//!
//! Tokens are HS256-signed and carry the user id in `sub` along with the
//! email and display name for clients that decode them.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, name: String, expiry_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            email,
            name,
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours)).timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Token generation failed: {0}")]
    Generation(String),
}

/// Signs and verifies tokens with a single shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: i64,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("expiry_hours", &self.expiry_hours)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        }
    }

    pub fn expiry_hours(&self) -> i64 {
        self.expiry_hours
    }

    /// Issue a token for the given user.
    pub fn issue(&self, user_id: Uuid, email: &str, name: &str) -> Result<String, JwtError> {
        let claims = Claims::new(user_id, email.to_string(), name.to_string(), self.expiry_hours);
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::Generation(e.to_string()))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-with-plenty-of-bytes";

    #[test]
    fn issued_token_verifies() {
        let keys = JwtKeys::new(SECRET, 24);
        let user_id = Uuid::new_v4();

        let token = keys.issue(user_id, "ana@example.com", "Ana").unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.name, "Ana");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = JwtKeys::new(SECRET, 24)
            .issue(Uuid::new_v4(), "a@b.co", "A")
            .unwrap();
        let other = JwtKeys::new("a-completely-different-secret-value!!", 24);

        assert!(matches!(other.verify(&token), Err(JwtError::Invalid)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = JwtKeys::new(SECRET, 24);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@b.co".to_string(),
            name: "A".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = keys.sign(&claims).unwrap();

        assert!(matches!(keys.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn garbage_is_rejected() {
        let keys = JwtKeys::new(SECRET, 24);
        assert!(matches!(keys.verify("not.a.token"), Err(JwtError::Invalid)));
        assert!(matches!(keys.verify(""), Err(JwtError::Invalid)));
    }
}
