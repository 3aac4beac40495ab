//! JWT token validation
//!
//! Tokens are issued by the member directory; this service only verifies them.

use crate::error::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (member ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Decode and validate a JWT token
pub fn decode_token(token: &str, key: &DecodingKey) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(token, key, &Validation::new(Algorithm::HS256))
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Unauthorized("Token expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                AppError::Unauthorized("Invalid token".to_string())
            }
            _ => AppError::Unauthorized(format!("Token validation failed: {}", e)),
        })?;

    Ok(token_data.claims)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    /// Sign a token the way the member directory does
    pub(crate) fn mint(secret: &str, sub: &str, ttl_minutes: i64) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_valid_token() {
        let token = mint("k", "5", 15);
        let claims = decode_token(&token, &DecodingKey::from_secret(b"k")).unwrap();
        assert_eq!(claims.sub, "5");
    }

    #[test]
    fn test_expired_token_rejected() {
        // Well past the default 60s leeway
        let token = mint("k", "5", -10);
        let err = decode_token(&token, &DecodingKey::from_secret(b"k")).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "Token expired"));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(decode_token("not-a-jwt", &DecodingKey::from_secret(b"k")).is_err());
    }
}
