//! Member authentication boundary
//!
//! Resolves the acting member from a bearer token or, behind a trusted
//! gateway, from the `X-User-Id` header. The governance core only ever sees
//! the resulting [`MemberId`].

mod jwt;
mod middleware;

pub use middleware::require_member;

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::governance::MemberId;
use axum::http::HeaderMap;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::DecodingKey;

/// Header a trusted gateway uses to pass the member id
pub const USER_ID_HEADER: &str = "x-user-id";

/// How requests prove which member is acting
#[derive(Clone)]
pub struct MemberAuth {
    decoding_key: Option<DecodingKey>,
    trust_user_header: bool,
}

impl MemberAuth {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            decoding_key: config
                .jwt_secret
                .as_ref()
                .map(|secret| DecodingKey::from_secret(secret.as_bytes())),
            trust_user_header: config.trust_user_header,
        }
    }

    /// Resolve the acting member from request headers
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<MemberId, AppError> {
        if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
            let key = self
                .decoding_key
                .as_ref()
                .ok_or_else(|| AppError::Unauthorized("Bearer tokens are not accepted".to_string()))?;
            let claims = jwt::decode_token(bearer.token(), key)?;
            return parse_member_id(&claims.sub);
        }

        if self.trust_user_header {
            if let Some(raw) = headers.get(USER_ID_HEADER) {
                let raw = raw
                    .to_str()
                    .map_err(|_| AppError::Unauthorized("Invalid member header".to_string()))?;
                return parse_member_id(raw);
            }
        }

        Err(AppError::Unauthorized("Missing member credentials".to_string()))
    }
}

fn parse_member_id(raw: &str) -> Result<MemberId, AppError> {
    match raw.trim().parse::<i32>() {
        Ok(id) if id > 0 => Ok(MemberId(id)),
        _ => Err(AppError::Unauthorized("Invalid member id".to_string())),
    }
}
