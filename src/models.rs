//! Request DTOs (Data Transfer Objects)
//!
//! Request bodies and query strings accepted by the API. Responses are the
//! governance records themselves.

use crate::error::AppError;
use crate::storage::Page;
use serde::Deserialize;
use validator::Validate;

/// Request to open a new proposal
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProposalRequest {
    #[validate(length(min = 1, message = "title required"))]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

/// Request to cast or change a vote
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    /// Parsed by the vote service so unknown values surface as validation errors
    pub choice: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `?limit=&offset=` on vote listings
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Check bounds and cap `limit` at `max`
    pub fn into_page(self, max: u32) -> Result<Page, AppError> {
        let limit = match self.limit {
            Some(limit) if limit <= 0 => {
                return Err(AppError::BadRequest("limit must be positive".to_string()))
            }
            Some(limit) => Some(limit.min(i64::from(max)) as u32),
            None => None,
        };
        let offset = match self.offset {
            Some(offset) if offset < 0 => {
                return Err(AppError::BadRequest("offset must not be negative".to_string()))
            }
            Some(offset) => u32::try_from(offset)
                .map_err(|_| AppError::BadRequest("offset is too large".to_string()))?,
            None => 0,
        };
        Ok(Page { limit, offset })
    }
}
