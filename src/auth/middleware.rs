//! Authentication middleware
//!
//! Resolves the acting member and stores it in request extensions.

use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Require an authenticated member; handlers read it via `Extension<MemberId>`
pub async fn require_member(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let member = state.auth.authenticate(request.headers())?;

    // Insert member into request extensions for handlers to use
    request.extensions_mut().insert(member);

    Ok(next.run(request).await)
}
