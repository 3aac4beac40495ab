//! Proposal route handlers

use crate::error::{validation_error, ApiResult, AppError};
use crate::governance::{Proposal, ProposalId};
use crate::models::CreateProposalRequest;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

/// GET /api/proposals
pub async fn list_proposals(State(state): State<SharedState>) -> ApiResult<Json<Vec<Proposal>>> {
    Ok(Json(state.proposals.list().await?))
}

/// POST /api/proposals
pub async fn create_proposal(
    State(state): State<SharedState>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateProposalRequest>, AppError>,
) -> ApiResult<(StatusCode, Json<Proposal>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let proposal = state
        .proposals
        .create(&payload.title, payload.body.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

/// GET /api/proposals/{id}
pub async fn get_proposal(
    State(state): State<SharedState>,
    WithRejection(Path(id), _): WithRejection<Path<ProposalId>, AppError>,
) -> ApiResult<Json<Proposal>> {
    Ok(Json(state.proposals.get(id).await?))
}

/// POST /api/proposals/{id}/close
pub async fn close_proposal(
    State(state): State<SharedState>,
    WithRejection(Path(id), _): WithRejection<Path<ProposalId>, AppError>,
) -> ApiResult<Json<Proposal>> {
    Ok(Json(state.proposals.close(id).await?))
}
