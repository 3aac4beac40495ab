//! Vote and tally route handlers
//!
//! Mounted under /api/proposals/{proposal_id}/votes.

use crate::error::{ApiResult, AppError};
use crate::governance::{MemberId, ProposalId, Tally, Vote};
use crate::models::{PageQuery, VoteRequest};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::extract::WithRejection;

/// GET /votes?limit=&offset=
pub async fn list_votes(
    State(state): State<SharedState>,
    WithRejection(Path(proposal_id), _): WithRejection<Path<ProposalId>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, AppError>,
) -> ApiResult<Json<Vec<Vote>>> {
    let page = query.into_page(state.votes_max_page)?;
    Ok(Json(state.votes.list(proposal_id, page).await?))
}

/// POST /votes
pub async fn create_vote(
    State(state): State<SharedState>,
    WithRejection(Path(proposal_id), _): WithRejection<Path<ProposalId>, AppError>,
    Extension(member): Extension<MemberId>,
    WithRejection(Json(payload), _): WithRejection<Json<VoteRequest>, AppError>,
) -> ApiResult<(StatusCode, Json<Vote>)> {
    let vote = state
        .votes
        .create(proposal_id, member, &payload.choice, payload.notes.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(vote)))
}

/// PUT /votes
pub async fn update_vote(
    State(state): State<SharedState>,
    WithRejection(Path(proposal_id), _): WithRejection<Path<ProposalId>, AppError>,
    Extension(member): Extension<MemberId>,
    WithRejection(Json(payload), _): WithRejection<Json<VoteRequest>, AppError>,
) -> ApiResult<Json<Vote>> {
    let vote = state
        .votes
        .update(proposal_id, member, &payload.choice, payload.notes.as_deref())
        .await?;
    Ok(Json(vote))
}

/// GET /votes/me
pub async fn my_vote(
    State(state): State<SharedState>,
    WithRejection(Path(proposal_id), _): WithRejection<Path<ProposalId>, AppError>,
    Extension(member): Extension<MemberId>,
) -> ApiResult<Json<Vote>> {
    Ok(Json(state.votes.get(proposal_id, member).await?))
}

/// GET /votes/tally
pub async fn get_tally(
    State(state): State<SharedState>,
    WithRejection(Path(proposal_id), _): WithRejection<Path<ProposalId>, AppError>,
) -> ApiResult<Json<Tally>> {
    Ok(Json(state.tally.get_tally(proposal_id).await?))
}
