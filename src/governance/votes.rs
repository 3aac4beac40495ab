//! Vote service
//!
//! One vote per (proposal, member). The existence pre-check only buys a clean
//! `AlreadyVoted` on the common path; the storage unique constraint decides,
//! and its violation is translated to the same conflict.

use crate::error::{conflict_error, not_found_error, validation_error, ApiResult, ConflictKind};
use crate::governance::{Choice, MemberId, ProposalId, ProposalService, Vote};
use crate::storage::{GovernanceStore, Page, StoreError, VoteInput, VoteWrite};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct VoteService {
    store: Arc<dyn GovernanceStore>,
    proposals: ProposalService,
}

impl VoteService {
    pub fn new(store: Arc<dyn GovernanceStore>, proposals: ProposalService) -> Self {
        Self { store, proposals }
    }

    /// Cast a member's vote on an open proposal
    pub async fn create(
        &self,
        proposal_id: ProposalId,
        member_id: MemberId,
        choice: &str,
        notes: Option<&str>,
    ) -> ApiResult<Vote> {
        let choice = parse_choice(choice)?;
        self.ensure_open(proposal_id).await?;

        if self.store.vote(proposal_id, member_id).await?.is_some() {
            debug!("Member {} already voted on proposal {}", member_id, proposal_id);
            return Err(conflict_error(ConflictKind::AlreadyVoted));
        }

        let write = self
            .store
            .insert_vote(VoteInput {
                proposal_id,
                member_id,
                choice,
                notes: notes.unwrap_or_default().to_string(),
            })
            .await;

        match write {
            Ok(write) => {
                let vote = written(proposal_id, write)?;
                info!(
                    "Member {} voted '{}' on proposal {}",
                    member_id, vote.choice, proposal_id
                );
                Ok(vote)
            }
            Err(StoreError::UniqueViolation(detail)) => {
                // A concurrent request got past the pre-check first
                warn!(
                    "Duplicate vote by member {} on proposal {} rejected by storage: {}",
                    member_id, proposal_id, detail
                );
                Err(conflict_error(ConflictKind::AlreadyVoted))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Change choice and notes of an existing vote while the proposal is open
    pub async fn update(
        &self,
        proposal_id: ProposalId,
        member_id: MemberId,
        choice: &str,
        notes: Option<&str>,
    ) -> ApiResult<Vote> {
        let choice = parse_choice(choice)?;
        self.ensure_open(proposal_id).await?;

        // Openness is checked again inside the write itself
        let write = self
            .store
            .update_vote(VoteInput {
                proposal_id,
                member_id,
                choice,
                notes: notes.unwrap_or_default().to_string(),
            })
            .await?;

        let vote = match write {
            VoteWrite::VoteMissing => {
                return Err(not_found_error(format!(
                    "No vote by member {} on proposal {}",
                    member_id, proposal_id
                )))
            }
            other => written(proposal_id, other)?,
        };
        info!(
            "Member {} changed vote on proposal {} to '{}'",
            member_id, proposal_id, vote.choice
        );
        Ok(vote)
    }

    /// A member's vote on a proposal
    pub async fn get(&self, proposal_id: ProposalId, member_id: MemberId) -> ApiResult<Vote> {
        self.store
            .vote(proposal_id, member_id)
            .await?
            .ok_or_else(|| {
                not_found_error(format!(
                    "No vote by member {} on proposal {}",
                    member_id, proposal_id
                ))
            })
    }

    /// Votes on a proposal in the order they were cast
    pub async fn list(&self, proposal_id: ProposalId, page: Page) -> ApiResult<Vec<Vote>> {
        Ok(self.store.votes(proposal_id, page).await?)
    }

    async fn ensure_open(&self, proposal_id: ProposalId) -> ApiResult<()> {
        let proposal = self.proposals.get(proposal_id).await?;
        if !proposal.status.is_open() {
            return Err(conflict_error(ConflictKind::ProposalClosed));
        }
        Ok(())
    }
}

fn parse_choice(raw: &str) -> ApiResult<Choice> {
    raw.parse::<Choice>().map_err(validation_error)
}

fn written(proposal_id: ProposalId, write: VoteWrite) -> ApiResult<Vote> {
    match write {
        VoteWrite::Written(vote) => Ok(vote),
        VoteWrite::ProposalNotOpen => Err(conflict_error(ConflictKind::ProposalClosed)),
        VoteWrite::ProposalMissing => {
            Err(not_found_error(format!("Proposal {} not found", proposal_id)))
        }
        VoteWrite::VoteMissing => Err(not_found_error("vote not found")),
    }
}
