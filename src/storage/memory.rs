//! In-memory governance store
//!
//! Arena of proposals and votes keyed by id, plus a unique index on
//! (proposal, member). Every write runs under one write lock, which gives the
//! same atomic conditional-write contract as the PostgreSQL backend.

use super::{
    CloseOutcome, GovernanceStore, NewProposal, Page, StoreError, StoreResult, VoteInput,
    VoteWrite,
};
use crate::governance::{
    ChoiceCounts, MemberId, Proposal, ProposalId, ProposalStatus, Vote, VoteId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Arena {
    next_proposal_id: ProposalId,
    next_vote_id: VoteId,
    proposals: BTreeMap<ProposalId, Proposal>,
    votes: BTreeMap<VoteId, Vote>,
    /// (proposal, member) -> vote id
    ballot_index: HashMap<(ProposalId, MemberId), VoteId>,
}

impl Arena {
    fn status_of(&self, id: ProposalId) -> Option<ProposalStatus> {
        self.proposals.get(&id).map(|p| p.status)
    }
}

/// Thread-safe in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    arena: Arc<RwLock<Arena>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GovernanceStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_proposal(&self, proposal: NewProposal) -> StoreResult<Proposal> {
        let mut arena = self.arena.write().await;
        arena.next_proposal_id += 1;
        let record = Proposal {
            id: arena.next_proposal_id,
            title: proposal.title,
            body: proposal.body,
            status: ProposalStatus::Open,
            created_at: Utc::now(),
        };
        arena.proposals.insert(record.id, record.clone());
        Ok(record)
    }

    async fn proposal(&self, id: ProposalId) -> StoreResult<Option<Proposal>> {
        let arena = self.arena.read().await;
        Ok(arena.proposals.get(&id).cloned())
    }

    async fn proposals(&self) -> StoreResult<Vec<Proposal>> {
        let arena = self.arena.read().await;
        Ok(arena.proposals.values().rev().cloned().collect())
    }

    async fn close_if_open(&self, id: ProposalId) -> StoreResult<CloseOutcome> {
        let mut arena = self.arena.write().await;
        let Some(proposal) = arena.proposals.get_mut(&id) else {
            return Ok(CloseOutcome::Missing);
        };
        if !proposal.status.is_open() {
            return Ok(CloseOutcome::NotOpen(proposal.status));
        }
        proposal.status = ProposalStatus::Closed;
        Ok(CloseOutcome::Closed(proposal.clone()))
    }

    async fn insert_vote(&self, vote: VoteInput) -> StoreResult<VoteWrite> {
        let mut arena = self.arena.write().await;
        match arena.status_of(vote.proposal_id) {
            None => return Ok(VoteWrite::ProposalMissing),
            Some(status) if !status.is_open() => return Ok(VoteWrite::ProposalNotOpen),
            Some(_) => {}
        }

        let key = (vote.proposal_id, vote.member_id);
        if arena.ballot_index.contains_key(&key) {
            return Err(StoreError::UniqueViolation(format!(
                "votes (proposal_id, member_id)=({}, {})",
                vote.proposal_id, vote.member_id
            )));
        }

        arena.next_vote_id += 1;
        let record = Vote {
            id: arena.next_vote_id,
            proposal_id: vote.proposal_id,
            member_id: vote.member_id,
            choice: vote.choice,
            notes: vote.notes,
            created_at: Utc::now(),
        };
        arena.ballot_index.insert(key, record.id);
        arena.votes.insert(record.id, record.clone());
        Ok(VoteWrite::Written(record))
    }

    async fn update_vote(&self, change: VoteInput) -> StoreResult<VoteWrite> {
        let mut arena = self.arena.write().await;
        match arena.status_of(change.proposal_id) {
            None => return Ok(VoteWrite::ProposalMissing),
            Some(status) if !status.is_open() => return Ok(VoteWrite::ProposalNotOpen),
            Some(_) => {}
        }

        let Some(vote_id) = arena
            .ballot_index
            .get(&(change.proposal_id, change.member_id))
            .copied()
        else {
            return Ok(VoteWrite::VoteMissing);
        };
        let vote = arena
            .votes
            .get_mut(&vote_id)
            .ok_or_else(|| StoreError::Unavailable(format!("ballot index points at missing vote {}", vote_id)))?;
        vote.choice = change.choice;
        vote.notes = change.notes;
        Ok(VoteWrite::Written(vote.clone()))
    }

    async fn vote(&self, proposal_id: ProposalId, member_id: MemberId) -> StoreResult<Option<Vote>> {
        let arena = self.arena.read().await;
        Ok(arena
            .ballot_index
            .get(&(proposal_id, member_id))
            .and_then(|id| arena.votes.get(id))
            .cloned())
    }

    async fn votes(&self, proposal_id: ProposalId, page: Page) -> StoreResult<Vec<Vote>> {
        let arena = self.arena.read().await;
        // Vote ids are allocated in insertion order, so id order is creation order.
        let matching = arena
            .votes
            .values()
            .filter(|v| v.proposal_id == proposal_id)
            .skip(page.offset as usize);
        let window: Vec<Vote> = match page.limit {
            Some(limit) => matching.take(limit as usize).cloned().collect(),
            None => matching.cloned().collect(),
        };
        Ok(window)
    }

    async fn choice_counts(&self, proposal_id: ProposalId) -> StoreResult<ChoiceCounts> {
        let arena = self.arena.read().await;
        let mut counts = ChoiceCounts::default();
        for vote in arena.votes.values().filter(|v| v.proposal_id == proposal_id) {
            counts.record(vote.choice, 1);
        }
        Ok(counts)
    }
}
