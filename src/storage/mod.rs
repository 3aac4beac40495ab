//! Storage backends for proposals and votes
//!
//! Every backend must provide two guarantees the services rely on:
//! - a uniqueness constraint on (proposal, member) for votes, reported as
//!   [`StoreError::UniqueViolation`];
//! - conditional writes that check proposal status inside the same atomic
//!   operation as the write (`close_if_open`, `insert_vote`, `update_vote`).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::governance::{
    ChoiceCounts, Choice, MemberId, Proposal, ProposalId, ProposalStatus, Vote,
};
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a storage backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Backend unreachable or the statement failed for another reason
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Input for a new proposal. Status is always `open` at insertion.
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub title: String,
    pub body: String,
}

/// Input for a vote insert or an in-place vote change
#[derive(Debug, Clone)]
pub struct VoteInput {
    pub proposal_id: ProposalId,
    pub member_id: MemberId,
    pub choice: Choice,
    pub notes: String,
}

/// Result of the open -> closed compare-and-set
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Closed(Proposal),
    NotOpen(ProposalStatus),
    Missing,
}

/// Result of a vote write guarded by proposal openness
#[derive(Debug, Clone, PartialEq)]
pub enum VoteWrite {
    Written(Vote),
    ProposalNotOpen,
    ProposalMissing,
    /// Update only: the member has no vote on this proposal
    VoteMissing,
}

/// Bounded window over a vote listing. `limit: None` is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Storage contract shared by the PostgreSQL and in-memory backends
#[async_trait]
pub trait GovernanceStore: Send + Sync {
    /// Short name for health reporting
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    async fn insert_proposal(&self, proposal: NewProposal) -> StoreResult<Proposal>;

    async fn proposal(&self, id: ProposalId) -> StoreResult<Option<Proposal>>;

    /// All proposals, newest first
    async fn proposals(&self) -> StoreResult<Vec<Proposal>>;

    /// Transition `open -> closed` atomically; reports why nothing changed otherwise
    async fn close_if_open(&self, id: ProposalId) -> StoreResult<CloseOutcome>;

    /// Insert a vote only while the proposal is open.
    /// A second vote for the same pair fails with `UniqueViolation`.
    async fn insert_vote(&self, vote: VoteInput) -> StoreResult<VoteWrite>;

    /// Overwrite choice and notes of an existing vote only while the proposal is open
    async fn update_vote(&self, change: VoteInput) -> StoreResult<VoteWrite>;

    async fn vote(&self, proposal_id: ProposalId, member_id: MemberId) -> StoreResult<Option<Vote>>;

    /// Votes on a proposal in creation order
    async fn votes(&self, proposal_id: ProposalId, page: Page) -> StoreResult<Vec<Vote>>;

    async fn choice_counts(&self, proposal_id: ProposalId) -> StoreResult<ChoiceCounts>;
}
