//! Proposal service
//!
//! Owns proposal identity and the one-way `open -> closed` transition.

use crate::error::{conflict_error, not_found_error, validation_error, ApiResult, ConflictKind};
use crate::governance::{Proposal, ProposalId};
use crate::storage::{CloseOutcome, GovernanceStore, NewProposal};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ProposalService {
    store: Arc<dyn GovernanceStore>,
}

impl ProposalService {
    pub fn new(store: Arc<dyn GovernanceStore>) -> Self {
        Self { store }
    }

    /// Create a new open proposal
    pub async fn create(&self, title: &str, body: Option<&str>) -> ApiResult<Proposal> {
        let title = title.trim();
        if title.is_empty() {
            return Err(validation_error("title required"));
        }

        let proposal = self
            .store
            .insert_proposal(NewProposal {
                title: title.to_string(),
                body: body.unwrap_or_default().to_string(),
            })
            .await?;

        info!("Created proposal {} '{}'", proposal.id, proposal.title);
        Ok(proposal)
    }

    /// Get a proposal by ID
    pub async fn get(&self, id: ProposalId) -> ApiResult<Proposal> {
        self.store
            .proposal(id)
            .await?
            .ok_or_else(|| not_found_error(format!("Proposal {} not found", id)))
    }

    /// List all proposals, newest first
    pub async fn list(&self) -> ApiResult<Vec<Proposal>> {
        Ok(self.store.proposals().await?)
    }

    /// Close an open proposal. Runs as one compare-and-set in storage, so of
    /// two concurrent closers exactly one succeeds.
    pub async fn close(&self, id: ProposalId) -> ApiResult<Proposal> {
        match self.store.close_if_open(id).await? {
            CloseOutcome::Closed(proposal) => {
                info!("Closed proposal {}", id);
                Ok(proposal)
            }
            CloseOutcome::NotOpen(status) => {
                debug!("Refused to close proposal {} in status {}", id, status);
                Err(conflict_error(ConflictKind::AlreadyClosed))
            }
            CloseOutcome::Missing => Err(not_found_error(format!("Proposal {} not found", id))),
        }
    }
}
