//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::auth::MemberAuth;
use crate::config::Settings;
use crate::governance::{ProposalService, RosterProvider, TallyEngine, VoteService};
use crate::storage::GovernanceStore;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Storage backend, kept for health checks
    pub store: Arc<dyn GovernanceStore>,

    /// Proposal lifecycle
    pub proposals: ProposalService,

    /// One-member-one-vote writes and reads
    pub votes: VoteService,

    /// Live tallies
    pub tally: TallyEngine,

    /// Member authentication
    pub auth: MemberAuth,

    /// Cap on the `limit` of a vote listing
    pub votes_max_page: u32,
}

impl AppState {
    /// Wire the governance services onto one store and roster
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        roster: Arc<dyn RosterProvider>,
        settings: &Settings,
    ) -> Self {
        let proposals = ProposalService::new(store.clone());
        let votes = VoteService::new(store.clone(), proposals.clone());
        let tally = TallyEngine::new(store.clone(), proposals.clone(), roster);

        Self {
            store,
            proposals,
            votes,
            tally,
            auth: MemberAuth::new(&settings.auth),
            votes_max_page: settings.governance.votes_max_page,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
