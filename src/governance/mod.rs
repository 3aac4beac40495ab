//! Governance core - the heart of the service
//!
//! Proposal lifecycle, one-vote-per-member voting, and live tallies.

mod models;
mod proposals;
mod roster;
mod tally;
mod votes;

pub use models::*;
pub use proposals::ProposalService;
pub use roster::{FixedRoster, MemberRoster, RosterProvider};
pub use tally::TallyEngine;
pub use votes::VoteService;
