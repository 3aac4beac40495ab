//! Tally engine
//!
//! Derives quorum and outcome from proposal status and vote counts.
//! Nothing here is stored; every read recomputes from a point-in-time
//! snapshot of the counts.

use crate::error::ApiResult;
use crate::governance::{
    ChoiceCounts, Outcome, ProposalId, ProposalService, ProposalStatus, RosterProvider, Tally,
};
use crate::storage::GovernanceStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct TallyEngine {
    store: Arc<dyn GovernanceStore>,
    proposals: ProposalService,
    roster: Arc<dyn RosterProvider>,
}

impl TallyEngine {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        proposals: ProposalService,
        roster: Arc<dyn RosterProvider>,
    ) -> Self {
        Self {
            store,
            proposals,
            roster,
        }
    }

    /// Current tally for a proposal
    pub async fn get_tally(&self, proposal_id: ProposalId) -> ApiResult<Tally> {
        let proposal = self.proposals.get(proposal_id).await?;
        let results = self.store.choice_counts(proposal_id).await?;
        let total_eligible = self.roster.eligible_count().await?;

        Ok(build_tally(proposal_id, proposal.status, results, total_eligible))
    }
}

/// Votes needed for quorum: a strict majority of the eligible members
pub fn quorum_threshold(total_eligible: u32) -> u32 {
    total_eligible / 2 + 1
}

/// `pending` while open; once closed, passes only on strictly more for than against.
/// Quorum is reported alongside but does not gate the outcome.
pub fn decide_outcome(status: ProposalStatus, results: &ChoiceCounts) -> Outcome {
    match status {
        ProposalStatus::Open => Outcome::Pending,
        ProposalStatus::Closed if results.in_favor > results.against => Outcome::Passed,
        ProposalStatus::Closed => Outcome::Failed,
    }
}

fn build_tally(
    proposal_id: ProposalId,
    status: ProposalStatus,
    results: ChoiceCounts,
    total_eligible: u32,
) -> Tally {
    let votes_cast = results.total();
    Tally {
        proposal_id,
        status,
        total_eligible,
        votes_cast,
        quorum_met: votes_cast >= quorum_threshold(total_eligible),
        outcome: decide_outcome(status, &results),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::{FixedRoster, MemberId, VoteService};
    use crate::storage::{MemoryStore, Page};
    use pretty_assertions::assert_eq;

    struct Fixture {
        proposals: ProposalService,
        votes: VoteService,
        tally: TallyEngine,
    }

    fn fixture(eligible: u32) -> Fixture {
        let store: Arc<dyn GovernanceStore> = Arc::new(MemoryStore::new());
        let proposals = ProposalService::new(store.clone());
        let votes = VoteService::new(store.clone(), proposals.clone());
        let tally = TallyEngine::new(store, proposals.clone(), Arc::new(FixedRoster(eligible)));
        Fixture {
            proposals,
            votes,
            tally,
        }
    }

    fn counts(in_favor: u32, against: u32, abstain: u32) -> ChoiceCounts {
        ChoiceCounts {
            in_favor,
            against,
            abstain,
        }
    }

    #[test]
    fn test_quorum_threshold() {
        assert_eq!(quorum_threshold(10), 6);
        assert_eq!(quorum_threshold(9), 5);
        assert_eq!(quorum_threshold(1), 1);
        assert_eq!(quorum_threshold(0), 1);
    }

    #[test]
    fn test_outcome_pending_while_open() {
        assert_eq!(decide_outcome(ProposalStatus::Open, &counts(9, 0, 0)), Outcome::Pending);
    }

    #[test]
    fn test_outcome_tie_fails() {
        assert_eq!(decide_outcome(ProposalStatus::Closed, &counts(2, 2, 5)), Outcome::Failed);
        assert_eq!(decide_outcome(ProposalStatus::Closed, &counts(0, 0, 0)), Outcome::Failed);
    }

    #[test]
    fn test_outcome_ignores_quorum() {
        // One vote out of ten eligible misses quorum but still passes
        let tally = build_tally(1, ProposalStatus::Closed, counts(1, 0, 0), 10);
        assert!(!tally.quorum_met);
        assert_eq!(tally.outcome, Outcome::Passed);
    }

    #[test]
    fn test_votes_cast_is_sum_of_results() {
        for (f, a, x) in [(0, 0, 0), (3, 1, 2), (10, 0, 7)] {
            let tally = build_tally(1, ProposalStatus::Open, counts(f, a, x), 10);
            assert_eq!(
                tally.votes_cast,
                tally.results.in_favor + tally.results.against + tally.results.abstain
            );
        }
    }

    #[tokio::test]
    async fn test_open_then_closed_scenario() {
        let fx = fixture(10);
        let p = fx.proposals.create("Hire a bookkeeper", None).await.unwrap();
        fx.votes.create(p.id, MemberId(1), "for", None).await.unwrap();
        fx.votes.create(p.id, MemberId(2), "against", None).await.unwrap();
        fx.votes.create(p.id, MemberId(3), "for", None).await.unwrap();

        let open = fx.tally.get_tally(p.id).await.unwrap();
        assert_eq!(
            open,
            Tally {
                proposal_id: p.id,
                status: ProposalStatus::Open,
                total_eligible: 10,
                votes_cast: 3,
                quorum_met: false,
                results: counts(2, 1, 0),
                outcome: Outcome::Pending,
            }
        );

        fx.proposals.close(p.id).await.unwrap();
        let closed = fx.tally.get_tally(p.id).await.unwrap();
        assert_eq!(closed.status, ProposalStatus::Closed);
        assert_eq!(closed.outcome, Outcome::Passed);
        assert_eq!(closed.results, counts(2, 1, 0));
    }

    #[tokio::test]
    async fn test_update_moves_count_without_adding_vote() {
        let fx = fixture(10);
        let p = fx.proposals.create("Switch", None).await.unwrap();
        fx.votes.create(p.id, MemberId(1), "for", None).await.unwrap();
        fx.votes.update(p.id, MemberId(1), "against", None).await.unwrap();

        let tally = fx.tally.get_tally(p.id).await.unwrap();
        assert_eq!(tally.votes_cast, 1);
        assert_eq!(tally.results, counts(0, 1, 0));
    }

    #[tokio::test]
    async fn test_quorum_met_at_majority() {
        let fx = fixture(4);
        let p = fx.proposals.create("Small coop", None).await.unwrap();
        for member in 1..=2 {
            fx.votes.create(p.id, MemberId(member), "abstain", None).await.unwrap();
        }
        assert!(!fx.tally.get_tally(p.id).await.unwrap().quorum_met);

        fx.votes.create(p.id, MemberId(3), "against", None).await.unwrap();
        let tally = fx.tally.get_tally(p.id).await.unwrap();
        assert!(tally.quorum_met);
        assert_eq!(fx.votes.list(p.id, Page::default()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tie_after_close_fails() {
        let fx = fixture(10);
        let p = fx.proposals.create("Deadlock", None).await.unwrap();
        fx.votes.create(p.id, MemberId(1), "for", None).await.unwrap();
        fx.votes.create(p.id, MemberId(2), "against", None).await.unwrap();
        fx.proposals.close(p.id).await.unwrap();

        assert_eq!(fx.tally.get_tally(p.id).await.unwrap().outcome, Outcome::Failed);
    }

    #[tokio::test]
    async fn test_tally_of_missing_proposal() {
        let fx = fixture(10);
        assert!(matches!(
            fx.tally.get_tally(404).await,
            Err(crate::error::AppError::NotFound(_))
        ));
    }
}
