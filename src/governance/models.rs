//! Governance data models
//!
//! Proposals, votes and the derived tally, in the shape they cross the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type ProposalId = i32;
pub type VoteId = i32;

/// Authenticated member identifier handed to the core by the auth boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub i32);

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proposal lifecycle. `Open` is initial, `Closed` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[default]
    Open,
    Closed,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Open => "open",
            ProposalStatus::Closed => "closed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ProposalStatus::Open)
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ProposalStatus::Open),
            "closed" => Ok(ProposalStatus::Closed),
            other => Err(format!("unknown proposal status '{}'", other)),
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A governance item members vote on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub title: String,
    /// Empty when the author gave no body
    pub body: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

/// A member's choice on a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    For,
    Against,
    Abstain,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::For => "for",
            Choice::Against => "against",
            Choice::Abstain => "abstain",
        }
    }
}

impl FromStr for Choice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "for" => Ok(Choice::For),
            "against" => Ok(Choice::Against),
            "abstain" => Ok(Choice::Abstain),
            _ => Err("choice must be 'for', 'against', or 'abstain'".to_string()),
        }
    }
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One member's recorded vote. Unique per (proposal, member).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub proposal_id: ProposalId,
    pub member_id: MemberId,
    pub choice: Choice,
    /// Empty when the member left no notes
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Per-choice vote counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceCounts {
    #[serde(rename = "for")]
    pub in_favor: u32,
    pub against: u32,
    pub abstain: u32,
}

impl ChoiceCounts {
    pub fn record(&mut self, choice: Choice, count: u32) {
        match choice {
            Choice::For => self.in_favor += count,
            Choice::Against => self.against += count,
            Choice::Abstain => self.abstain += count,
        }
    }

    pub fn total(&self) -> u32 {
        self.in_favor + self.against + self.abstain
    }
}

/// Decision state derived from a proposal's status and counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pending,
    Passed,
    Failed,
}

/// Live tally for a proposal; recomputed on every read, never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub proposal_id: ProposalId,
    pub status: ProposalStatus,
    pub total_eligible: u32,
    pub votes_cast: u32,
    pub quorum_met: bool,
    pub results: ChoiceCounts,
    pub outcome: Outcome,
}
