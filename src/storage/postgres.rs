//! PostgreSQL governance store
//!
//! Atomicity lives in the database: the vote uniqueness rule is a unique
//! index, close is a single conditional UPDATE, and vote writes lock the
//! proposal row `FOR SHARE` in the same transaction so they serialize
//! against a concurrent close.

use super::{
    CloseOutcome, GovernanceStore, NewProposal, Page, StoreError, StoreResult, VoteInput,
    VoteWrite,
};
use crate::config::DatabaseConfig;
use crate::governance::{
    Choice, ChoiceCounts, MemberId, Proposal, ProposalId, ProposalStatus, Vote,
};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

const PROPOSAL_COLUMNS: &str =
    "id, title, COALESCE(body, ''), COALESCE(status, 'open'), created_at";

const VOTE_COLUMNS: &str =
    "id, proposal_id, member_id, choice, COALESCE(notes, ''), created_at";

/// Idempotent table bootstrap, applied in order at startup
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS proposals (
        id SERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        body TEXT,
        status TEXT NOT NULL DEFAULT 'open',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    // Tables created before the lifecycle existed lack the column
    "ALTER TABLE proposals ADD COLUMN IF NOT EXISTS status TEXT DEFAULT 'open'",
    "CREATE TABLE IF NOT EXISTS votes (
        id SERIAL PRIMARY KEY,
        proposal_id INTEGER NOT NULL REFERENCES proposals(id),
        member_id INTEGER NOT NULL,
        choice TEXT NOT NULL CHECK (choice IN ('for', 'against', 'abstain')),
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS votes_proposal_member_uidx ON votes(proposal_id, member_id)",
    "CREATE INDEX IF NOT EXISTS idx_votes_proposal_created ON votes(proposal_id, created_at, id)",
];

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            StoreError::UniqueViolation(err.to_string())
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StoreError::Unavailable(format!("pool: {}", err))
    }
}

/// PostgreSQL-backed store
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from settings and verify it can reach the server
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
        cfg.dbname = Some(config.database.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.max_pool_size));

        let pool = if config.require_tls {
            let certs = rustls_native_certs::load_native_certs();
            let mut root_store = rustls::RootCertStore::empty();
            for cert in certs.certs {
                root_store.add(cert).ok();
            }

            let tls_config = rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();

            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
            cfg.create_pool(Some(Runtime::Tokio1), tls)
        } else {
            cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        }
        .map_err(|e| StoreError::Unavailable(format!("Failed to create pool: {}", e)))?;

        let store = Self::new(pool);
        store.ping().await?;
        info!(
            "Database connection successful ({}:{}/{}, TLS: {})",
            config.host, config.port, config.database, config.require_tls
        );
        Ok(store)
    }

    /// Shared pool, for collaborators that query member tables
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Create governance tables if they don't exist
    pub async fn migrate(&self) -> StoreResult<()> {
        let client = self.pool.get().await?;
        for statement in MIGRATIONS {
            client.execute(*statement, &[]).await?;
        }
        info!("Governance tables initialized");
        Ok(())
    }

    fn proposal_from_row(row: &Row) -> StoreResult<Proposal> {
        let status: String = row.get(3);
        Ok(Proposal {
            id: row.get(0),
            title: row.get(1),
            body: row.get(2),
            status: status.parse().map_err(StoreError::Unavailable)?,
            created_at: row.get(4),
        })
    }

    fn vote_from_row(row: &Row) -> StoreResult<Vote> {
        let choice: String = row.get(3);
        Ok(Vote {
            id: row.get(0),
            proposal_id: row.get(1),
            member_id: MemberId(row.get(2)),
            choice: choice.parse().map_err(StoreError::Unavailable)?,
            notes: row.get(4),
            created_at: row.get(5),
        })
    }

    fn status_from_row(row: &Row) -> StoreResult<ProposalStatus> {
        let status: String = row.get(0);
        status.parse().map_err(StoreError::Unavailable)
    }
}

#[async_trait]
impl GovernanceStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StoreResult<()> {
        let client = self.pool.get().await?;
        client.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    async fn insert_proposal(&self, proposal: NewProposal) -> StoreResult<Proposal> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                format!(
                    "INSERT INTO proposals (title, body, status) VALUES ($1, $2, 'open')
                     RETURNING {}",
                    PROPOSAL_COLUMNS
                ).as_str(),
                &[&proposal.title, &proposal.body],
            )
            .await?;
        Self::proposal_from_row(&row)
    }

    async fn proposal(&self, id: ProposalId) -> StoreResult<Option<Proposal>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                format!("SELECT {} FROM proposals WHERE id = $1", PROPOSAL_COLUMNS).as_str(),
                &[&id],
            )
            .await?;
        row.as_ref().map(Self::proposal_from_row).transpose()
    }

    async fn proposals(&self) -> StoreResult<Vec<Proposal>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                format!("SELECT {} FROM proposals ORDER BY id DESC", PROPOSAL_COLUMNS).as_str(),
                &[],
            )
            .await?;
        rows.iter().map(Self::proposal_from_row).collect()
    }

    async fn close_if_open(&self, id: ProposalId) -> StoreResult<CloseOutcome> {
        let client = self.pool.get().await?;
        let closed = client
            .query_opt(
                format!(
                    "UPDATE proposals SET status = 'closed'
                     WHERE id = $1 AND COALESCE(status, 'open') = 'open'
                     RETURNING {}",
                    PROPOSAL_COLUMNS
                ).as_str(),
                &[&id],
            )
            .await?;
        if let Some(row) = closed {
            return Ok(CloseOutcome::Closed(Self::proposal_from_row(&row)?));
        }

        // Nothing matched; report whether the row is missing or already closed
        let current = client
            .query_opt(
                "SELECT COALESCE(status, 'open') FROM proposals WHERE id = $1",
                &[&id],
            )
            .await?;
        match current {
            Some(row) => Ok(CloseOutcome::NotOpen(Self::status_from_row(&row)?)),
            None => Ok(CloseOutcome::Missing),
        }
    }

    async fn insert_vote(&self, vote: VoteInput) -> StoreResult<VoteWrite> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let status = tx
            .query_opt(
                "SELECT COALESCE(status, 'open') FROM proposals WHERE id = $1 FOR SHARE",
                &[&vote.proposal_id],
            )
            .await?;
        match status {
            None => return Ok(VoteWrite::ProposalMissing),
            Some(row) if !Self::status_from_row(&row)?.is_open() => {
                return Ok(VoteWrite::ProposalNotOpen)
            }
            Some(_) => {}
        }

        let row = tx
            .query_one(
                format!(
                    "INSERT INTO votes (proposal_id, member_id, choice, notes)
                     VALUES ($1, $2, $3, $4)
                     RETURNING {}",
                    VOTE_COLUMNS
                ).as_str(),
                &[
                    &vote.proposal_id,
                    &vote.member_id.0,
                    &vote.choice.as_str(),
                    &vote.notes,
                ],
            )
            .await?;
        let written = Self::vote_from_row(&row)?;
        tx.commit().await?;

        debug!("Inserted vote {} on proposal {}", written.id, written.proposal_id);
        Ok(VoteWrite::Written(written))
    }

    async fn update_vote(&self, change: VoteInput) -> StoreResult<VoteWrite> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let status = tx
            .query_opt(
                "SELECT COALESCE(status, 'open') FROM proposals WHERE id = $1 FOR SHARE",
                &[&change.proposal_id],
            )
            .await?;
        match status {
            None => return Ok(VoteWrite::ProposalMissing),
            Some(row) if !Self::status_from_row(&row)?.is_open() => {
                return Ok(VoteWrite::ProposalNotOpen)
            }
            Some(_) => {}
        }

        let row = tx
            .query_opt(
                format!(
                    "UPDATE votes SET choice = $3, notes = $4
                     WHERE proposal_id = $1 AND member_id = $2
                     RETURNING {}",
                    VOTE_COLUMNS
                ).as_str(),
                &[
                    &change.proposal_id,
                    &change.member_id.0,
                    &change.choice.as_str(),
                    &change.notes,
                ],
            )
            .await?;
        let Some(row) = row else {
            return Ok(VoteWrite::VoteMissing);
        };
        let written = Self::vote_from_row(&row)?;
        tx.commit().await?;
        Ok(VoteWrite::Written(written))
    }

    async fn vote(&self, proposal_id: ProposalId, member_id: MemberId) -> StoreResult<Option<Vote>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                format!(
                    "SELECT {} FROM votes WHERE proposal_id = $1 AND member_id = $2",
                    VOTE_COLUMNS
                ).as_str(),
                &[&proposal_id, &member_id.0],
            )
            .await?;
        row.as_ref().map(Self::vote_from_row).transpose()
    }

    async fn votes(&self, proposal_id: ProposalId, page: Page) -> StoreResult<Vec<Vote>> {
        let client = self.pool.get().await?;
        // LIMIT NULL is LIMIT ALL
        let limit: Option<i64> = page.limit.map(i64::from);
        let offset = i64::from(page.offset);
        let rows = client
            .query(
                format!(
                    "SELECT {} FROM votes WHERE proposal_id = $1
                     ORDER BY created_at ASC, id ASC
                     LIMIT $2 OFFSET $3",
                    VOTE_COLUMNS
                ).as_str(),
                &[&proposal_id, &limit, &offset],
            )
            .await?;
        rows.iter().map(Self::vote_from_row).collect()
    }

    async fn choice_counts(&self, proposal_id: ProposalId) -> StoreResult<ChoiceCounts> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT choice, COUNT(*) FROM votes WHERE proposal_id = $1 GROUP BY choice",
                &[&proposal_id],
            )
            .await?;

        let mut counts = ChoiceCounts::default();
        for row in rows {
            let choice: String = row.get(0);
            let count: i64 = row.get(1);
            let choice: Choice = choice.parse().map_err(StoreError::Unavailable)?;
            let count = u32::try_from(count)
                .map_err(|_| StoreError::Unavailable(format!("vote count {} out of range", count)))?;
            counts.record(choice, count);
        }
        Ok(counts)
    }
}
