//! Eligible voter count providers

use crate::storage::{StoreError, StoreResult};
use async_trait::async_trait;
use deadpool_postgres::Pool;

/// Supplies `total_eligible` for tallies
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn eligible_count(&self) -> StoreResult<u32>;
}

/// Fixed placeholder count, used until a member directory is wired in
#[derive(Debug, Clone, Copy)]
pub struct FixedRoster(pub u32);

#[async_trait]
impl RosterProvider for FixedRoster {
    async fn eligible_count(&self) -> StoreResult<u32> {
        Ok(self.0)
    }
}

/// Counts rows in the member directory's `members` table
pub struct MemberRoster {
    pool: Pool,
}

impl MemberRoster {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RosterProvider for MemberRoster {
    async fn eligible_count(&self) -> StoreResult<u32> {
        let client = self.pool.get().await?;
        let row = client.query_one("SELECT COUNT(*) FROM members", &[]).await?;
        let count: i64 = row.get(0);
        u32::try_from(count)
            .map_err(|_| StoreError::Unavailable(format!("member count {} out of range", count)))
    }
}
