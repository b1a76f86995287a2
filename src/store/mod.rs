//! Contracts for the external collaborators the core talks to: the shared
//! state store, the authoritative results store, and the bet ledger. The
//! engine only depends on these traits; `memory` carries the in-process
//! reference implementations used by the binary and the tests.

pub mod memory;

use crate::types::{Bet, GlobalState, PersistedMatchResult};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

/// Outcome of an all-or-nothing bet placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceBetsOutcome {
    Accepted { new_balance: u64 },
    InsufficientBalance,
    InvalidBets,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub resolved: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub forced: usize,
}

/// Push notification for a ledger balance change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub user_id: String,
    pub new_balance: u64,
}

/// The singleton global-state row. Upsert semantics are last-write-wins;
/// duplicate or concurrent writers are safe no-ops, never errors.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<GlobalState>;
    async fn upsert(&self, state: &GlobalState) -> Result<()>;
    /// Change notifications keyed by the singleton row.
    fn subscribe(&self) -> watch::Receiver<GlobalState>;
}

/// Authoritative per-match results, keyed by match id. At most one record
/// per id; `is_final` never reverts once set.
#[async_trait]
pub trait ResultsStore: Send + Sync {
    async fn upsert_result(&self, result: &PersistedMatchResult) -> Result<()>;
    async fn get_result(&self, match_id: &str) -> Result<Option<PersistedMatchResult>>;
}

/// The bet ledger. Placement is atomic: either every bet is accepted and the
/// stake deducted, or nothing changes. Resolution treats already-resolved
/// bets as no-ops so it is safe to race with a stale-bet sweep.
#[async_trait]
pub trait BetLedger: Send + Sync {
    async fn place_bets_atomic(&self, user_id: &str, bets: Vec<Bet>) -> Result<PlaceBetsOutcome>;
    async fn resolve_bets_for_match(
        &self,
        match_id: &str,
        home_goals: u32,
        away_goals: u32,
    ) -> Result<ResolveSummary>;
    /// Force-resolve anything still pending for a match, reading the
    /// persisted result as the source of truth.
    async fn force_resolve_stale_bets(&self, match_id: &str) -> Result<SweepSummary>;
    fn subscribe_balances(&self) -> broadcast::Receiver<BalanceUpdate>;
}
