//! In-process reference implementations of the collaborator contracts.
//! These back the engine binary and the integration tests; a real deployment
//! swaps them for networked stores honoring the same traits.

use super::{
    BalanceUpdate, BetLedger, PlaceBetsOutcome, ResolveSummary, ResultsStore, StateStore,
    SweepSummary,
};
use crate::types::{Bet, BetStatus, GlobalState, PersistedMatchResult, MIN_STAKE};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, RwLock};

/// Watch-backed singleton state row. Every upsert replaces the value and
/// wakes all subscribers; last write wins.
pub struct MemoryStateStore {
    tx: watch::Sender<GlobalState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(GlobalState::initial());
        Self { tx }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<GlobalState> {
        Ok(self.tx.borrow().clone())
    }

    async fn upsert(&self, state: &GlobalState) -> Result<()> {
        self.tx.send_replace(state.clone());
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<GlobalState> {
        self.tx.subscribe()
    }
}

/// Match results keyed by id. Upserts are idempotent and `is_final` is
/// sticky: a later write can update scores but never un-finalize.
#[derive(Default)]
pub struct MemoryResultsStore {
    inner: RwLock<HashMap<String, PersistedMatchResult>>,
}

impl MemoryResultsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultsStore for MemoryResultsStore {
    async fn upsert_result(&self, result: &PersistedMatchResult) -> Result<()> {
        let mut map = self.inner.write().await;
        match map.get_mut(&result.match_id) {
            Some(existing) => {
                let was_final = existing.is_final;
                *existing = result.clone();
                existing.is_final = result.is_final || was_final;
            }
            None => {
                map.insert(result.match_id.clone(), result.clone());
            }
        }
        Ok(())
    }

    async fn get_result(&self, match_id: &str) -> Result<Option<PersistedMatchResult>> {
        Ok(self.inner.read().await.get(match_id).cloned())
    }
}

struct LedgerBet {
    user_id: String,
    bet: Bet,
}

struct LedgerInner {
    balances: HashMap<String, u64>,
    bets: Vec<LedgerBet>,
}

/// Reference bet ledger: owns balances and bets, enforces atomic placement,
/// and settles pending bets against actual scores. The persisted results
/// store is its source of truth for forced sweeps.
pub struct MemoryBetLedger {
    results: Arc<dyn ResultsStore>,
    inner: Mutex<LedgerInner>,
    balance_tx: broadcast::Sender<BalanceUpdate>,
}

impl MemoryBetLedger {
    pub fn new(results: Arc<dyn ResultsStore>) -> Self {
        let (balance_tx, _) = broadcast::channel(64);
        Self {
            results,
            inner: Mutex::new(LedgerInner {
                balances: HashMap::new(),
                bets: Vec::new(),
            }),
            balance_tx,
        }
    }

    pub async fn credit(&self, user_id: &str, amount: u64) {
        let mut inner = self.inner.lock().await;
        let balance = inner.balances.entry(user_id.to_string()).or_insert(0);
        *balance += amount;
        let new_balance = *balance;
        drop(inner);
        self.notify(user_id, new_balance);
    }

    pub async fn balance(&self, user_id: &str) -> u64 {
        self.inner
            .lock()
            .await
            .balances
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn bets_for_match(&self, match_id: &str) -> Vec<Bet> {
        self.inner
            .lock()
            .await
            .bets
            .iter()
            .filter(|b| b.bet.match_id == match_id)
            .map(|b| b.bet.clone())
            .collect()
    }

    fn notify(&self, user_id: &str, new_balance: u64) {
        let _ = self.balance_tx.send(BalanceUpdate {
            user_id: user_id.to_string(),
            new_balance,
        });
    }

    /// Settle every pending bet on a match against the actual score.
    /// Already-resolved bets are untouched, so duplicate calls and races
    /// with a sweep are no-ops.
    async fn settle_pending(&self, match_id: &str, home_goals: u32, away_goals: u32) -> usize {
        let mut touched: Vec<(String, u64)> = Vec::new();
        let mut resolved = 0;
        {
            let mut inner = self.inner.lock().await;
            let mut credits: Vec<(String, u64)> = Vec::new();
            for entry in inner
                .bets
                .iter_mut()
                .filter(|b| b.bet.match_id == match_id && b.bet.status == BetStatus::Pending)
            {
                resolved += 1;
                match settle_selection(&entry.bet.bet_type, &entry.bet.selection, home_goals, away_goals)
                {
                    Some(true) => match entry.bet.odds.parse::<f64>() {
                        Ok(odds) => {
                            entry.bet.status = BetStatus::Won;
                            let payout = (entry.bet.stake as f64 * odds).round() as u64;
                            credits.push((entry.user_id.clone(), payout));
                        }
                        Err(_) => {
                            // A payout cannot be computed without odds.
                            tracing::warn!(
                                match_id = %entry.bet.match_id,
                                odds = %entry.bet.odds,
                                "unparseable odds on winning bet, cancelled and refunded"
                            );
                            entry.bet.status = BetStatus::Cancelled;
                            credits.push((entry.user_id.clone(), entry.bet.stake));
                        }
                    },
                    Some(false) => {
                        entry.bet.status = BetStatus::Lost;
                    }
                    None => {
                        // Market this ledger cannot grade: cancel and refund.
                        entry.bet.status = BetStatus::Cancelled;
                        credits.push((entry.user_id.clone(), entry.bet.stake));
                    }
                }
            }
            for (user_id, amount) in credits {
                let balance = inner.balances.entry(user_id.clone()).or_insert(0);
                *balance += amount;
                touched.push((user_id, *balance));
            }
        }
        for (user_id, new_balance) in touched {
            self.notify(&user_id, new_balance);
        }
        resolved
    }
}

#[async_trait]
impl BetLedger for MemoryBetLedger {
    async fn place_bets_atomic(&self, user_id: &str, bets: Vec<Bet>) -> Result<PlaceBetsOutcome> {
        if bets.is_empty() {
            return Ok(PlaceBetsOutcome::InvalidBets);
        }
        if bets.iter().any(|b| b.stake < MIN_STAKE) {
            return Ok(PlaceBetsOutcome::InvalidBets);
        }
        let total: u64 = bets.iter().map(|b| b.stake).sum();

        let mut inner = self.inner.lock().await;
        // No entry is created for a rejected placement; unknown users must
        // not accumulate zero-balance rows.
        let balance = inner.balances.get(user_id).copied().unwrap_or(0);
        if balance < total {
            return Ok(PlaceBetsOutcome::InsufficientBalance);
        }
        let new_balance = balance - total;
        inner.balances.insert(user_id.to_string(), new_balance);
        for mut bet in bets {
            bet.status = BetStatus::Pending;
            inner.bets.push(LedgerBet {
                user_id: user_id.to_string(),
                bet,
            });
        }
        drop(inner);

        self.notify(user_id, new_balance);
        Ok(PlaceBetsOutcome::Accepted { new_balance })
    }

    async fn resolve_bets_for_match(
        &self,
        match_id: &str,
        home_goals: u32,
        away_goals: u32,
    ) -> Result<ResolveSummary> {
        let resolved = self.settle_pending(match_id, home_goals, away_goals).await;
        Ok(ResolveSummary { resolved })
    }

    async fn force_resolve_stale_bets(&self, match_id: &str) -> Result<SweepSummary> {
        let Some(result) = self.results.get_result(match_id).await? else {
            tracing::warn!(match_id = %match_id, "stale sweep: no persisted result yet");
            return Ok(SweepSummary { forced: 0 });
        };
        if !result.is_final {
            tracing::warn!(match_id = %match_id, "stale sweep: result not final");
            return Ok(SweepSummary { forced: 0 });
        }
        let forced = self
            .settle_pending(match_id, result.home_goals, result.away_goals)
            .await;
        Ok(SweepSummary { forced })
    }

    fn subscribe_balances(&self) -> broadcast::Receiver<BalanceUpdate> {
        self.balance_tx.subscribe()
    }
}

/// Grade one selection against the actual score. `None` means this ledger
/// does not own grading rules for the market.
fn settle_selection(bet_type: &str, selection: &str, home: u32, away: u32) -> Option<bool> {
    let total = home + away;
    match bet_type {
        "1X2" => match selection {
            "1" => Some(home > away),
            "X" => Some(home == away),
            "2" => Some(away > home),
            _ => None,
        },
        "BTTS" => match selection {
            "Yes" => Some(home > 0 && away > 0),
            "No" => Some(!(home > 0 && away > 0)),
            _ => None,
        },
        t if t.starts_with("Over/Under") => {
            let (side, line) = selection.split_once(' ')?;
            let line: f64 = line.parse().ok()?;
            match side {
                "Over" => Some(f64::from(total) > line),
                "Under" => Some(f64::from(total) < line),
                _ => None,
            }
        }
        "Odd/Even" => match selection {
            "Odd" => Some(total % 2 == 1),
            "Even" => Some(total % 2 == 0),
            _ => None,
        },
        "Correct Score" => {
            if selection == "Other" {
                return Some(home > 3 || away > 3);
            }
            let (h, a) = selection.split_once('-')?;
            let h: u32 = h.parse().ok()?;
            let a: u32 = a.parse().ok()?;
            Some((h, a) == (home, away))
        }
        // First Goal has no goal-minute input to grade against.
        _ => None,
    }
}
