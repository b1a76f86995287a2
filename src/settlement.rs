//! Settlement of a finished timeframe: persist each match result, update the
//! raw card, resolve its bets, and schedule a deferred sweep for anything
//! left pending. The pipeline arms once per betting phase; duplicate
//! triggers from the same phase are no-ops.

use crate::history::{HistoryRecord, MatchHistory};
use crate::schedule::CardBook;
use crate::store::{BetLedger, ResultsStore};
use crate::types::{MatchCard, PersistedMatchResult, SimulatedResult};
use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

pub struct SettlementPipeline {
    results: Arc<dyn ResultsStore>,
    ledger: Arc<dyn BetLedger>,
    history: Arc<Mutex<MatchHistory>>,
    sweep_delay: Duration,
    armed: AtomicBool,
    sweeps: StdMutex<Vec<JoinHandle<()>>>,
}

impl SettlementPipeline {
    pub fn new(
        results: Arc<dyn ResultsStore>,
        ledger: Arc<dyn BetLedger>,
        history: Arc<Mutex<MatchHistory>>,
        sweep_delay: Duration,
    ) -> Self {
        Self {
            results,
            ledger,
            history,
            sweep_delay,
            armed: AtomicBool::new(false),
            sweeps: StdMutex::new(Vec::new()),
        }
    }

    /// Claim the settlement trigger. The first caller per betting phase gets
    /// `true`; everyone else gets `false` until `disarm`.
    fn arm(&self) -> bool {
        !self.armed.swap(true, Ordering::SeqCst)
    }

    /// Re-enable settlement for the next betting phase.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Settle every match of the timeframe. Matches are settled
    /// concurrently; one failed match never aborts its siblings.
    pub async fn settle_timeframe(&self, league: &str, index: u32, book: Arc<RwLock<CardBook>>) {
        if !self.arm() {
            tracing::debug!(timeframe = index, "settlement already triggered this phase");
            return;
        }

        let jobs: Vec<(MatchCard, SimulatedResult)> = {
            let book = book.read().await;
            let Some(cards) = book.cards(index) else {
                tracing::warn!(timeframe = index, "settlement triggered with no cards");
                return;
            };
            cards
                .iter()
                .filter_map(|c| book.result(&c.id).map(|r| (c.clone(), r.clone())))
                .collect()
        };

        let total = jobs.len();
        let outcomes = join_all(
            jobs.into_iter()
                .map(|(card, result)| self.settle_match(league, card, result, book.clone())),
        )
        .await;

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        for err in outcomes.into_iter().filter_map(Result::err) {
            tracing::warn!(error = %err, "match settlement failed");
        }
        tracing::info!(
            timeframe = index,
            matches = total,
            failed,
            "timeframe settled"
        );
    }

    /// One match: history, then the authoritative result, then the raw card,
    /// then bet resolution. The result write must land before resolution so
    /// the sweep always finds a final record.
    async fn settle_match(
        &self,
        league: &str,
        card: MatchCard,
        result: SimulatedResult,
        book: Arc<RwLock<CardBook>>,
    ) -> Result<()> {
        let record = HistoryRecord {
            league: league.to_string(),
            home: card.home.clone(),
            away: card.away.clone(),
            home_goals: result.home_goals,
            away_goals: result.away_goals,
            winner: result.winner,
            recorded_at: Utc::now(),
        };
        tracing::info!(match_id = %card.id, result = %record.summary(), "full time");
        self.history.lock().await.push(record);

        let persisted = PersistedMatchResult {
            match_id: card.id.clone(),
            home_goals: result.home_goals,
            away_goals: result.away_goals,
            winner: result.winner,
            is_final: true,
        };
        self.results
            .upsert_result(&persisted)
            .await
            .with_context(|| format!("persisting result for {}", card.id))?;

        if !book
            .write()
            .await
            .mark_finished(&card.id, result.home_goals, result.away_goals)
        {
            tracing::warn!(match_id = %card.id, "no raw card to mark finished");
        }

        match self
            .ledger
            .resolve_bets_for_match(&card.id, result.home_goals, result.away_goals)
            .await
        {
            Ok(summary) => {
                if summary.resolved > 0 {
                    tracing::info!(match_id = %card.id, resolved = summary.resolved, "bets resolved");
                }
            }
            // Resolution failure is recoverable: the sweep picks up whatever
            // stayed pending.
            Err(e) => tracing::warn!(match_id = %card.id, error = %e, "bet resolution failed"),
        }

        self.schedule_sweep(card.id);
        Ok(())
    }

    /// Deferred safety net: after the delay, force-resolve anything still
    /// pending against the persisted result. Handles are tracked so shutdown
    /// can cancel outstanding sweeps.
    fn schedule_sweep(&self, match_id: String) {
        let ledger = self.ledger.clone();
        let delay = self.sweep_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match ledger.force_resolve_stale_bets(&match_id).await {
                Ok(summary) if summary.forced > 0 => {
                    tracing::info!(match_id = %match_id, forced = summary.forced, "stale bets force-resolved");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(match_id = %match_id, error = %e, "stale-bet sweep failed");
                }
            }
        });

        let mut sweeps = match self.sweeps.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sweeps.retain(|h| !h.is_finished());
        sweeps.push(handle);
    }

    pub fn pending_sweeps(&self) -> usize {
        let sweeps = match self.sweeps.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sweeps.iter().filter(|h| !h.is_finished()).count()
    }

    /// Cancel all outstanding sweeps.
    pub fn shutdown(&self) {
        let mut sweeps = match self.sweeps.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for handle in sweeps.drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LeagueConfig, SimulationConfig};
    use crate::schedule::GlobalSchedule;
    use crate::store::memory::{MemoryBetLedger, MemoryResultsStore};
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture() -> (Arc<SettlementPipeline>, Arc<RwLock<CardBook>>, Arc<MemoryResultsStore>) {
        let league = LeagueConfig {
            country: "england".into(),
            teams: (0..18).map(|i| format!("Team {}", i)).collect(),
            total_weeks: 36,
        };
        let sim = SimulationConfig::default();
        let mut book = CardBook::with_rng(&league, &sim, StdRng::seed_from_u64(21));
        let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let slot = GlobalSchedule::new(epoch, 3).slot_start(0);
        book.build_timeframe(0, slot);

        let results = Arc::new(MemoryResultsStore::new());
        let ledger = Arc::new(MemoryBetLedger::new(results.clone()));
        let pipeline = Arc::new(SettlementPipeline::new(
            results.clone(),
            ledger,
            Arc::new(Mutex::new(MatchHistory::new())),
            Duration::from_secs(95),
        ));
        (pipeline, Arc::new(RwLock::new(book)), results)
    }

    #[tokio::test]
    async fn test_settle_persists_final_results() {
        let (pipeline, book, results) = fixture();
        pipeline.settle_timeframe("england", 0, book.clone()).await;

        let guard = book.read().await;
        let cards = guard.cards(0).unwrap();
        assert_eq!(cards.len(), 9);
        for card in cards {
            let expected = guard.result(&card.id).unwrap();
            let persisted = results.get_result(&card.id).await.unwrap().unwrap();
            assert!(persisted.is_final);
            assert_eq!(persisted.home_goals, expected.home_goals);
            assert_eq!(persisted.away_goals, expected.away_goals);
            assert_eq!(card.home_score, Some(expected.home_goals));
            assert_eq!(card.status, crate::types::MatchStatus::Finished);
        }
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_second_trigger_is_noop_until_disarmed() {
        let (pipeline, book, _results) = fixture();
        pipeline.settle_timeframe("england", 0, book.clone()).await;
        let after_first = pipeline.pending_sweeps();
        assert_eq!(after_first, 9);

        // Same phase: the pipeline stays armed, nothing new is scheduled.
        pipeline.settle_timeframe("england", 0, book.clone()).await;
        assert_eq!(pipeline.pending_sweeps(), after_first);

        // Next phase re-arms.
        pipeline.disarm();
        pipeline.settle_timeframe("england", 0, book.clone()).await;
        assert_eq!(pipeline.pending_sweeps(), after_first * 2);
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_sweeps() {
        let (pipeline, book, _results) = fixture();
        pipeline.settle_timeframe("england", 0, book).await;
        assert!(pipeline.pending_sweeps() > 0);
        pipeline.shutdown();
        assert_eq!(pipeline.pending_sweeps(), 0);
    }
}
