//! Settlement idempotence and the deferred stale-bet sweep, driven against
//! the in-process stores with a paused clock.

use matchday_engine::config::{LeagueConfig, SimulationConfig};
use matchday_engine::history::MatchHistory;
use matchday_engine::schedule::{CardBook, GlobalSchedule};
use matchday_engine::settlement::SettlementPipeline;
use matchday_engine::store::memory::{MemoryBetLedger, MemoryResultsStore};
use matchday_engine::store::BetLedger;
use matchday_engine::types::{Bet, BetStatus, ForcedOutcome, Winner};
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

const SWEEP_DELAY: Duration = Duration::from_secs(95);

fn league() -> LeagueConfig {
    LeagueConfig {
        country: "england".into(),
        teams: (0..18).map(|i| format!("Team {}", i)).collect(),
        total_weeks: 36,
    }
}

struct Harness {
    pipeline: Arc<SettlementPipeline>,
    book: Arc<RwLock<CardBook>>,
    ledger: Arc<MemoryBetLedger>,
    first_match_id: String,
}

/// A built timeframe 0 whose slot-0 match is forced to 2-1 home.
fn harness() -> Harness {
    let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let schedule = GlobalSchedule::new(epoch, 3);
    let slot = schedule.slot_start(0);
    let first_match_id = CardBook::card_id("england", slot, 0);

    let mut book = CardBook::with_rng(&league(), &SimulationConfig::default(), StdRng::seed_from_u64(7));
    book.force_outcome(
        &first_match_id,
        ForcedOutcome {
            home_goals: 2,
            away_goals: 1,
            winner: Some(Winner::Home),
        },
    );
    book.build_timeframe(0, slot);

    let results = Arc::new(MemoryResultsStore::new());
    let ledger = Arc::new(MemoryBetLedger::new(results.clone()));
    let pipeline = Arc::new(SettlementPipeline::new(
        results,
        ledger.clone(),
        Arc::new(Mutex::new(MatchHistory::new())),
        SWEEP_DELAY,
    ));

    Harness {
        pipeline,
        book: Arc::new(RwLock::new(book)),
        ledger,
        first_match_id,
    }
}

fn bet(match_id: &str, bet_type: &str, selection: &str, odds: &str, stake: u64) -> Bet {
    Bet {
        match_id: match_id.into(),
        bet_type: bet_type.into(),
        selection: selection.into(),
        odds: odds.into(),
        stake,
        status: BetStatus::Pending,
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_duplicate_trigger_settles_once() {
    let h = harness();
    h.ledger.credit("u1", 500).await;
    h.ledger
        .place_bets_atomic("u1", vec![bet(&h.first_match_id, "1X2", "1", "1.20", 100)])
        .await
        .unwrap();

    h.pipeline.settle_timeframe("england", 0, h.book.clone()).await;
    let balance_after_first = h.ledger.balance("u1").await;
    assert_eq!(balance_after_first, 400 + 120);
    let sweeps_after_first = h.pipeline.pending_sweeps();
    assert_eq!(sweeps_after_first, 9);

    // Same betting phase fires again: armed pipeline ignores it.
    h.pipeline.settle_timeframe("england", 0, h.book.clone()).await;
    assert_eq!(h.ledger.balance("u1").await, balance_after_first);
    assert_eq!(h.pipeline.pending_sweeps(), sweeps_after_first);

    h.pipeline.shutdown();
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_stale_bet_swept_after_delay() {
    let h = harness();
    h.pipeline.settle_timeframe("england", 0, h.book.clone()).await;

    // Placed after resolution already ran: stays pending until the sweep.
    h.ledger.credit("u2", 200).await;
    h.ledger
        .place_bets_atomic("u2", vec![bet(&h.first_match_id, "1X2", "1", "1.20", 200)])
        .await
        .unwrap();

    tokio::time::sleep(SWEEP_DELAY - Duration::from_secs(1)).await;
    assert_eq!(
        h.ledger.bets_for_match(&h.first_match_id).await[0].status,
        BetStatus::Pending
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    let swept = h.ledger.bets_for_match(&h.first_match_id).await;
    // Forced result was 2-1 home, so the late "1" bet wins on the sweep.
    assert_eq!(swept[0].status, BetStatus::Won);
    assert_eq!(h.ledger.balance("u2").await, 240);

    h.pipeline.shutdown();
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_rearmed_pipeline_does_not_regrade() {
    let h = harness();
    h.ledger.credit("u1", 500).await;
    h.ledger
        .place_bets_atomic(
            "u1",
            vec![bet(&h.first_match_id, "Correct Score", "2-1", "1.50", 100)],
        )
        .await
        .unwrap();

    h.pipeline.settle_timeframe("england", 0, h.book.clone()).await;
    let balance = h.ledger.balance("u1").await;
    assert_eq!(balance, 400 + 150);

    // Next phase re-arms; already-resolved bets are untouched.
    h.pipeline.disarm();
    h.pipeline.settle_timeframe("england", 0, h.book.clone()).await;
    assert_eq!(h.ledger.balance("u1").await, balance);
    assert_eq!(
        h.ledger.bets_for_match(&h.first_match_id).await[0].status,
        BetStatus::Won
    );

    h.pipeline.shutdown();
}
