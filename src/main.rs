use anyhow::Result;
use matchday_engine::clock::ClockDriver;
use matchday_engine::config::Config;
use matchday_engine::history::MatchHistory;
use matchday_engine::schedule::{CardBook, GlobalSchedule};
use matchday_engine::settlement::SettlementPipeline;
use matchday_engine::store::memory::{MemoryBetLedger, MemoryResultsStore, MemoryStateStore};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};

#[tokio::main]
async fn main() -> Result<()> {
    let log_file = std::fs::File::create("matchday-engine.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "matchday_engine=info".into()),
        )
        .with_writer(log_file)
        .init();

    let config = Config::load(Path::new("config.toml"))?;
    let schedule = GlobalSchedule::from_config(&config.schedule)?;

    println!();
    println!("  Matchday Engine v0.1.0");
    println!("  ======================");
    println!();
    println!(
        "  league: {} ({} teams, {} weeks)",
        config.league.country,
        config.league.teams.len(),
        config.league.total_weeks
    );
    println!("  advance mode: {:?}", config.schedule.mode);
    println!("  logging to matchday-engine.log");
    println!();

    let state_store = Arc::new(MemoryStateStore::new());
    let results = Arc::new(MemoryResultsStore::new());
    let ledger = Arc::new(MemoryBetLedger::new(results.clone()));
    let history = Arc::new(Mutex::new(MatchHistory::new()));
    let book = Arc::new(RwLock::new(CardBook::new(
        &config.league,
        &config.simulation,
    )));
    let boards = Arc::new(RwLock::new(HashMap::new()));

    let pipeline = Arc::new(SettlementPipeline::new(
        results,
        ledger,
        history,
        Duration::from_secs(config.settlement.stale_sweep_delay_secs),
    ));

    let driver = ClockDriver::new(
        &config,
        schedule,
        state_store,
        pipeline,
        book,
        boards,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    driver.run(shutdown_rx).await
}
