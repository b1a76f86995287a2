//! The global match clock: a four-phase state machine advanced once per
//! second, shared by every viewer. Transitions are computed synchronously in
//! `MatchClock::tick` so the machine is testable without a runtime; the
//! async `ClockDriver` owns the timer loop, broadcasts state, and dispatches
//! settlement without blocking on I/O.

use crate::config::{AdvanceMode, ClockConfig, Config};
use crate::engine::fixtures::{generate_fixtures, WeekFixtures};
use crate::engine::odds;
use crate::schedule::{CardBook, GlobalSchedule};
use crate::settlement::SettlementPipeline;
use crate::store::StateStore;
use crate::types::{GlobalState, MatchPhase, OddsBoard};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// A phase transition produced by one tick. At most one per tick; phases
/// are never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Entered `Playing`; the match-minute timer restarts at 0.
    MatchStarted,
    /// Entered `Betting`; the settlement trigger for the active timeframe.
    BettingOpened,
    /// Left `Betting` into `NextCountdown`.
    BettingClosed,
    /// Re-entered `PreCountdown`; one full cycle is complete.
    CycleCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeframeAdvance {
    pub new_index: u32,
    pub wrapped: bool,
}

#[derive(Debug)]
pub struct MatchClock {
    phase: MatchPhase,
    countdown: u32,
    betting_timer: u32,
    match_minute: u32,
    minute_step: u32,
    pre_countdown_secs: u32,
    betting_secs: u32,
    match_minutes: u32,
    timeframe_index: u32,
    total_timeframes: u32,
    /// Set when a cycle completes, consumed by exactly one advancement.
    pending_cycle_advance: bool,
}

impl MatchClock {
    pub fn new(config: &ClockConfig, duration_ticks: u32, total_timeframes: u32) -> Self {
        let ticks = duration_ticks.max(1);
        Self {
            phase: MatchPhase::PreCountdown,
            countdown: config.pre_countdown_secs,
            betting_timer: 0,
            match_minute: 0,
            minute_step: (config.match_minutes + ticks - 1) / ticks,
            pre_countdown_secs: config.pre_countdown_secs,
            betting_secs: config.betting_secs,
            match_minutes: config.match_minutes,
            timeframe_index: 0,
            total_timeframes: total_timeframes.max(1),
            pending_cycle_advance: false,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn timeframe_index(&self) -> u32 {
        self.timeframe_index
    }

    pub fn match_minute(&self) -> u32 {
        self.match_minute
    }

    /// Externally drive the index (schedule mode). Clears any pending
    /// cycle advancement so the two paths never both fire.
    pub fn set_timeframe_index(&mut self, index: u32) {
        self.timeframe_index = index % self.total_timeframes;
        self.pending_cycle_advance = false;
    }

    /// Advance one second. Returns the transition, if this tick caused one.
    pub fn tick(&mut self) -> Option<ClockEvent> {
        match self.phase {
            MatchPhase::PreCountdown => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    self.phase = MatchPhase::Playing;
                    self.match_minute = 0;
                    Some(ClockEvent::MatchStarted)
                } else {
                    None
                }
            }
            MatchPhase::Playing => {
                self.match_minute += self.minute_step;
                if self.match_minute >= self.match_minutes {
                    self.match_minute = self.match_minutes;
                    self.phase = MatchPhase::Betting;
                    self.betting_timer = self.betting_secs;
                    Some(ClockEvent::BettingOpened)
                } else {
                    None
                }
            }
            MatchPhase::Betting => {
                self.betting_timer = self.betting_timer.saturating_sub(1);
                if self.betting_timer == 0 {
                    self.phase = MatchPhase::NextCountdown;
                    self.countdown = self.pre_countdown_secs;
                    Some(ClockEvent::BettingClosed)
                } else {
                    None
                }
            }
            MatchPhase::NextCountdown => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    self.phase = MatchPhase::PreCountdown;
                    self.countdown = self.pre_countdown_secs;
                    self.pending_cycle_advance = true;
                    Some(ClockEvent::CycleCompleted)
                } else {
                    None
                }
            }
        }
    }

    /// Transition-detection for cycle-driven advancement. Consumes the
    /// pending-cycle flag, so calling it again while still in PreCountdown
    /// is a no-op — each full cycle advances the index exactly once.
    pub fn check_timeframe_advance(&mut self) -> Option<TimeframeAdvance> {
        if self.phase != MatchPhase::PreCountdown || !self.pending_cycle_advance {
            return None;
        }
        self.pending_cycle_advance = false;
        let next = self.timeframe_index + 1;
        let wrapped = next >= self.total_timeframes;
        self.timeframe_index = if wrapped { 0 } else { next };
        Some(TimeframeAdvance {
            new_index: self.timeframe_index,
            wrapped,
        })
    }

    pub fn snapshot(&self) -> GlobalState {
        let countdown_secs = match self.phase {
            MatchPhase::PreCountdown | MatchPhase::NextCountdown => self.countdown,
            MatchPhase::Betting => self.betting_timer,
            MatchPhase::Playing => 0,
        };
        GlobalState {
            current_week: self.timeframe_index + 1,
            timeframe_index: self.timeframe_index,
            phase: self.phase,
            countdown_secs,
            match_minute: self.match_minute,
            last_updated: Utc::now(),
        }
    }
}

/// Owns the one-second loop. Every tick upserts the shared state row;
/// betting entry recomputes odds boards and fires settlement on a spawned
/// task so the timer never blocks on store I/O.
pub struct ClockDriver {
    clock: MatchClock,
    mode: AdvanceMode,
    schedule: GlobalSchedule,
    league: String,
    teams: Vec<String>,
    total_weeks: u32,
    fixtures: Vec<WeekFixtures>,
    season: i64,
    state_store: Arc<dyn StateStore>,
    pipeline: Arc<SettlementPipeline>,
    book: Arc<RwLock<CardBook>>,
    boards: Arc<RwLock<HashMap<String, OddsBoard>>>,
}

impl ClockDriver {
    pub fn new(
        config: &Config,
        schedule: GlobalSchedule,
        state_store: Arc<dyn StateStore>,
        pipeline: Arc<SettlementPipeline>,
        book: Arc<RwLock<CardBook>>,
        boards: Arc<RwLock<HashMap<String, OddsBoard>>>,
    ) -> Self {
        let fixtures = generate_fixtures(&config.league.teams, config.league.total_weeks);
        Self {
            clock: MatchClock::new(
                &config.clock,
                config.simulation.duration_ticks,
                config.league.total_weeks,
            ),
            mode: config.schedule.mode,
            schedule,
            league: config.league.country.clone(),
            teams: config.league.teams.clone(),
            total_weeks: config.league.total_weeks,
            fixtures,
            season: 0,
            state_store,
            pipeline,
            book,
            boards,
        }
    }

    pub fn fixtures(&self) -> &[WeekFixtures] {
        &self.fixtures
    }

    /// Build the current timeframe and publish the initial state. `run`
    /// does this before its first tick.
    pub async fn prime(&mut self) {
        self.ensure_timeframe(self.clock.timeframe_index()).await;
        self.publish_state().await;
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        // First timeframe must exist before the first betting phase.
        self.prime().await;

        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; consume it so phase
        // timers run at true one-second cadence.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.step().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.pipeline.shutdown();
        Ok(())
    }

    pub async fn step(&mut self) {
        if let Some(event) = self.clock.tick() {
            self.handle_event(event).await;
        }

        if self.clock.phase() == MatchPhase::Playing {
            self.trace_live_scores().await;
        }

        match self.mode {
            AdvanceMode::Cycle => {
                if let Some(advance) = self.clock.check_timeframe_advance() {
                    if advance.wrapped {
                        self.season += 1;
                        self.fixtures = generate_fixtures(&self.teams, self.total_weeks);
                        self.book.write().await.reset_season();
                        tracing::info!(season = self.season, "season wrapped, fixtures regenerated");
                    }
                    tracing::info!(timeframe = advance.new_index, "timeframe advanced");
                    self.ensure_timeframe(advance.new_index).await;
                }
            }
            AdvanceMode::Schedule => {
                let absolute = self.schedule.current_index(Utc::now()).max(0);
                let index = (absolute % i64::from(self.total_weeks)) as u32;
                if index != self.clock.timeframe_index() {
                    self.clock.set_timeframe_index(index);
                    tracing::info!(timeframe = index, "timeframe synced to schedule");
                    self.build_timeframe(index, absolute).await;
                }
            }
        }

        self.publish_state().await;
    }

    async fn handle_event(&mut self, event: ClockEvent) {
        match event {
            ClockEvent::MatchStarted => {
                tracing::debug!(timeframe = self.clock.timeframe_index(), "match started");
            }
            ClockEvent::BettingOpened => {
                let index = self.clock.timeframe_index();
                self.refresh_boards(index).await;

                let pipeline = self.pipeline.clone();
                let book = self.book.clone();
                let league = self.league.clone();
                tokio::spawn(async move {
                    pipeline.settle_timeframe(&league, index, book).await;
                });
            }
            ClockEvent::BettingClosed => {
                // Leaving the betting phase re-arms settlement for the next one.
                self.pipeline.disarm();
            }
            ClockEvent::CycleCompleted => {
                tracing::debug!("phase cycle completed");
            }
        }
    }

    /// Recompute the odds board for every match in the timeframe from its
    /// cached result. Runs once per betting entry; never again for the same
    /// match instance.
    async fn refresh_boards(&self, index: u32) {
        let book = self.book.read().await;
        let Some(cards) = book.cards(index) else {
            tracing::warn!(timeframe = index, "betting opened with no card list");
            return;
        };
        let mut boards = self.boards.write().await;
        for card in cards {
            if let Some(result) = book.result(&card.id) {
                boards.insert(
                    card.id.clone(),
                    odds::compute_board(result.home_goals, result.away_goals),
                );
            }
        }
    }

    async fn trace_live_scores(&self) {
        if !tracing::enabled!(tracing::Level::TRACE) {
            return;
        }
        let minute = self.clock.match_minute();
        let book = self.book.read().await;
        if let Some(cards) = book.cards(self.clock.timeframe_index()) {
            for card in cards {
                if let Some((home, away)) = book.live_score(&card.id, minute) {
                    tracing::trace!(match_id = %card.id, minute, home, away, "live score");
                }
            }
        }
    }

    async fn ensure_timeframe(&mut self, index: u32) {
        if let Some(week) = self.fixtures.get(index as usize) {
            tracing::debug!(
                week = week.week,
                pairings = week.matches.len(),
                "league fixtures for the week"
            );
        }
        let absolute = self.season * i64::from(self.total_weeks) + i64::from(index);
        self.build_timeframe(index, absolute).await;
    }

    async fn build_timeframe(&mut self, index: u32, absolute_slot: i64) {
        let slot_start = self.schedule.slot_start(absolute_slot);
        let mut book = self.book.write().await;
        let built = book.build_timeframe(index, slot_start).len();
        tracing::debug!(timeframe = index, matches = built, "timeframe cards ready");
    }

    async fn publish_state(&self) {
        if let Err(e) = self.state_store.upsert(&self.clock.snapshot()).await {
            // Abandoned for this cycle; the next tick re-derives and retries.
            tracing::warn!(error = %e, "global state upsert failed");
        }
    }
}
