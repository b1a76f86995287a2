//! Wall-clock scheduling: the immutable global schedule that maps time to a
//! timeframe index, and the per-timeframe card book with its eagerly
//! simulated results.

use crate::config::{LeagueConfig, ScheduleConfig, SimulationConfig};
use crate::engine::fixtures::all_pairs_pool;
use crate::engine::simulator::{score_at, ResultCache, Simulator};
use crate::types::{ForcedOutcome, MatchCard, MatchStatus, SimulatedResult};
use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

/// Deterministic wall-clock → schedule-index mapping. Immutable once
/// initialized for the lifetime of a season.
#[derive(Debug, Clone, Copy)]
pub struct GlobalSchedule {
    reference_epoch: DateTime<Utc>,
    interval_minutes: i64,
}

impl GlobalSchedule {
    pub fn new(reference_epoch: DateTime<Utc>, interval_minutes: i64) -> Self {
        Self {
            reference_epoch,
            interval_minutes,
        }
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        ensure!(
            config.interval_minutes >= 1,
            "schedule interval must be at least one minute"
        );
        let reference_epoch = match &config.reference_epoch {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("invalid reference_epoch: {}", raw))?
                .with_timezone(&Utc),
            None => Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc(),
        };
        Ok(Self::new(reference_epoch, config.interval_minutes))
    }

    /// `floor((now - epoch) / interval)`; negative before the epoch.
    pub fn current_index(&self, now: DateTime<Utc>) -> i64 {
        let elapsed_secs = (now - self.reference_epoch).num_seconds();
        elapsed_secs.div_euclid(self.interval_minutes * 60)
    }

    pub fn slot_start(&self, index: i64) -> DateTime<Utc> {
        self.reference_epoch + Duration::minutes(index * self.interval_minutes)
    }

    pub fn reference_epoch(&self) -> DateTime<Utc> {
        self.reference_epoch
    }
}

/// Per-timeframe match cards plus the result cache behind them. A card list
/// is built once per timeframe index; building it eagerly simulates every
/// match so later phase transitions read a pre-existing score.
pub struct CardBook {
    country: String,
    pool: Vec<(String, String)>,
    matches_per_timeframe: usize,
    simulator: Simulator,
    rng: StdRng,
    forced: HashMap<String, ForcedOutcome>,
    cards: HashMap<u32, Vec<MatchCard>>,
    cache: ResultCache,
}

impl CardBook {
    pub fn new(league: &LeagueConfig, sim: &SimulationConfig) -> Self {
        Self::with_rng(league, sim, StdRng::from_entropy())
    }

    pub fn with_rng(league: &LeagueConfig, sim: &SimulationConfig, rng: StdRng) -> Self {
        Self {
            country: league.country.clone(),
            pool: all_pairs_pool(&league.teams, sim.min_pool_size),
            matches_per_timeframe: sim.matches_per_timeframe,
            simulator: Simulator::new(sim),
            rng,
            forced: HashMap::new(),
            cards: HashMap::new(),
            cache: ResultCache::new(),
        }
    }

    pub fn card_id(country: &str, slot_start: DateTime<Utc>, slot: usize) -> String {
        format!("{}-{}-{}", country, slot_start.timestamp_millis(), slot)
    }

    pub fn duration_ticks(&self) -> u32 {
        self.simulator.duration_ticks()
    }

    /// Admin override for a not-yet-simulated match. Once a result is
    /// cached the override has no effect — the cache never regenerates.
    pub fn force_outcome(&mut self, match_id: &str, outcome: ForcedOutcome) {
        self.forced.insert(match_id.to_string(), outcome);
    }

    /// Build (or return the already-built) card list for a timeframe. A
    /// wall-clock schedule revisits an index with a later slot once it wraps
    /// a season; the stored cards carry the old slot's kickoff, so a slot
    /// mismatch drops that season's cards and results and rebuilds.
    pub fn build_timeframe(&mut self, index: u32, slot_start: DateTime<Utc>) -> &[MatchCard] {
        let stale = self
            .cards
            .get(&index)
            .and_then(|list| list.first())
            .map_or(false, |card| card.kickoff != slot_start);
        if stale {
            if let Some(old) = self.cards.remove(&index) {
                for card in &old {
                    self.cache.remove(&card.id);
                }
            }
        }
        if !self.cards.contains_key(&index) && !self.pool.is_empty() {
            let mut list = Vec::with_capacity(self.matches_per_timeframe);
            for slot in 0..self.matches_per_timeframe {
                let pick = (index as usize * self.matches_per_timeframe + slot) % self.pool.len();
                let (home, away) = self.pool[pick].clone();
                let id = Self::card_id(&self.country, slot_start, slot);

                let Self {
                    cache,
                    rng,
                    simulator,
                    forced,
                    ..
                } = self;
                cache.get_or_simulate(&id, || simulator.simulate(rng, forced.get(&id)));

                list.push(MatchCard {
                    id,
                    home,
                    away,
                    kickoff: slot_start,
                    home_score: None,
                    away_score: None,
                    status: MatchStatus::Scheduled,
                });
            }
            self.cards.insert(index, list);
        }
        self.cards.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cards(&self, index: u32) -> Option<&[MatchCard]> {
        self.cards.get(&index).map(Vec::as_slice)
    }

    pub fn result(&self, match_id: &str) -> Option<&SimulatedResult> {
        self.cache.get(match_id)
    }

    /// In-progress score for a match at the given match minute, derived
    /// from the cached goal timeline.
    pub fn live_score(&self, match_id: &str, match_minute: u32) -> Option<(u32, u32)> {
        self.cache
            .get(match_id)
            .map(|r| score_at(&r.events, match_minute, self.simulator.duration_ticks()))
    }

    /// Update the card's embedded score/status fields (the secondary "raw
    /// match" record other consumers read).
    pub fn mark_finished(&mut self, match_id: &str, home_goals: u32, away_goals: u32) -> bool {
        for list in self.cards.values_mut() {
            if let Some(card) = list.iter_mut().find(|c| c.id == match_id) {
                card.home_score = Some(home_goals);
                card.away_score = Some(away_goals);
                card.status = MatchStatus::Finished;
                return true;
            }
        }
        false
    }

    /// Season rollover: drop the finished season's cards and results so the
    /// next cycle through the indexes builds fresh matches.
    pub fn reset_season(&mut self) {
        self.cards.clear();
        self.cache = ResultCache::new();
    }
}
