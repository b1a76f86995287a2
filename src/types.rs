//! Shared domain types: the global clock state, match cards and results,
//! bets, and the per-match odds board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum stake accepted for a single bet.
pub const MIN_STAKE: u64 = 50;

/// The four phases of the global match cycle, in order. Serialized names
/// are the wire values consumers key off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPhase {
    PreCountdown,
    Playing,
    Betting,
    NextCountdown,
}

/// The singleton state row every viewer shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalState {
    pub current_week: u32,
    pub timeframe_index: u32,
    pub phase: MatchPhase,
    pub countdown_secs: u32,
    pub match_minute: u32,
    pub last_updated: DateTime<Utc>,
}

impl GlobalState {
    pub fn initial() -> Self {
        Self {
            current_week: 1,
            timeframe_index: 0,
            phase: MatchPhase::PreCountdown,
            countdown_secs: 10,
            match_minute: 0,
            last_updated: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Home,
    Away,
    Draw,
}

impl Winner {
    pub fn from_score(home_goals: u32, away_goals: u32) -> Self {
        match home_goals.cmp(&away_goals) {
            std::cmp::Ordering::Greater => Winner::Home,
            std::cmp::Ordering::Less => Winner::Away,
            std::cmp::Ordering::Equal => Winner::Draw,
        }
    }
}

/// One goal in a simulated match, positioned by simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalEvent {
    pub tick: u32,
    pub team: Side,
}

/// The full pre-computed outcome of a match: final score plus the tick
/// timeline used to derive in-progress scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedResult {
    pub home_goals: u32,
    pub away_goals: u32,
    pub winner: Winner,
    pub events: Vec<GoalEvent>,
}

/// Admin override applied before a match is first simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForcedOutcome {
    pub home_goals: u32,
    pub away_goals: u32,
    /// Overrides the score-derived winner when set.
    pub winner: Option<Winner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Finished,
}

/// A match as presented to consumers. Scores stay empty until settlement
/// marks the card finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCard {
    pub id: String,
    pub home: String,
    pub away: String,
    pub kickoff: DateTime<Utc>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub status: MatchStatus,
}

/// The authoritative per-match record, written exactly once at settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedMatchResult {
    pub match_id: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub winner: Winner,
    pub is_final: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub match_id: String,
    pub bet_type: String,
    pub selection: String,
    /// Decimal odds as displayed, e.g. "1.20". Parsed back for payout.
    pub odds: String,
    pub stake: u64,
    pub status: BetStatus,
}

/// One market on the odds board: parallel selection and odds lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub selections: Vec<String>,
    pub odds: Vec<String>,
}

/// The full board for one match, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OddsBoard {
    pub markets: Vec<(String, Market)>,
}

impl OddsBoard {
    pub fn push(&mut self, name: &str, selections: Vec<String>, odds: Vec<String>) {
        self.markets
            .push((name.to_string(), Market { selections, odds }));
    }

    pub fn market(&self, name: &str) -> Option<&Market> {
        self.markets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }
}
