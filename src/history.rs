//! Local human-readable record of finished matches, newest first.

use crate::types::Winner;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

const MAX_RECORDS: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub league: String,
    pub home: String,
    pub away: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub winner: Winner,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn summary(&self) -> String {
        let outcome = match self.winner {
            Winner::Home => "home win",
            Winner::Away => "away win",
            Winner::Draw => "draw",
        };
        format!(
            "[{}] {} {}-{} {} ({})",
            self.league, self.home, self.home_goals, self.away_goals, self.away, outcome
        )
    }
}

#[derive(Debug, Default)]
pub struct MatchHistory {
    records: VecDeque<HistoryRecord>,
}

impl MatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push_front(record);
        while self.records.len() > MAX_RECORDS {
            self.records.pop_back();
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
