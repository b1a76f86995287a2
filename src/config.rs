use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeagueConfig {
    pub country: String,
    pub teams: Vec<String>,
    #[serde(default = "default_total_weeks")]
    pub total_weeks: u32,
}

fn default_total_weeks() -> u32 {
    36
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClockConfig {
    #[serde(default = "default_pre_countdown_secs")]
    pub pre_countdown_secs: u32,
    #[serde(default = "default_betting_secs")]
    pub betting_secs: u32,
    #[serde(default = "default_match_minutes")]
    pub match_minutes: u32,
}

fn default_pre_countdown_secs() -> u32 { 10 }
fn default_betting_secs() -> u32 { 30 }
fn default_match_minutes() -> u32 { 90 }

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            pre_countdown_secs: 10,
            betting_secs: 30,
            match_minutes: 90,
        }
    }
}

/// Which mechanism advances the active timeframe index. Exactly one path is
/// consulted for a given deployment.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AdvanceMode {
    /// Index advances once per completed phase cycle.
    Cycle,
    /// Index is derived from wall-clock time against the reference epoch.
    Schedule,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_advance_mode")]
    pub mode: AdvanceMode,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: i64,
    /// RFC 3339 reference epoch. First-write-wins for the season; a missing
    /// value means "start of today, UTC".
    #[serde(default)]
    pub reference_epoch: Option<String>,
}

fn default_advance_mode() -> AdvanceMode {
    AdvanceMode::Cycle
}

fn default_interval_minutes() -> i64 {
    3
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mode: AdvanceMode::Cycle,
            interval_minutes: 3,
            reference_epoch: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_duration_ticks")]
    pub duration_ticks: u32,
    #[serde(default = "default_goal_probability")]
    pub goal_probability: f64,
    #[serde(default = "default_forced_goal_probability")]
    pub forced_goal_probability: f64,
    #[serde(default = "default_matches_per_timeframe")]
    pub matches_per_timeframe: usize,
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: usize,
}

fn default_duration_ticks() -> u32 { 40 }
fn default_goal_probability() -> f64 { 0.07 }
fn default_forced_goal_probability() -> f64 { 0.10 }
fn default_matches_per_timeframe() -> usize { 9 }
fn default_min_pool_size() -> usize { 54 }

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_ticks: 40,
            goal_probability: 0.07,
            forced_goal_probability: 0.10,
            matches_per_timeframe: 9,
            min_pool_size: 54,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettlementConfig {
    /// Delay before the force-resolve sweep fires for each settled match:
    /// one full match plus buffer, so no bet stays pending longer than that.
    #[serde(default = "default_stale_sweep_delay_secs")]
    pub stale_sweep_delay_secs: u64,
}

fn default_stale_sweep_delay_secs() -> u64 {
    95
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            stale_sweep_delay_secs: 95,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses() {
        let config = Config::load(Path::new("config.toml")).unwrap();
        assert_eq!(config.clock.pre_countdown_secs, 10);
        assert_eq!(config.clock.betting_secs, 30);
        assert_eq!(config.simulation.duration_ticks, 40);
        assert_eq!(config.settlement.stale_sweep_delay_secs, 95);
        assert!(config.league.teams.len() >= 2);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [league]
            country = "england"
            teams = ["A", "B", "C", "D"]
            "#,
        )
        .unwrap();
        assert_eq!(config.league.total_weeks, 36);
        assert_eq!(config.schedule.mode, AdvanceMode::Cycle);
        assert_eq!(config.schedule.interval_minutes, 3);
        assert_eq!(config.simulation.matches_per_timeframe, 9);
        assert_eq!(config.simulation.min_pool_size, 54);
    }

    #[test]
    fn test_schedule_mode_parses() {
        let config: Config = toml::from_str(
            r#"
            [league]
            country = "england"
            teams = ["A", "B"]

            [schedule]
            mode = "schedule"
            interval_minutes = 5
            reference_epoch = "2026-01-01T00:00:00Z"
            "#,
        )
        .unwrap();
        assert_eq!(config.schedule.mode, AdvanceMode::Schedule);
        assert_eq!(config.schedule.interval_minutes, 5);
    }
}
