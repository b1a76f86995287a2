//! Fixture generation: fixed-rotation weekly pairings plus the all-pairs
//! draw pool used for per-timeframe match cards.

/// One week of league pairings.
#[derive(Debug, Clone)]
pub struct WeekFixtures {
    pub week: u32,
    pub matches: Vec<(String, String)>,
}

/// Generate weekly pairings for a season with a fixed rotation: week `w`
/// pairs rotated index `(w+i) mod n` against `(w+n-i-1) mod n`.
///
/// This is deliberately not a strict round robin — teams can meet again
/// before all pairs are exhausted for odd `n` or short seasons. That matches
/// the exhibition-schedule behavior this engine replays.
pub fn generate_fixtures(teams: &[String], total_weeks: u32) -> Vec<WeekFixtures> {
    let n = teams.len();
    let mut out = Vec::with_capacity(total_weeks as usize);
    if n < 2 {
        return out;
    }
    for week in 1..=total_weeks {
        let w = week as usize;
        let mut matches = Vec::with_capacity(n / 2);
        for i in 0..n / 2 {
            let home = (w + i) % n;
            let away = (w + n - i - 1) % n;
            if home == away {
                continue; // self-pair can occur for odd n
            }
            matches.push((teams[home].clone(), teams[away].clone()));
        }
        out.push(WeekFixtures { week, matches });
    }
    out
}

/// Every unique unordered team pair once, padded by duplication up to
/// `min_pool_size` when the league is too small. Cards draw from this pool
/// cyclically, so a short pool just repeats sooner.
pub fn all_pairs_pool(teams: &[String], min_pool_size: usize) -> Vec<(String, String)> {
    let mut pool: Vec<(String, String)> = Vec::new();
    for i in 0..teams.len() {
        for j in (i + 1)..teams.len() {
            pool.push((teams[i].clone(), teams[j].clone()));
        }
    }
    let base = pool.len();
    if base == 0 {
        return pool;
    }
    while pool.len() < min_pool_size {
        let next = pool[pool.len() % base].clone();
        pool.push(next);
    }
    pool
}
