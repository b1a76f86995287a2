//! Odds board computation: a pure function from a final score to fixed
//! constant odds per market. No probability model behind it — each market
//! just favors the side matching the actual simulated outcome.

use crate::types::{OddsBoard, Winner};

const OU_BRACKETS: [(f64, &str, f64, f64); 4] = [
    (1.5, "1.5", 1.15, 4.50),
    (2.5, "2.5", 1.30, 3.20),
    (3.5, "3.5", 1.45, 2.60),
    (4.5, "4.5", 1.60, 2.20),
];

const CORRECT_SCORE_GRID: [(u32, u32); 16] = [
    (0, 0), (1, 0), (0, 1), (1, 1),
    (2, 0), (0, 2), (2, 1), (1, 2),
    (2, 2), (3, 0), (0, 3), (3, 1),
    (1, 3), (3, 2), (2, 3), (3, 3),
];

fn fmt(odds: f64) -> String {
    format!("{:.2}", odds)
}

/// Compute the full odds board for a match's final score. Called once per
/// match at betting-phase entry, from the cached simulated result.
pub fn compute_board(home_goals: u32, away_goals: u32) -> OddsBoard {
    let mut board = OddsBoard::default();
    let winner = Winner::from_score(home_goals, away_goals);
    let total = home_goals + away_goals;

    // 1X2: winner cheap, loser penalized; draw odds depend on whether the
    // result actually was a draw.
    let (one, x, two) = match winner {
        Winner::Home => (1.20, 5.00, 8.00),
        Winner::Away => (8.00, 4.00, 1.20),
        Winner::Draw => (4.00, 1.15, 4.00),
    };
    board.push(
        "1X2",
        vec!["1".into(), "X".into(), "2".into()],
        vec![fmt(one), fmt(x), fmt(two)],
    );

    let both_scored = home_goals > 0 && away_goals > 0;
    let (yes, no) = if both_scored { (1.10, 2.50) } else { (2.50, 1.20) };
    board.push(
        "BTTS",
        vec!["Yes".into(), "No".into()],
        vec![fmt(yes), fmt(no)],
    );

    for (line, label, cheap, expensive) in OU_BRACKETS {
        let (over, under) = if f64::from(total) > line {
            (cheap, expensive)
        } else {
            (expensive, cheap)
        };
        board.push(
            &format!("Over/Under {}", label),
            vec![format!("Over {}", label), format!("Under {}", label)],
            vec![fmt(over), fmt(under)],
        );
    }

    let (odd, even) = if total % 2 == 1 { (1.30, 2.50) } else { (2.50, 1.30) };
    board.push(
        "Odd/Even",
        vec!["Odd".into(), "Even".into()],
        vec![fmt(odd), fmt(even)],
    );

    // Static placeholder: the engine has no per-minute first-goal input.
    board.push(
        "First Goal",
        vec![
            "0-15 min".into(),
            "16-30 min".into(),
            "31-45 min".into(),
            "46-60 min".into(),
            "61-75 min".into(),
            "76-90 min".into(),
        ],
        vec![
            fmt(4.50), fmt(4.00), fmt(4.20),
            fmt(4.80), fmt(5.50), fmt(6.50),
        ],
    );

    let mut cs_selections = Vec::with_capacity(CORRECT_SCORE_GRID.len() + 1);
    let mut cs_odds = Vec::with_capacity(CORRECT_SCORE_GRID.len() + 1);
    let mut actual_in_grid = false;
    for (h, a) in CORRECT_SCORE_GRID {
        let is_actual = (h, a) == (home_goals, away_goals);
        actual_in_grid |= is_actual;
        cs_selections.push(format!("{}-{}", h, a));
        cs_odds.push(fmt(if is_actual { 1.50 } else { 12.00 }));
    }
    cs_selections.push("Other".into());
    cs_odds.push(fmt(if actual_in_grid { 15.00 } else { 1.50 }));
    board.push("Correct Score", cs_selections, cs_odds);

    board
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_win_1x2() {
        let board = compute_board(2, 0);
        let m = board.market("1X2").unwrap();
        assert_eq!(m.odds, vec!["1.20", "5.00", "8.00"]);
    }

    #[test]
    fn test_draw_1x2() {
        let board = compute_board(1, 1);
        let m = board.market("1X2").unwrap();
        assert_eq!(m.odds, vec!["4.00", "1.15", "4.00"]);
    }

    #[test]
    fn test_away_win_1x2() {
        let board = compute_board(0, 2);
        let m = board.market("1X2").unwrap();
        assert_eq!(m.odds, vec!["8.00", "4.00", "1.20"]);
    }

    #[test]
    fn test_btts_goalless() {
        let board = compute_board(0, 0);
        let m = board.market("BTTS").unwrap();
        assert_eq!(m.odds, vec!["2.50", "1.20"]);
    }

    #[test]
    fn test_btts_both_scored() {
        let board = compute_board(2, 1);
        let m = board.market("BTTS").unwrap();
        assert_eq!(m.odds, vec!["1.10", "2.50"]);
    }

    #[test]
    fn test_over_under_favors_actual_total() {
        let board = compute_board(2, 1); // total 3
        let ou25 = board.market("Over/Under 2.5").unwrap();
        let over: f64 = ou25.odds[0].parse().unwrap();
        let under: f64 = ou25.odds[1].parse().unwrap();
        assert!(over < under, "total 3 beats the 2.5 line");

        let ou35 = board.market("Over/Under 3.5").unwrap();
        let over: f64 = ou35.odds[0].parse().unwrap();
        let under: f64 = ou35.odds[1].parse().unwrap();
        assert!(under < over, "total 3 stays under the 3.5 line");
    }

    #[test]
    fn test_odd_even_matches_parity() {
        let odd_board = compute_board(2, 1);
        assert_eq!(odd_board.market("Odd/Even").unwrap().odds[0], "1.30");
        let even_board = compute_board(1, 1);
        assert_eq!(even_board.market("Odd/Even").unwrap().odds[1], "1.30");
    }

    #[test]
    fn test_first_goal_is_static() {
        let a = compute_board(0, 0);
        let b = compute_board(4, 3);
        assert_eq!(a.market("First Goal"), b.market("First Goal"));
    }

    #[test]
    fn test_correct_score_actual_is_cheap() {
        let board = compute_board(2, 1);
        let m = board.market("Correct Score").unwrap();
        let idx = m.selections.iter().position(|s| s == "2-1").unwrap();
        assert_eq!(m.odds[idx], "1.50");
        // Out-of-grid scoreline falls through to "Other".
        let board = compute_board(5, 4);
        let m = board.market("Correct Score").unwrap();
        let idx = m.selections.iter().position(|s| s == "Other").unwrap();
        assert_eq!(m.odds[idx], "1.50");
    }

    #[test]
    fn test_all_markets_parallel_and_two_decimals() {
        let board = compute_board(3, 2);
        assert!(!board.markets.is_empty());
        for (name, market) in &board.markets {
            assert_eq!(market.selections.len(), market.odds.len(), "{}", name);
            for odds in &market.odds {
                let (_, frac) = odds.split_once('.').expect("decimal point");
                assert_eq!(frac.len(), 2, "{} {}", name, odds);
            }
        }
    }
}
