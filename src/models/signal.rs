use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Momentum reading for a symbol at the close of a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumScore {
    pub symbol: String,
    /// Last trading day of the week the score belongs to.
    pub date: NaiveDate,
    pub close: f64,
    /// Compounded return over the lookback window, rounded to 5 decimals.
    pub momentum: f64,
}

/// A score with its position in the universe. Rank 1 is the strongest;
/// equal momentum shares the lowest rank of the tie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStock {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
    pub momentum: f64,
    pub rank: u32,
}

impl RankedStock {
    pub fn new(score: MomentumScore, rank: u32) -> Self {
        Self {
            symbol: score.symbol,
            date: score.date,
            close: score.close,
            momentum: score.momentum,
            rank,
        }
    }
}
