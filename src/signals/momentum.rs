use crate::models::candle::PriceSeries;
use crate::models::signal::MomentumScore;
use chrono::{Datelike, Duration, NaiveDate};

/// Weekly-return momentum.
///
/// Daily closes are bucketed into weeks ending Friday (Saturday..Friday);
/// each week's close is the close of its last trading day. Momentum at a
/// week is the compounded return of the last `lookback_weeks` weekly
/// returns: prod(1 + r) - 1, rounded to 5 decimals.
///
/// A week still in progress counts as a week, closed at its latest bar, so a
/// mid-week run scores the partial week.
#[derive(Debug, Clone, Copy)]
pub struct MomentumCalculator {
    lookback_weeks: usize,
}

impl Default for MomentumCalculator {
    fn default() -> Self {
        Self::new(12)
    }
}

impl MomentumCalculator {
    pub fn new(lookback_weeks: usize) -> Self {
        Self {
            lookback_weeks: lookback_weeks.max(1),
        }
    }

    pub fn lookback_weeks(&self) -> usize {
        self.lookback_weeks
    }

    /// (last trading day, close) per Friday-ending week, oldest first.
    pub fn weekly_closes(series: &PriceSeries) -> Vec<(NaiveDate, f64)> {
        let mut weeks: Vec<(NaiveDate, NaiveDate, f64)> = Vec::new();

        for candle in series.candles() {
            let label = week_ending(candle.date);
            match weeks.last_mut() {
                Some((week, day, close)) if *week == label => {
                    *day = candle.date;
                    *close = candle.close;
                }
                _ => weeks.push((label, candle.date, candle.close)),
            }
        }

        weeks.into_iter().map(|(_, day, close)| (day, close)).collect()
    }

    /// Every week with a full lookback window. Windows touching a zero close are skipped.
    pub fn scores(&self, series: &PriceSeries) -> Vec<MomentumScore> {
        let weeks = Self::weekly_closes(series);
        if weeks.len() <= self.lookback_weeks {
            return Vec::new();
        }

        (self.lookback_weeks..weeks.len())
            .filter_map(|i| {
                let window = &weeks[i - self.lookback_weeks..=i];
                let growth = window.windows(2).try_fold(1.0, |acc, pair| {
                    let (prev, cur) = (pair[0].1, pair[1].1);
                    (prev > 0.0).then(|| acc * (cur / prev))
                })?;

                let (date, close) = weeks[i];
                Some(MomentumScore {
                    symbol: series.symbol().to_string(),
                    date,
                    close,
                    momentum: round5(growth - 1.0),
                })
            })
            .collect()
    }

    /// Most recent score, if the series is long enough.
    pub fn latest(&self, series: &PriceSeries) -> Option<MomentumScore> {
        self.scores(series).pop()
    }
}

/// Friday closing the Saturday..Friday week that contains `date`.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let weekday = date.weekday().num_days_from_monday() as i64;
    date + Duration::days((4 - weekday).rem_euclid(7))
}

fn round5(x: f64) -> f64 {
    (x * 100_000.0).round() / 100_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candle::Candle;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    /// Weekday candles starting Monday 2024-01-01, one close level per week.
    fn weekly_series(symbol: &str, levels: &[f64]) -> PriceSeries {
        let start = d("2024-01-01");
        let candles = levels.iter().enumerate().flat_map(|(week, &close)| {
            (0..5).map(move |day| Candle {
                symbol: symbol.to_string(),
                date: start + Duration::days(week as i64 * 7 + day),
                open: close,
                high: close,
                low: close,
                close,
                volume: 10.0,
            })
        });
        PriceSeries::from_candles(symbol, candles.collect::<Vec<_>>())
    }

    #[test]
    fn test_week_ending_friday() {
        assert_eq!(week_ending(d("2024-01-05")), d("2024-01-05"));
        assert_eq!(week_ending(d("2024-01-01")), d("2024-01-05"));
        assert_eq!(week_ending(d("2024-01-06")), d("2024-01-12"));
        assert_eq!(week_ending(d("2024-01-07")), d("2024-01-12"));
    }

    #[test]
    fn test_weekly_close_uses_last_trading_day() {
        let mut series = weekly_series("NSE:SBIN-EQ", &[100.0, 101.0]);
        // Drop Friday of week two by rebuilding without it
        let kept: Vec<Candle> = series.candles().filter(|c| c.date != d("2024-01-12")).cloned().collect();
        series = PriceSeries::from_candles("NSE:SBIN-EQ", kept);

        let weeks = MomentumCalculator::weekly_closes(&series);
        assert_eq!(weeks, vec![(d("2024-01-05"), 100.0), (d("2024-01-11"), 101.0)]);
    }

    #[test]
    fn test_needs_lookback_plus_one_weeks() {
        let calc = MomentumCalculator::new(12);
        let levels: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        assert!(calc.latest(&weekly_series("NSE:SBIN-EQ", &levels)).is_none());

        let levels: Vec<f64> = (0..13).map(|i| 100.0 + i as f64).collect();
        let score = calc.latest(&weekly_series("NSE:SBIN-EQ", &levels)).unwrap();
        assert_eq!(score.momentum, 0.12);
        assert_eq!(score.date, d("2024-03-29"));
        assert_eq!(score.close, 112.0);
    }

    #[test]
    fn test_rolling_window_and_rounding() {
        let calc = MomentumCalculator::new(2);
        let series = weekly_series("NSE:TCS-EQ", &[300.0, 330.0, 297.0, 303.0]);
        let scores = calc.scores(&series);

        assert_eq!(scores.len(), 2);
        // 297 / 300 - 1
        assert_eq!(scores[0].momentum, -0.01);
        // 303 / 330 - 1 = -0.0818181...
        assert_eq!(scores[1].momentum, -0.08182);
    }

    #[test]
    fn test_zero_close_window_skipped() {
        let calc = MomentumCalculator::new(1);
        let series = weekly_series("NSE:XYZ-EQ", &[0.0, 10.0, 11.0]);
        let scores = calc.scores(&series);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].momentum, 0.1);
    }

    #[test]
    fn test_in_progress_week_scored_at_latest_bar() {
        let calc = MomentumCalculator::new(1);
        let full = weekly_series("NSE:INFY-EQ", &[100.0, 100.0, 120.0]);
        // Run on Wednesday 2024-01-17: Thursday and Friday not traded yet
        let kept: Vec<Candle> = full.candles().filter(|c| c.date <= d("2024-01-17")).cloned().collect();
        let series = PriceSeries::from_candles("NSE:INFY-EQ", kept);

        let score = calc.latest(&series).unwrap();
        assert_eq!(score.date, d("2024-01-17"));
        assert_eq!(score.momentum, 0.2);
        assert_eq!(week_ending(score.date), d("2024-01-19"));
    }
}
