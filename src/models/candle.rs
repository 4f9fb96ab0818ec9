use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One daily OHLCV bar for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Non-negative, finite prices and volume with low <= open/close <= high.
    pub fn is_sane(&self) -> bool {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return false;
        }
        self.low <= self.high
            && (self.low..=self.high).contains(&self.open)
            && (self.low..=self.high).contains(&self.close)
    }
}

/// Date-ordered candles for one symbol. Dates are unique; a later insert
/// for an existing date replaces the earlier bar.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    symbol: String,
    candles: BTreeMap<NaiveDate, Candle>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            candles: BTreeMap::new(),
        }
    }

    pub fn from_candles(symbol: impl Into<String>, candles: impl IntoIterator<Item = Candle>) -> Self {
        let mut series = Self::new(symbol);
        for c in candles {
            series.insert(c);
        }
        series
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Insert a bar. Bars for another symbol or failing [`Candle::is_sane`] are
    /// dropped; returns whether the bar was stored.
    pub fn insert(&mut self, candle: Candle) -> bool {
        if candle.symbol != self.symbol || !candle.is_sane() {
            return false;
        }
        self.candles.insert(candle.date, candle);
        true
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> impl Iterator<Item = &Candle> {
        self.candles.values()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.candles.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.candles.keys().next_back().copied()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.values().next_back()
    }
}
