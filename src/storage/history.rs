//! Local daily price history, one CSV file for the whole universe.

use crate::models::candle::{Candle, PriceSeries};
use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// First day requested for a symbol with no stored history.
pub fn history_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub struct HistoryStore {
    path: PathBuf,
    series: BTreeMap<String, PriceSeries>,
}

impl HistoryStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            series: BTreeMap::new(),
        }
    }

    /// Read the CSV at `path`. A missing file is a fresh start.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::empty(path);

        if !store.path.exists() {
            info!(path = %store.path.display(), "No stored history found, starting fresh");
            return Ok(store);
        }

        let mut reader = csv::Reader::from_path(&store.path)
            .with_context(|| format!("Failed to open history file {}", store.path.display()))?;

        let mut rejected = 0usize;
        for (line, record) in reader.deserialize::<Candle>().enumerate() {
            let candle = record.with_context(|| {
                format!("Bad history row {} in {}", line + 2, store.path.display())
            })?;
            if !store.insert(candle) {
                rejected += 1;
            }
        }
        if rejected > 0 {
            warn!(rejected, "Dropped malformed candles from stored history");
        }

        info!(
            path = %store.path.display(),
            symbols = store.series.len(),
            candles = store.candle_count(),
            "History loaded"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn insert(&mut self, candle: Candle) -> bool {
        self.series
            .entry(candle.symbol.clone())
            .or_insert_with(|| PriceSeries::new(candle.symbol.clone()))
            .insert(candle)
    }

    /// Merge fetched candles. A bar for an existing (symbol, date) replaces
    /// the stored one. Returns how many bars were accepted.
    pub fn merge(&mut self, candles: impl IntoIterator<Item = Candle>) -> usize {
        candles.into_iter().map(|c| self.insert(c)).filter(|stored| *stored).count()
    }

    /// Write atomically: temp file in the same directory, then rename.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("Failed to create {}", tmp.display()))?;
            for candle in self.series.values().flat_map(PriceSeries::candles) {
                writer.serialize(candle).context("Failed to serialise candle")?;
            }
            writer.flush().context("Failed to flush history file")?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), candles = self.candle_count(), "History saved");
        Ok(())
    }

    pub fn series(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn candle_count(&self) -> usize {
        self.series.values().map(PriceSeries::len).sum()
    }

    pub fn last_date(&self, symbol: &str) -> Option<NaiveDate> {
        self.series.get(symbol).and_then(PriceSeries::last_date)
    }

    /// First date to request for `symbol` so that history reaches `today`.
    ///
    /// Unknown symbol: [`history_start`]. Stored up to today: `today`, so the
    /// day's bar is refreshed. Otherwise the day after the last stored bar.
    pub fn next_fetch_start(&self, symbol: &str, today: NaiveDate) -> NaiveDate {
        match self.last_date(symbol) {
            None => history_start(),
            Some(last) if last >= today => today,
            Some(last) => last.checked_add_days(Days::new(1)).unwrap_or(today),
        }
    }
}
