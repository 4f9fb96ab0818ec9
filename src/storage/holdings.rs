use crate::models::portfolio::TargetPortfolio;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SUFFIX: &str = "_holdings.json";

/// Per-run portfolio snapshots: `<dir>/<YYYY-MM-DD>_holdings.json`.
pub struct HoldingsStore {
    dir: PathBuf,
}

impl HoldingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}{SUFFIX}", date.format("%Y-%m-%d")))
    }

    pub fn save(&self, portfolio: &TargetPortfolio) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.file_for(portfolio.as_of);
        let json = serde_json::to_string_pretty(portfolio)
            .context("Failed to serialise holdings")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write holdings to {}", path.display()))?;

        debug!(path = %path.display(), holdings = portfolio.len(), "Holdings saved");
        Ok(path)
    }

    /// Dates with a snapshot on disk, ascending.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(SUFFIX)) else {
                continue;
            };
            if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// Most recent snapshot dated on or before `as_of`.
    pub fn latest_on_or_before(&self, as_of: NaiveDate) -> Result<Option<TargetPortfolio>> {
        let Some(date) = self.dates()?.into_iter().rev().find(|d| *d <= as_of) else {
            info!(dir = %self.dir.display(), "No previous holdings, starting a fresh portfolio");
            return Ok(None);
        };
        load(&self.file_for(date)).map(Some)
    }
}

fn load(path: &Path) -> Result<TargetPortfolio> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read holdings from {}", path.display()))?;
    let portfolio: TargetPortfolio = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse holdings from {}", path.display()))?;

    info!(
        path = %path.display(),
        as_of = %portfolio.as_of,
        holdings = portfolio.len(),
        "Previous holdings loaded"
    );
    Ok(portfolio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::portfolio::Holding;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn portfolio(as_of: &str, symbol: &str) -> TargetPortfolio {
        TargetPortfolio {
            as_of: d(as_of),
            holdings: vec![Holding {
                symbol: symbol.into(),
                qty: 5,
                entry_price: dec!(1020.4),
                momentum: 0.31,
                rank: 1,
            }],
        }
    }

    #[test]
    fn test_file_name() {
        let store = HoldingsStore::new("/srv/data");
        assert_eq!(
            store.file_for(d("2024-03-29")),
            PathBuf::from("/srv/data/2024-03-29_holdings.json")
        );
    }

    #[test]
    fn test_latest_on_or_before() {
        let dir = TempDir::new().unwrap();
        let store = HoldingsStore::new(dir.path());

        store.save(&portfolio("2024-03-15", "NSE:A-EQ")).unwrap();
        store.save(&portfolio("2024-03-22", "NSE:B-EQ")).unwrap();
        store.save(&portfolio("2024-04-05", "NSE:C-EQ")).unwrap();
        fs::write(dir.path().join("ohlc_data.csv"), "ignored").unwrap();

        assert_eq!(store.dates().unwrap().len(), 3);

        let prev = store.latest_on_or_before(d("2024-03-29")).unwrap().unwrap();
        assert_eq!(prev.as_of, d("2024-03-22"));
        assert!(prev.contains("NSE:B-EQ"));
        assert_eq!(prev.holdings[0].entry_price, dec!(1020.4));

        let same_day = store.latest_on_or_before(d("2024-03-22")).unwrap().unwrap();
        assert_eq!(same_day.as_of, d("2024-03-22"));

        assert!(store.latest_on_or_before(d("2024-03-01")).unwrap().is_none());
    }

    #[test]
    fn test_missing_dir_means_no_holdings() {
        let dir = TempDir::new().unwrap();
        let store = HoldingsStore::new(dir.path().join("nope"));
        assert!(store.latest_on_or_before(d("2024-03-29")).unwrap().is_none());
    }
}
