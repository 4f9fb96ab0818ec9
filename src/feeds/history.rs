use crate::execution::HistorySource;
use crate::models::candle::Candle;
use crate::storage::history::HistoryStore;
use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

/// Result of one history refresh.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub requested: usize,
    pub fetched_candles: usize,
    pub merged_candles: usize,
    pub failed: Vec<(String, String)>,
}

/// Brings the local history up to `today` for a set of symbols.
pub struct HistoryUpdater<'a, S> {
    source: &'a S,
    concurrency: usize,
}

impl<'a, S: HistorySource> HistoryUpdater<'a, S> {
    pub fn new(source: &'a S, concurrency: usize) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch missing bars concurrently and merge them into `store`.
    /// Symbols whose fetch fails are logged and left as they were.
    pub async fn update(&self, store: &mut HistoryStore, symbols: &[String], today: NaiveDate) -> UpdateSummary {
        let requests: Vec<(String, NaiveDate)> = symbols
            .iter()
            .map(|s| {
                if store.last_date(s).is_none() {
                    info!(symbol = %s, "No stored data, fetching full history");
                }
                (s.clone(), store.next_fetch_start(s, today))
            })
            .collect();

        let source = self.source;
        let results: Vec<(String, Result<Vec<Candle>, String>)> = stream::iter(requests)
            .map(|(symbol, from)| async move {
                let fetched = source
                    .daily_candles(&symbol, from, today)
                    .await
                    .map_err(|e| e.to_string());
                (symbol, fetched)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = UpdateSummary {
            requested: symbols.len(),
            ..Default::default()
        };
        for (symbol, result) in results {
            match result {
                Ok(candles) => {
                    summary.fetched_candles += candles.len();
                    summary.merged_candles += store.merge(candles);
                }
                Err(e) => {
                    warn!(%symbol, "History fetch failed: {e}");
                    summary.failed.push((symbol, e));
                }
            }
        }

        info!(
            symbols = summary.requested,
            fetched = summary.fetched_candles,
            merged = summary.merged_candles,
            failed = summary.failed.len(),
            "History updated"
        );
        summary
    }
}
