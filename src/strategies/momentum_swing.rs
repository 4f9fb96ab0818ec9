use crate::config::Config;
use crate::execution::basket::{OrderSubmitter, SubmitReport};
use crate::execution::{HistorySource, OrderGateway};
use crate::feeds::history::{HistoryUpdater, UpdateSummary};
use crate::feeds::universe::Universe;
use crate::models::order::OrderSide;
use crate::models::portfolio::TargetPortfolio;
use crate::models::signal::RankedStock;
use crate::signals::momentum::MomentumCalculator;
use crate::signals::ranking;
use crate::storage::history::HistoryStore;
use crate::storage::holdings::HoldingsStore;
use crate::strategies::rebalance::{RebalancePlan, Rebalancer};
use crate::telemetry::alerts::AlertManager;
use crate::telemetry::timing::StageTimer;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything one rebalance run did.
#[derive(Debug)]
pub struct RunReport {
    pub as_of: NaiveDate,
    pub universe: usize,
    pub history: UpdateSummary,
    pub ranked: Vec<RankedStock>,
    pub plan: RebalancePlan,
    pub submission: SubmitReport,
    /// Holdings actually owned after the run.
    pub holdings: TargetPortfolio,
    pub holdings_file: Option<PathBuf>,
}

impl RunReport {
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Momentum swing {}: {} symbols, {} ranked, {}",
            self.as_of,
            self.universe,
            self.ranked.len(),
            self.submission.summary()
        )];
        for order in &self.submission.submitted {
            let side = match order.side {
                OrderSide::Buy => "BUY",
                OrderSide::Sell => "SELL",
            };
            lines.push(format!("{side} {} x{} @ {}", order.symbol, order.qty, order.limit_price));
        }
        for (order, reason) in &self.submission.failed {
            lines.push(format!("FAILED {} x{}: {reason}", order.symbol, order.qty));
        }
        lines.join("\n")
    }
}

/// Latest momentum for each universe symbol that has enough history, ranked.
pub fn rank_universe(store: &HistoryStore, symbols: &[String], calc: &MomentumCalculator) -> Vec<RankedStock> {
    let scores = symbols
        .iter()
        .filter_map(|s| {
            let series = store.series(s)?;
            let score = calc.latest(series);
            if score.is_none() {
                warn!(symbol = %s, bars = series.len(), "Not enough history to score");
            }
            score
        })
        .collect();
    ranking::rank(scores)
}

/// Holdings after the run: the plan's target, minus buys the broker refused,
/// plus positions whose sell was refused.
pub fn settle(previous: Option<&TargetPortfolio>, plan: &RebalancePlan, submission: &SubmitReport) -> TargetPortfolio {
    let mut settled = plan.target.clone();

    let failed_buys: HashSet<&str> = submission
        .failed
        .iter()
        .filter(|(o, _)| o.side == OrderSide::Buy)
        .map(|(o, _)| o.symbol.as_str())
        .collect();
    settled.holdings.retain(|h| !failed_buys.contains(h.symbol.as_str()));

    if let Some(prev) = previous {
        for (order, _) in submission.failed.iter().filter(|(o, _)| o.side == OrderSide::Sell) {
            if let Some(held) = prev.get(&order.symbol) {
                settled.holdings.push(held.clone());
            }
        }
    }
    settled
}

/// Weekly momentum rotation over an NSE index.
pub struct MomentumSwing<B> {
    config: Config,
    broker: B,
    alerts: Arc<AlertManager>,
    timer: StageTimer,
}

impl<B: HistorySource + OrderGateway> MomentumSwing<B> {
    pub fn new(config: Config, broker: B, alerts: Arc<AlertManager>) -> Self {
        Self {
            config,
            broker,
            alerts,
            timer: StageTimer::new(),
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn timer(&self) -> &StageTimer {
        &self.timer
    }

    fn calculator(&self) -> MomentumCalculator {
        MomentumCalculator::new(self.config.strategy.lookback_weeks)
    }

    /// Load stored history, fetch what is missing up to `today`, save.
    pub async fn refresh_history(&self, symbols: &[String], today: NaiveDate) -> Result<(HistoryStore, UpdateSummary)> {
        let _t = self.timer.start("history");
        let mut store = HistoryStore::load(self.config.storage.history_file())?;
        let summary = HistoryUpdater::new(&self.broker, self.config.strategy.fetch_concurrency)
            .update(&mut store, symbols, today)
            .await;
        store.save()?;
        Ok((store, summary))
    }

    pub fn rank(&self, store: &HistoryStore, symbols: &[String]) -> Vec<RankedStock> {
        let _t = self.timer.start("rank");
        rank_universe(store, symbols, &self.calculator())
    }

    /// Full run for an already-resolved universe.
    pub async fn rebalance(&self, symbols: &[String], today: NaiveDate) -> Result<RunReport> {
        let (store, history) = self.refresh_history(symbols, today).await?;
        let ranked = self.rank(&store, symbols);
        info!(universe = symbols.len(), ranked = ranked.len(), "Momentum ranking ready");
        for r in ranked.iter().take(self.config.strategy.portfolio_size) {
            info!(rank = r.rank, symbol = %r.symbol, momentum = r.momentum, close = r.close, "Top pick");
        }

        let holdings_store = HoldingsStore::new(self.config.storage.data_dir());
        let previous = holdings_store.latest_on_or_before(today)?;

        let s = &self.config.strategy;
        let plan = Rebalancer::new(s.cash, s.portfolio_size, s.momentum_threshold).plan(previous.as_ref(), &ranked, today);
        info!(
            sells = plan.sells.len(),
            buys = plan.buys.len(),
            kept = plan.kept.len(),
            skipped = plan.skipped.len(),
            "Rebalance planned"
        );

        let submission = {
            let _t = self.timer.start("orders");
            OrderSubmitter::new(&self.broker, self.config.is_dry_run())
                .submit(&plan.orders())
                .await
        };

        let holdings = settle(previous.as_ref(), &plan, &submission);
        let holdings_file = if self.config.is_dry_run() {
            info!(holdings = ?holdings.symbols(), "Dry run: holdings not persisted");
            None
        } else {
            Some(holdings_store.save(&holdings)?)
        };

        Ok(RunReport {
            as_of: today,
            universe: symbols.len(),
            history,
            ranked,
            plan,
            submission,
            holdings,
            holdings_file,
        })
    }

    /// Resolve the benchmark universe, rebalance, and notify.
    pub async fn run(&self, universe: &Universe, today: NaiveDate) -> Result<RunReport> {
        let result = self.run_inner(universe, today).await;
        match &result {
            Ok(report) => {
                if !report.submission.submitted.is_empty() || !report.submission.failed.is_empty() {
                    self.alerts.on_trade(&report.summary()).await;
                } else {
                    self.alerts.send(&report.summary()).await;
                }
                if let Some(file) = &report.holdings_file {
                    self.alerts.send_document(file, "Holdings").await;
                }
            }
            Err(e) => self.alerts.on_error(&format!("{e:#}")).await,
        }
        self.timer.log_summary();
        result
    }

    async fn run_inner(&self, universe: &Universe, today: NaiveDate) -> Result<RunReport> {
        let symbols = {
            let _t = self.timer.start("universe");
            universe.symbols(&self.config.strategy.benchmark_index).await?
        };
        anyhow::ensure!(
            !symbols.is_empty(),
            "No tradable symbols for `{}`",
            self.config.strategy.benchmark_index
        );
        self.rebalance(&symbols, today).await
    }
}
