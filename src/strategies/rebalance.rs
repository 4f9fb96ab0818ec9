use crate::models::order::{OrderRequest, OrderSide};
use crate::models::portfolio::{Holding, TargetPortfolio};
use crate::models::signal::RankedStock;
use crate::risk::sizing::Sizing;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Orders needed to move from the previous holdings to the new target.
#[derive(Debug, Clone)]
pub struct RebalancePlan {
    pub sells: Vec<OrderRequest>,
    pub buys: Vec<OrderRequest>,
    pub kept: Vec<String>,
    /// Target symbols that could not be bought (price unknown or slot too small).
    pub skipped: Vec<String>,
    pub target: TargetPortfolio,
}

impl RebalancePlan {
    pub fn is_empty(&self) -> bool {
        self.sells.is_empty() && self.buys.is_empty()
    }

    /// Sells first so proceeds settle before new buys.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.sells.iter().chain(self.buys.iter()).cloned().collect()
    }
}

/// Chooses the target portfolio from a ranking.
///
/// The target is the top `portfolio_size` ranked stocks whose momentum is at
/// least `threshold`. Held stocks that drop out are sold; held stocks that
/// stay are left alone; new entries are bought with an equal cash slot.
#[derive(Debug, Clone)]
pub struct Rebalancer {
    cash: Decimal,
    portfolio_size: usize,
    threshold: f64,
}

impl Rebalancer {
    pub fn new(cash: Decimal, portfolio_size: usize, threshold: f64) -> Self {
        Self {
            cash,
            portfolio_size,
            threshold,
        }
    }

    /// Ranked stocks eligible for the portfolio, best first.
    pub fn selection<'a>(&self, ranked: &'a [RankedStock]) -> Vec<&'a RankedStock> {
        ranked
            .iter()
            .filter(|r| r.momentum >= self.threshold)
            .take(self.portfolio_size)
            .collect()
    }

    pub fn plan(
        &self,
        previous: Option<&TargetPortfolio>,
        ranked: &[RankedStock],
        as_of: NaiveDate,
    ) -> RebalancePlan {
        let selected = self.selection(ranked);
        let by_symbol: HashMap<&str, &RankedStock> =
            ranked.iter().map(|r| (r.symbol.as_str(), r)).collect();
        let slot = Sizing::slot_cash(self.cash, self.portfolio_size);

        let mut sells = Vec::new();
        let mut kept = Vec::new();
        let mut holdings: Vec<Holding> = Vec::new();

        if let Some(prev) = previous {
            for held in &prev.holdings {
                if selected.iter().any(|s| s.symbol == held.symbol) {
                    kept.push(held.symbol.clone());
                    let mut holding = held.clone();
                    if let Some(r) = by_symbol.get(held.symbol.as_str()) {
                        holding.momentum = r.momentum;
                        holding.rank = r.rank;
                    }
                    holdings.push(holding);
                    continue;
                }

                // No longer wanted: limit at the last close, market if unranked
                let order = match by_symbol
                    .get(held.symbol.as_str())
                    .and_then(|r| Sizing::limit_price(r.close))
                {
                    Some(price) => OrderRequest::limit(&held.symbol, OrderSide::Sell, held.qty, price),
                    None => OrderRequest::market(&held.symbol, OrderSide::Sell, held.qty),
                };
                debug!(symbol = %held.symbol, qty = held.qty, "Exit planned");
                sells.push(order);
            }
        }

        let mut buys = Vec::new();
        let mut skipped = Vec::new();

        for stock in selected {
            if kept.contains(&stock.symbol) {
                continue;
            }

            let Some(price) = Sizing::limit_price(stock.close) else {
                warn!(symbol = %stock.symbol, close = stock.close, "No usable price, skipping entry");
                skipped.push(stock.symbol.clone());
                continue;
            };

            let qty = Sizing::quantity(slot, price);
            if qty == 0 {
                warn!(symbol = %stock.symbol, %price, %slot, "Slot cash below one share, skipping entry");
                skipped.push(stock.symbol.clone());
                continue;
            }

            buys.push(OrderRequest::limit(&stock.symbol, OrderSide::Buy, qty, price));
            holdings.push(Holding {
                symbol: stock.symbol.clone(),
                qty,
                entry_price: price,
                momentum: stock.momentum,
                rank: stock.rank,
            });
        }

        holdings.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.symbol.cmp(&b.symbol)));

        RebalancePlan {
            sells,
            buys,
            kept,
            skipped,
            target: TargetPortfolio { as_of, holdings },
        }
    }
}
