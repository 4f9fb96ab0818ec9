use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A stock held by the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub qty: u32,
    pub entry_price: Decimal,
    pub momentum: f64,
    pub rank: u32,
}

impl Holding {
    pub fn cost_basis(&self) -> Decimal {
        self.entry_price * Decimal::from(self.qty)
    }
}

/// Holdings the strategy intends to own after a rebalance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPortfolio {
    pub as_of: NaiveDate,
    pub holdings: Vec<Holding>,
}

impl TargetPortfolio {
    pub fn empty(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            holdings: Vec::new(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.holdings.iter().map(|h| h.symbol.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn invested(&self) -> Decimal {
        self.holdings.iter().map(Holding::cost_basis).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn holding(symbol: &str, qty: u32, price: Decimal) -> Holding {
        Holding {
            symbol: symbol.into(),
            qty,
            entry_price: price,
            momentum: 0.3,
            rank: 1,
        }
    }

    #[test]
    fn test_invested_and_lookup() {
        let portfolio = TargetPortfolio {
            as_of: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            holdings: vec![
                holding("NSE:SBIN-EQ", 9, dec!(600)),
                holding("NSE:TCS-EQ", 1, dec!(3800.5)),
            ],
        };

        assert_eq!(portfolio.invested(), dec!(9200.5));
        assert!(portfolio.contains("NSE:TCS-EQ"));
        assert!(!portfolio.contains("NSE:INFY-EQ"));
        assert_eq!(portfolio.symbols(), vec!["NSE:SBIN-EQ", "NSE:TCS-EQ"]);
    }

    #[test]
    fn test_json_shape() {
        let portfolio = TargetPortfolio {
            as_of: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            holdings: vec![holding("NSE:SBIN-EQ", 9, dec!(600.25))],
        };
        let json = serde_json::to_value(&portfolio).unwrap();
        assert_eq!(json["as_of"], "2024-03-01");
        assert_eq!(json["holdings"][0]["entry_price"], "600.25");
    }
}
