//! Broker connectivity: HTTP plumbing, login and order routing.

pub mod basket;
pub mod fyers_auth;
pub mod fyers_client;
pub mod rest_client;
pub mod retry;
pub mod totp;

use crate::error::BrokerError;
use crate::models::candle::Candle;
use crate::models::order::OrderRequest;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// Source of daily price bars.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Bars for `symbol` between `from` and `to`, both inclusive.
    async fn daily_candles(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candle>, BrokerError>;
}

/// Destination for basket orders.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit_basket(&self, orders: &[OrderRequest]) -> Result<Value, BrokerError>;
}
