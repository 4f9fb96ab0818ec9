use crate::config::FyersConfig;
use crate::error::BrokerError;
use crate::execution::fyers_auth::Session;
use crate::execution::rest_client::{RestClient, RestRequest};
use crate::execution::{HistorySource, OrderGateway};
use crate::models::candle::Candle;
use crate::models::order::OrderRequest;
use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, Offset, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Widest date range the broker serves for daily candles in one call.
pub const MAX_DAILY_WINDOW_DAYS: u64 = 365;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or(Utc.fix())
}

/// Calendar date on the exchange (India Standard Time).
pub fn ist_today() -> NaiveDate {
    Utc::now().with_timezone(&ist()).date_naive()
}

/// Map a `{"s": "error"}` payload to [`BrokerError::Api`].
pub fn check_response(value: Value) -> Result<Value, BrokerError> {
    if value.get("s").and_then(Value::as_str) == Some("error") {
        return Err(BrokerError::Api {
            code: value.get("code").and_then(Value::as_i64).unwrap_or(-1),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    Ok(value)
}

/// Split `[from, to]` into consecutive inclusive windows of at most
/// [`MAX_DAILY_WINDOW_DAYS`] days.
pub fn daily_windows(from: NaiveDate, to: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut start = from;

    while start <= to {
        let end = start
            .checked_add_days(Days::new(MAX_DAILY_WINDOW_DAYS - 1))
            .map_or(to, |e| e.min(to));
        windows.push((start, end));
        match end.checked_add_days(Days::new(1)) {
            Some(next) => start = next,
            None => break,
        }
    }
    windows
}

/// Decode `candles: [[epoch, o, h, l, c, v], ...]` into daily bars dated in IST.
/// Rows that are not six numbers are skipped.
pub fn decode_candles(symbol: &str, payload: &Value) -> Result<Vec<Candle>, BrokerError> {
    let Some(rows) = payload.get("candles").and_then(Value::as_array) else {
        if payload.get("s").and_then(Value::as_str) == Some("no_data") {
            return Ok(Vec::new());
        }
        return Err(BrokerError::MissingField("candles"));
    };

    let offset = ist();
    let mut candles = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for row in rows {
        let fields: Option<Vec<f64>> = row
            .as_array()
            .filter(|r| r.len() >= 6)
            .and_then(|r| r.iter().take(6).map(Value::as_f64).collect());
        let Some(f) = fields else {
            skipped += 1;
            continue;
        };
        let Some(ts) = DateTime::from_timestamp(f[0] as i64, 0) else {
            skipped += 1;
            continue;
        };

        candles.push(Candle {
            symbol: symbol.to_string(),
            date: ts.with_timezone(&offset).date_naive(),
            open: f[1],
            high: f[2],
            low: f[3],
            close: f[4],
            volume: f[5],
        });
    }

    if skipped > 0 {
        warn!(symbol, skipped, "Skipped malformed candle rows");
    }
    Ok(candles)
}

/// Keep only the orders whose `id` is listed.
pub fn filter_orderbook(mut payload: Value, ids: &[&str]) -> Value {
    if let Some(book) = payload.get_mut("orderBook").and_then(Value::as_array_mut) {
        book.retain(|order| {
            order
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| ids.contains(&id))
        });
    }
    payload
}

/// Authenticated client for the Fyers v3 REST API.
pub struct FyersClient {
    client: RestClient,
    api_host: String,
    data_host: String,
    authorization: String,
}

impl FyersClient {
    pub fn new(client: RestClient, config: &FyersConfig, session: &Session) -> Self {
        Self::with_hosts(client, &config.api_host, &config.data_host, session)
    }

    pub fn with_hosts(client: RestClient, api_host: &str, data_host: &str, session: &Session) -> Self {
        Self {
            client,
            api_host: api_host.trim_end_matches('/').to_string(),
            data_host: data_host.trim_end_matches('/').to_string(),
            authorization: format!("{}:{}", session.client_id, session.access_token),
        }
    }

    fn api(&self, method: &str, path: &str) -> RestRequest {
        self.authed(RestRequest::new(method, format!("{}{path}", self.api_host)))
    }

    fn data(&self, path: &str) -> RestRequest {
        self.authed(RestRequest::get(format!("{}{path}", self.data_host)))
    }

    fn authed(&self, req: RestRequest) -> RestRequest {
        req.header("Authorization", self.authorization.as_str())
            .header("version", "3")
    }

    async fn call(&self, req: RestRequest) -> Result<Value, BrokerError> {
        check_response(self.client.send(&req).await?)
    }

    pub async fn profile(&self) -> Result<Value, BrokerError> {
        self.call(self.api("GET", "/profile")).await
    }

    pub async fn funds(&self) -> Result<Value, BrokerError> {
        self.call(self.api("GET", "/funds")).await
    }

    pub async fn holdings(&self) -> Result<Value, BrokerError> {
        self.call(self.api("GET", "/holdings")).await
    }

    pub async fn positions(&self) -> Result<Value, BrokerError> {
        self.call(self.api("GET", "/positions")).await
    }

    pub async fn orderbook(&self) -> Result<Value, BrokerError> {
        self.call(self.api("GET", "/orders")).await
    }

    pub async fn tradebook(&self) -> Result<Value, BrokerError> {
        self.call(self.api("GET", "/tradebook")).await
    }

    /// Order book restricted to `ids`.
    pub async fn get_orders(&self, ids: &[&str]) -> Result<Value, BrokerError> {
        Ok(filter_orderbook(self.orderbook().await?, ids))
    }

    pub async fn market_status(&self) -> Result<Value, BrokerError> {
        self.call(self.data("/marketStatus")).await
    }

    /// Body: symbol, positionSide, convertQty, convertFrom, convertTo.
    pub async fn convert_position(&self, body: Value) -> Result<Value, BrokerError> {
        self.call(self.api("POST", "/positions").json(body)).await
    }

    pub async fn place_order(&self, order: &OrderRequest) -> Result<Value, BrokerError> {
        let body = serde_json::to_value(order).map_err(|e| BrokerError::Api {
            code: -1,
            message: format!("unserialisable order: {e}"),
        })?;
        self.call(self.api("POST", "/orders/sync").json(body)).await
    }

    /// Body: id plus any of limitPrice, stopPrice, qty, type.
    pub async fn modify_order(&self, body: Value) -> Result<Value, BrokerError> {
        self.call(self.api("PATCH", "/orders/sync").json(body)).await
    }

    pub async fn cancel_order(&self, id: &str) -> Result<Value, BrokerError> {
        self.call(self.api("DELETE", "/orders/sync").json(json!({ "id": id })))
            .await
    }

    /// Close one position, or every open position when `id` is `None`.
    pub async fn exit_positions(&self, id: Option<&str>) -> Result<Value, BrokerError> {
        let body = match id {
            Some(id) => json!({ "id": id }),
            None => json!({ "exit_all": 1 }),
        };
        self.call(self.api("DELETE", "/positions").json(body)).await
    }

    pub async fn place_basket_orders(&self, orders: &[OrderRequest]) -> Result<Value, BrokerError> {
        let body = serde_json::to_value(orders).map_err(|e| BrokerError::Api {
            code: -1,
            message: format!("unserialisable basket: {e}"),
        })?;
        self.call(self.api("POST", "/multi-order/sync").json(body)).await
    }

    pub async fn modify_basket_orders(&self, body: Value) -> Result<Value, BrokerError> {
        self.call(self.api("PATCH", "/multi-order/sync").json(body)).await
    }

    pub async fn cancel_basket_orders(&self, ids: &[&str]) -> Result<Value, BrokerError> {
        let body: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
        self.call(self.api("DELETE", "/multi-order/sync").json(Value::Array(body)))
            .await
    }

    /// Raw candle query. `resolution` is "D" or a minute count such as "15".
    pub async fn history(
        &self,
        symbol: &str,
        resolution: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Value, BrokerError> {
        let req = self
            .data("/history")
            .query("symbol", symbol)
            .query("resolution", resolution)
            .query("date_format", "1")
            .query("range_from", from.format("%Y-%m-%d").to_string())
            .query("range_to", to.format("%Y-%m-%d").to_string())
            .query("cont_flag", "1");
        self.call(req).await
    }

    /// Up to 50 comma-joined symbols per call.
    pub async fn quotes(&self, symbols: &[&str]) -> Result<Value, BrokerError> {
        self.call(self.data("/quotes").query("symbols", symbols.join(",")))
            .await
    }

    pub async fn depth(&self, symbol: &str, with_ohlcv: bool) -> Result<Value, BrokerError> {
        let req = self
            .data("/depth")
            .query("symbol", symbol)
            .query("ohlcv_flag", if with_ohlcv { "1" } else { "0" });
        self.call(req).await
    }

    /// Daily bars for `[from, to]`, fetched window by window.
    pub async fn history_daily(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candle>, BrokerError> {
        let mut candles = Vec::new();
        for (start, end) in daily_windows(from, to) {
            let payload = self.history(symbol, "D", start, end).await?;
            let batch = decode_candles(symbol, &payload)?;
            debug!(symbol, %start, %end, bars = batch.len(), "History window fetched");
            candles.extend(batch);
        }
        Ok(candles)
    }
}

#[async_trait]
impl HistorySource for FyersClient {
    async fn daily_candles(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candle>, BrokerError> {
        self.history_daily(symbol, from, to).await
    }
}

#[async_trait]
impl OrderGateway for FyersClient {
    async fn submit_basket(&self, orders: &[OrderRequest]) -> Result<Value, BrokerError> {
        self.place_basket_orders(orders).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_error_payload_becomes_api_error() {
        let err = check_response(json!({"s": "error", "code": -16, "message": "Could not authenticate the user"}))
            .unwrap_err();
        match err {
            BrokerError::Api { code, message } => {
                assert_eq!(code, -16);
                assert_eq!(message, "Could not authenticate the user");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(check_response(json!({"s": "ok", "code": 200})).is_ok());
        assert!(check_response(json!([1, 2])).is_ok());
    }

    #[test]
    fn test_daily_windows_cover_range() {
        let windows = daily_windows(d("2022-01-01"), d("2024-03-29"));
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], (d("2022-01-01"), d("2022-12-31")));
        assert_eq!(windows[1], (d("2023-01-01"), d("2023-12-31")));
        assert_eq!(windows[2], (d("2024-01-01"), d("2024-03-29")));

        assert_eq!(daily_windows(d("2024-03-29"), d("2024-03-29")).len(), 1);
        assert!(daily_windows(d("2024-03-29"), d("2024-03-28")).is_empty());
    }

    #[test]
    fn test_decode_candles_in_ist() {
        // 2024-01-01T18:45:00Z is 00:15 on 2 Jan in India
        let payload = json!({
            "s": "ok",
            "candles": [
                [1704134700, 600.0, 610.5, 598.0, 608.25, 120000],
                [1704220200, 608.0, 612.0, 600.0, 601.0, 98000],
                ["bad", 1, 2, 3, 4, 5],
                [1704306600, 1, 2]
            ]
        });
        let candles = decode_candles("NSE:SBIN-EQ", &payload).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].date, d("2024-01-02"));
        assert_eq!(candles[0].close, 608.25);
        assert_eq!(candles[1].date, d("2024-01-03"));
        assert_eq!(candles[1].volume, 98000.0);
    }

    #[test]
    fn test_decode_no_data_and_missing() {
        assert!(decode_candles("X", &json!({"s": "no_data"})).unwrap().is_empty());
        assert!(matches!(
            decode_candles("X", &json!({"s": "ok"})),
            Err(BrokerError::MissingField("candles"))
        ));
    }

    #[test]
    fn test_filter_orderbook() {
        let payload = json!({
            "s": "ok",
            "orderBook": [{"id": "a1", "qty": 1}, {"id": "b2", "qty": 2}, {"id": "c3", "qty": 3}]
        });
        let filtered = filter_orderbook(payload, &["a1", "c3"]);
        let ids: Vec<&str> = filtered["orderBook"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a1", "c3"]);
    }
}
