use crate::execution::OrderGateway;
use crate::models::order::{OrderRequest, OrderSide};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Largest basket the broker accepts in one `/multi-order/sync` call.
pub const MAX_BASKET_SIZE: usize = 10;

/// Outcome of one submission pass.
#[derive(Debug, Default)]
pub struct SubmitReport {
    pub submitted: Vec<OrderRequest>,
    pub failed: Vec<(OrderRequest, String)>,
    pub responses: Vec<Value>,
    pub dry_run: bool,
}

impl SubmitReport {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        let buys = self.submitted.iter().filter(|o| o.side == OrderSide::Buy).count();
        let sells = self.submitted.len() - buys;
        let mode = if self.dry_run { " (dry run)" } else { "" };
        format!(
            "{sells} sell / {buys} buy orders sent, {} failed{mode}",
            self.failed.len()
        )
    }
}

/// Orders the broker refused inside an accepted basket, by position.
///
/// `/multi-order/sync` can answer `"s": "ok"` overall while single entries of
/// `data` carry `statusCode >= 400` or `body.s == "error"`. Entries line up
/// with the submitted orders.
pub fn basket_rejections(response: &Value) -> HashMap<usize, String> {
    let Some(entries) = response.get("data").and_then(Value::as_array) else {
        return HashMap::new();
    };
    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let status = entry.get("statusCode").and_then(Value::as_i64).unwrap_or(200);
            let body = entry.get("body");
            let body_error = body.and_then(|b| b.get("s")).and_then(Value::as_str) == Some("error");
            if status < 400 && !body_error {
                return None;
            }
            let message = body
                .and_then(|b| b.get("message"))
                .and_then(Value::as_str)
                .or_else(|| entry.get("statusDescription").and_then(Value::as_str))
                .unwrap_or("rejected")
                .to_string();
            Some((i, message))
        })
        .collect()
}

/// Sends rebalance orders to the broker in baskets.
///
/// Sells go out before buys. A failed basket is recorded and the
/// remaining baskets are still attempted. Orders the broker rejects
/// inside an accepted basket count as failed, not submitted.
pub struct OrderSubmitter<'a, G> {
    gateway: &'a G,
    dry_run: bool,
}

impl<'a, G: OrderGateway> OrderSubmitter<'a, G> {
    pub fn new(gateway: &'a G, dry_run: bool) -> Self {
        Self { gateway, dry_run }
    }

    pub async fn submit(&self, orders: &[OrderRequest]) -> SubmitReport {
        let mut report = SubmitReport {
            dry_run: self.dry_run,
            ..Default::default()
        };
        if orders.is_empty() {
            return report;
        }

        let mut ordered: Vec<OrderRequest> = orders.to_vec();
        ordered.sort_by_key(|o| o.side != OrderSide::Sell);

        info!("Submitting {} orders in baskets of {MAX_BASKET_SIZE}", ordered.len());

        for basket in ordered.chunks(MAX_BASKET_SIZE) {
            if self.dry_run {
                for order in basket {
                    info!(
                        symbol = %order.symbol,
                        side = ?order.side,
                        qty = order.qty,
                        price = %order.limit_price,
                        "DRY RUN order"
                    );
                }
                report.submitted.extend_from_slice(basket);
                continue;
            }

            match self.gateway.submit_basket(basket).await {
                Ok(resp) => {
                    let rejected = basket_rejections(&resp);
                    for (i, order) in basket.iter().enumerate() {
                        match rejected.get(&i) {
                            Some(reason) => {
                                warn!(symbol = %order.symbol, side = ?order.side, "Order rejected: {reason}");
                                report.failed.push((order.clone(), reason.clone()));
                            }
                            None => report.submitted.push(order.clone()),
                        }
                    }
                    report.responses.push(resp);
                }
                Err(e) => {
                    error!("Basket of {} orders rejected: {e}", basket.len());
                    let reason = e.to_string();
                    report
                        .failed
                        .extend(basket.iter().cloned().map(|o| (o, reason.clone())));
                }
            }
        }

        info!("Batch result: {}", report.summary());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        baskets: Mutex<Vec<Vec<OrderRequest>>>,
        reject_call: Option<usize>,
        reply: Option<Value>,
    }

    #[async_trait]
    impl OrderGateway for Recorder {
        async fn submit_basket(&self, orders: &[OrderRequest]) -> Result<Value, BrokerError> {
            let mut baskets = self.baskets.lock().unwrap();
            let call = baskets.len();
            baskets.push(orders.to_vec());
            if self.reject_call == Some(call) {
                return Err(BrokerError::Api { code: -50, message: "RMS rejected".into() });
            }
            Ok(self
                .reply
                .clone()
                .unwrap_or_else(|| serde_json::json!({"s": "ok", "code": 200})))
        }
    }

    fn orders(buys: usize, sells: usize) -> Vec<OrderRequest> {
        let mut out: Vec<OrderRequest> = (0..buys)
            .map(|i| OrderRequest::limit(format!("NSE:B{i}-EQ"), OrderSide::Buy, 1, dec!(100)))
            .collect();
        out.extend((0..sells).map(|i| OrderRequest::limit(format!("NSE:S{i}-EQ"), OrderSide::Sell, 1, dec!(100))));
        out
    }

    #[tokio::test]
    async fn test_baskets_chunked_sells_first() {
        let gateway = Recorder::default();
        let submitter = OrderSubmitter::new(&gateway, false);
        let report = submitter.submit(&orders(8, 5)).await;

        assert!(report.all_ok());
        assert_eq!(report.submitted.len(), 13);

        let baskets = gateway.baskets.lock().unwrap();
        assert_eq!(baskets.len(), 2);
        assert_eq!(baskets[0].len(), 10);
        assert_eq!(baskets[1].len(), 3);
        assert!(baskets[0][..5].iter().all(|o| o.side == OrderSide::Sell));
        assert!(baskets[0][5..].iter().all(|o| o.side == OrderSide::Buy));
    }

    #[tokio::test]
    async fn test_dry_run_never_calls_gateway() {
        let gateway = Recorder::default();
        let submitter = OrderSubmitter::new(&gateway, true);
        let report = submitter.submit(&orders(3, 2)).await;

        assert!(report.dry_run);
        assert_eq!(report.submitted.len(), 5);
        assert!(gateway.baskets.lock().unwrap().is_empty());
        assert!(report.summary().contains("dry run"));
    }

    #[tokio::test]
    async fn test_failed_basket_recorded_rest_continue() {
        let gateway = Recorder {
            reject_call: Some(0),
            ..Default::default()
        };
        let submitter = OrderSubmitter::new(&gateway, false);
        let report = submitter.submit(&orders(12, 0)).await;

        assert_eq!(report.failed.len(), 10);
        assert_eq!(report.submitted.len(), 2);
        assert!(report.failed[0].1.contains("RMS rejected"));
        assert!(!report.all_ok());
    }

    #[tokio::test]
    async fn test_empty_is_noop() {
        let gateway = Recorder::default();
        let report = OrderSubmitter::new(&gateway, false).submit(&[]).await;
        assert!(report.submitted.is_empty());
        assert!(gateway.baskets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_entries_in_accepted_basket_fail() {
        let gateway = Recorder {
            reply: Some(serde_json::json!({
                "s": "ok",
                "code": 200,
                "data": [
                    {"statusCode": 200, "body": {"s": "ok", "code": 1101, "id": "24030100001"}},
                    {"statusCode": 400, "body": {"s": "error", "code": -99, "message": "RMS: insufficient funds"}},
                    {"statusCode": 200, "body": {"s": "error", "code": -50, "message": "Invalid price"}}
                ]
            })),
            ..Default::default()
        };
        let report = OrderSubmitter::new(&gateway, false).submit(&orders(3, 0)).await;

        assert!(!report.all_ok());
        assert_eq!(report.submitted.len(), 1);
        assert_eq!(report.submitted[0].symbol, "NSE:B0-EQ");
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].0.symbol, "NSE:B1-EQ");
        assert_eq!(report.failed[0].1, "RMS: insufficient funds");
        assert_eq!(report.failed[1].1, "Invalid price");
    }

    #[test]
    fn test_basket_rejections_tolerates_missing_data() {
        assert!(basket_rejections(&serde_json::json!({"s": "ok"})).is_empty());
        let only_status = serde_json::json!({"data": [{"statusCode": 500, "statusDescription": "Server error"}]});
        assert_eq!(basket_rejections(&only_status).get(&0).map(String::as_str), Some("Server error"));
    }
}
