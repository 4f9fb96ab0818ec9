mod common;

use common::{serve, Recorded, Reply};
use momentum_swing::config::{Config, TelemetryConfig};
use momentum_swing::execution::rest_client::RestClient;
use momentum_swing::telemetry::alerts::AlertManager;
use serde_json::json;
use std::time::Duration;

fn telemetry() -> TelemetryConfig {
    let mut telemetry = Config::default().telemetry;
    telemetry.telegram_bot_token = Some("123:abc".into());
    telemetry.telegram_chat_id = Some("-100200".into());
    telemetry
}

fn alerts(telemetry: TelemetryConfig, base: &str) -> AlertManager {
    AlertManager::new(telemetry, RestClient::new(Duration::from_secs(2)).unwrap()).with_api_base(base)
}

fn bot_reply(_: &Recorded) -> Reply {
    Reply::Json(200, json!({"ok": true, "result": {"message_id": 7}}))
}

#[tokio::test]
async fn test_send_message_posts_chat_and_text() {
    let server = serve(bot_reply).await;
    alerts(telemetry(), &server.base).send("Momentum swing 2024-03-01: 2 buys").await;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path(), "/bot123:abc/sendMessage");
    assert_eq!(
        requests[0].json(),
        json!({"chat_id": "-100200", "text": "Momentum swing 2024-03-01: 2 buys"})
    );
}

#[tokio::test]
async fn test_document_and_photo_upload_as_multipart() {
    let server = serve(bot_reply).await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("2024-03-01_holdings.json");
    std::fs::write(&file, r#"{"as_of":"2024-03-01","holdings":[]}"#).unwrap();
    let chart = dir.path().join("momentum.png");
    std::fs::write(&chart, "PNGDATA").unwrap();

    let bot = alerts(telemetry(), &server.base);
    bot.send_document(&file, "Holdings").await;
    bot.send_photo(&chart, "Ranking").await;

    let requests = server.requests();
    assert_eq!(requests.len(), 2);

    let doc = &requests[0];
    assert_eq!(doc.path(), "/bot123:abc/sendDocument");
    assert!(doc.header("content-type").unwrap().starts_with("multipart/form-data"));
    assert!(doc.body.contains(r#"name="chat_id""#));
    assert!(doc.body.contains("-100200"));
    assert!(doc.body.contains(r#"name="caption""#));
    assert!(doc.body.contains(r#"name="document"; filename="2024-03-01_holdings.json""#));
    assert!(doc.body.contains(r#"{"as_of":"2024-03-01","holdings":[]}"#));

    let photo = &requests[1];
    assert_eq!(photo.path(), "/bot123:abc/sendPhoto");
    assert!(photo.body.contains(r#"name="photo"; filename="momentum.png""#));
    assert!(photo.body.contains("PNGDATA"));
}

#[tokio::test]
async fn test_bot_errors_are_swallowed() {
    let server = serve(|_| Reply::Json(401, json!({"ok": false, "description": "Unauthorized"}))).await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("holdings.json");
    std::fs::write(&file, "{}").unwrap();

    let bot = alerts(telemetry(), &server.base);
    bot.send("hello").await;
    bot.send_document(&file, "Holdings").await;

    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_trade_and_error_alerts_follow_toggles() {
    let server = serve(bot_reply).await;
    let bot = alerts(telemetry(), &server.base);
    bot.on_trade("1 sell / 2 buy orders sent, 0 failed").await;
    bot.on_error("login failed").await;

    let texts: Vec<String> = server
        .requests()
        .iter()
        .map(|r| r.json()["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts[0], "Trade: 1 sell / 2 buy orders sent, 0 failed");
    assert!(texts[1].ends_with("Error: login failed"));

    let quiet = serve(bot_reply).await;
    let mut muted = telemetry();
    muted.alert_on_trade = false;
    muted.alert_on_error = false;
    let bot = alerts(muted, &quiet.base);
    bot.on_trade("ignored").await;
    bot.on_error("ignored").await;
    bot.send("still sent").await;

    let requests = quiet.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].json()["text"], "still sent");
}
