use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub fyers: FyersConfig,
    pub strategy: StrategyConfig,
    pub storage: StorageConfig,
    pub telemetry: TelemetryConfig,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FyersConfig {
    pub app_id: String,
    pub app_type: String, // e.g. "100"
    pub secret_key: String,
    pub fy_id: String,
    pub totp_key: String, // base32 authenticator secret
    pub pin: String,
    pub redirect_uri: String,
    pub login_host: String, // vagator: OTP / TOTP / PIN steps
    pub api_host: String,   // token exchange, account and order endpoints
    pub data_host: String,  // history, quotes, depth, market status
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub cash: Decimal,              // Total capital split across the portfolio
    pub benchmark_index: String,    // e.g. "nifty next 50"
    pub portfolio_size: usize,      // Number of stocks held at once
    pub momentum_threshold: f64,    // Minimum momentum to enter (e.g. 0.25)
    pub lookback_weeks: usize,      // Momentum window in weeks
    pub fetch_concurrency: usize,   // Parallel history fetches
    pub scrape_concurrency: usize,  // Parallel sector-map page fetches
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_json: bool,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub alert_on_trade: bool,
    pub alert_on_error: bool,
}

impl FyersConfig {
    /// `<app_id>-<app_type>`, the id the broker expects in auth headers.
    pub fn client_id(&self) -> String {
        format!("{}-{}", self.app_id, self.app_type)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn missing_credentials(&self) -> Vec<&'static str> {
        [
            ("FYERS_APP_ID", &self.app_id),
            ("FYERS_APP_TYPE", &self.app_type),
            ("FYERS_SECRET_KEY", &self.secret_key),
            ("FYERS_ID", &self.fy_id),
            ("FYERS_TOTP_KEY", &self.totp_key),
            ("FYERS_PIN", &self.pin),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

impl StorageConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.data_root.join("log")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_root.join("data")
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir().join("ohlc_data.csv")
    }

    pub fn session_file(&self) -> PathBuf {
        self.log_dir().join("fyers_session.json")
    }

    pub fn sector_map_file(&self) -> PathBuf {
        self.data_root.join("SectorMap.json")
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            cash: dec!(30000),
            benchmark_index: "nifty next 50".into(),
            portfolio_size: 5,
            momentum_threshold: 0.25,
            lookback_weeks: 12,
            fetch_concurrency: 5,
            scrape_concurrency: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fyers: FyersConfig {
                app_id: String::new(),
                app_type: "100".into(),
                secret_key: String::new(),
                fy_id: String::new(),
                totp_key: String::new(),
                pin: String::new(),
                redirect_uri: "https://trade.fyers.in/api-login/redirect-uri/index.html".into(),
                login_host: "https://api-t2.fyers.in/vagator/v2".into(),
                api_host: "https://api-t1.fyers.in/api/v3".into(),
                data_host: "https://api-t1.fyers.in/data".into(),
                http_timeout_secs: 5,
            },
            strategy: StrategyConfig::default(),
            storage: StorageConfig {
                data_root: PathBuf::from("."),
            },
            telemetry: TelemetryConfig {
                log_level: "info".into(),
                log_json: false,
                telegram_bot_token: None,
                telegram_chat_id: None,
                alert_on_trade: true,
                alert_on_error: true,
            },
            dry_run: false,
        }
    }
}

/// First non-empty value among `keys`, each also tried in lowercase as the
/// older `.env` files spell them. `.env.example` placeholders are ignored.
fn lookup(keys: &[&str], var: impl Fn(&str) -> Option<String>) -> Option<String> {
    keys.iter()
        .flat_map(|k| [k.to_string(), k.to_ascii_lowercase()])
        .filter_map(|k| var(&k))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty() && !v.starts_with("your_"))
}

fn env_first(keys: &[&str]) -> Option<String> {
    lookup(keys, |k| std::env::var(k).ok())
}

fn env_string(key: &str) -> Option<String> {
    env_first(&[key])
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {key}={raw}");
            None
        }
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env_string(key).map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

impl Config {
    pub fn load_or_default() -> Self {
        let _ = dotenv::dotenv();

        let mut config = Self::default();

        let fyers = &mut config.fyers;
        for (keys, field) in [
            (&["FYERS_APP_ID"][..], &mut fyers.app_id),
            (&["FYERS_APP_TYPE"][..], &mut fyers.app_type),
            (&["FYERS_SECRET_KEY"][..], &mut fyers.secret_key),
            (&["FYERS_ID"][..], &mut fyers.fy_id),
            (&["FYERS_TOTP_KEY"][..], &mut fyers.totp_key),
            (&["FYERS_PIN", "FYERS_USERPIN"][..], &mut fyers.pin),
            (&["FYERS_REDIRECT_URI"][..], &mut fyers.redirect_uri),
        ] {
            if let Some(v) = env_first(keys) {
                *field = v;
            }
        }
        if let Some(secs) = env_parse("HTTP_TIMEOUT_SECS") {
            fyers.http_timeout_secs = secs;
        }

        let strategy = &mut config.strategy;
        if let Some(cash) = env_parse("STRATEGY_CASH") {
            strategy.cash = cash;
        }
        if let Some(index) = env_string("BENCHMARK_INDEX") {
            strategy.benchmark_index = index.to_lowercase();
        }
        if let Some(size) = env_parse("PORTFOLIO_SIZE") {
            strategy.portfolio_size = size;
        }
        if let Some(threshold) = env_parse("MOMENTUM_THRESHOLD") {
            strategy.momentum_threshold = threshold;
        }
        if let Some(weeks) = env_parse("LOOKBACK_WEEKS") {
            strategy.lookback_weeks = weeks;
        }
        if let Some(n) = env_parse("FETCH_CONCURRENCY") {
            strategy.fetch_concurrency = n;
        }

        if let Some(root) = env_string("DATA_ROOT") {
            config.storage.data_root = PathBuf::from(root);
        }

        config.telemetry.telegram_bot_token = env_first(&["TELEGRAM_BOT_TOKEN", "TELEGRAM_TOKEN"]);
        config.telemetry.telegram_chat_id = env_string("TELEGRAM_CHAT_ID");
        if let Some(on) = env_flag("ALERT_ON_TRADE") {
            config.telemetry.alert_on_trade = on;
        }
        if let Some(on) = env_flag("ALERT_ON_ERROR") {
            config.telemetry.alert_on_error = on;
        }
        if let Some(level) = env_string("RUST_LOG") {
            config.telemetry.log_level = level;
        }
        config.telemetry.log_json = env_string("LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        config.dry_run = env_flag("DRY_RUN").unwrap_or(false);

        config
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Checks needed before logging in to the broker.
    pub fn validate_credentials(&self) -> anyhow::Result<()> {
        let missing = self.fyers.missing_credentials();
        anyhow::ensure!(
            missing.is_empty(),
            "Missing broker credentials: {}",
            missing.join(", ")
        );
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.fyers.http_timeout_secs > 0, "HTTP_TIMEOUT_SECS must be positive");
        let s = &self.strategy;
        anyhow::ensure!(s.cash > Decimal::ZERO, "STRATEGY_CASH must be positive, got {}", s.cash);
        anyhow::ensure!(s.portfolio_size >= 1, "PORTFOLIO_SIZE must be at least 1");
        anyhow::ensure!(s.lookback_weeks >= 1, "LOOKBACK_WEEKS must be at least 1");
        anyhow::ensure!(s.fetch_concurrency >= 1, "FETCH_CONCURRENCY must be at least 1");
        anyhow::ensure!(s.scrape_concurrency >= 1, "scrape concurrency must be at least 1");
        anyhow::ensure!(
            s.momentum_threshold.is_finite(),
            "MOMENTUM_THRESHOLD must be a finite number"
        );
        anyhow::ensure!(!s.benchmark_index.is_empty(), "BENCHMARK_INDEX must be set");
        if self.dry_run {
            tracing::info!("Dry-run mode: orders will be logged, not placed");
        }
        Ok(())
    }
}
