use momentum_swing::config::Config;
use momentum_swing::execution::fyers_auth::FyersLogin;
use momentum_swing::execution::fyers_client::{ist_today, FyersClient};
use momentum_swing::execution::rest_client::RestClient;
use momentum_swing::feeds::sector_map::SectorMapScraper;
use momentum_swing::feeds::universe::{SectorMap, Universe};
use momentum_swing::models::signal::RankedStock;
use momentum_swing::signals::momentum::MomentumCalculator;
use momentum_swing::storage::history::HistoryStore;
use momentum_swing::storage::session::SessionStore;
use momentum_swing::strategies::momentum_swing::{rank_universe, MomentumSwing};
use momentum_swing::telemetry::alerts::AlertManager;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "momentum-swing", version, about = "Weekly momentum rotation on NSE index constituents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh history, rank the benchmark index and rebalance the portfolio
    Run {
        /// Log orders instead of placing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the broker profile and available funds
    Profile,
    /// Bring stored daily history up to date for the benchmark index
    UpdateHistory,
    /// Print the current momentum ranking
    Rank {
        /// Rank every symbol in stored history without logging in
        #[arg(long)]
        offline: bool,
        /// Rows to print
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Rebuild SectorMap.json from niftyindices.com
    UpdateSectorMap,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if config.telemetry.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

struct Broker {
    client: FyersClient,
    alerts: Arc<AlertManager>,
}

async fn connect(config: &Config, http: &RestClient) -> anyhow::Result<Broker> {
    config.validate_credentials()?;
    let alerts = Arc::new(AlertManager::new(config.telemetry.clone(), http.clone()));
    let login = FyersLogin::new(config.fyers.clone(), http.clone(), alerts.clone());
    let session = login
        .session(&SessionStore::new(config.storage.session_file()))
        .await
        .context("Fyers login failed")?;
    Ok(Broker {
        client: FyersClient::new(http.clone(), &config.fyers, &session),
        alerts,
    })
}

fn universe(config: &Config, http: &RestClient) -> anyhow::Result<Universe> {
    let path = config.storage.sector_map_file();
    let map = SectorMap::load(&path)
        .with_context(|| format!("Run `update-sector-map` to create {}", path.display()))?;
    Ok(Universe::new(http.clone(), map))
}

fn print_ranking(ranked: &[RankedStock], top: usize) {
    println!("{:>4}  {:<24} {:>10}  {:>10}  {}", "rank", "symbol", "momentum", "close", "week");
    for r in ranked.iter().take(top) {
        println!(
            "{:>4}  {:<24} {:>10.5}  {:>10.2}  {}",
            r.rank, r.symbol, r.momentum, r.close, r.date
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default();
    init_tracing(&config);

    if let Command::Run { dry_run: true } = cli.command {
        config.dry_run = true;
    }
    config.validate()?;
    if config.is_dry_run() {
        warn!("DRY RUN: orders will be logged, not placed");
    }

    let http = RestClient::new(config.fyers.timeout())?;
    let today = ist_today();

    match cli.command {
        Command::Run { .. } => {
            let universe = universe(&config, &http)?;
            let broker = connect(&config, &http).await?;
            let strategy = MomentumSwing::new(config, broker.client, broker.alerts);
            match strategy.run(&universe, today).await {
                Ok(report) => {
                    info!("{}", report.summary());
                    print_ranking(&report.ranked, 10);
                }
                Err(e) => {
                    error!("Run failed: {e:#}");
                    return Err(e);
                }
            }
        }
        Command::Profile => {
            let broker = connect(&config, &http).await?;
            let profile = broker.client.profile().await?;
            let funds = broker.client.funds().await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
            println!("{}", serde_json::to_string_pretty(&funds)?);
        }
        Command::UpdateHistory => {
            let universe = universe(&config, &http)?;
            let symbols = universe.symbols(&config.strategy.benchmark_index).await?;
            let broker = connect(&config, &http).await?;
            let strategy = MomentumSwing::new(config, broker.client, broker.alerts);
            let (store, summary) = strategy.refresh_history(&symbols, today).await?;
            info!(
                candles = store.candle_count(),
                merged = summary.merged_candles,
                failed = summary.failed.len(),
                "History saved to {}",
                store.path().display()
            );
        }
        Command::Rank { offline: true, top } => {
            let store = HistoryStore::load(config.storage.history_file())?;
            let symbols: Vec<String> = store.symbols().map(String::from).collect();
            let calc = MomentumCalculator::new(config.strategy.lookback_weeks);
            print_ranking(&rank_universe(&store, &symbols, &calc), top);
        }
        Command::Rank { offline: false, top } => {
            let universe = universe(&config, &http)?;
            let symbols = universe.symbols(&config.strategy.benchmark_index).await?;
            let broker = connect(&config, &http).await?;
            let strategy = MomentumSwing::new(config, broker.client, broker.alerts);
            let (store, _) = strategy.refresh_history(&symbols, today).await?;
            print_ranking(&strategy.rank(&store, &symbols), top);
        }
        Command::UpdateSectorMap => {
            let scraper = SectorMapScraper::new(http.clone(), config.strategy.scrape_concurrency)?;
            scraper.update(&config.storage.sector_map_file()).await?;
        }
    }

    Ok(())
}
