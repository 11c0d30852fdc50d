use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use perp_signals::config::Config;
use perp_signals::engine::Engine;
use perp_signals::exchange::BinanceFuturesClient;
use perp_signals::models::Timeframe;

/// Real-time market-state driven signal engine for crypto perpetual futures.
#[derive(Debug, Parser)]
#[command(name = "perp-signals", version)]
struct Cli {
    /// Trading pair, e.g. BTCUSDT
    #[arg(long, default_value = "BTCUSDT")]
    symbol: String,

    /// Primary kline interval the strategies run on
    #[arg(long, default_value = "5m")]
    interval: String,

    /// Contract type for the continuous kline endpoints
    #[arg(long, default_value = "perpetual")]
    contract: String,

    /// Higher timeframes used for confirmation
    #[arg(long, num_args = 1.., default_values_t = vec!["15m".to_string(), "1h".to_string()])]
    confirm: Vec<String>,

    /// Bars of history to backfill per interval before streaming
    #[arg(long, default_value_t = 200)]
    history: usize,

    /// Dashboard snapshot / status cadence in seconds
    #[arg(long, default_value_t = 5)]
    log_interval: u64,
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut cfg = Config::from_env();
    cfg.symbol = cli.symbol.to_uppercase();
    cfg.contract_type = cli.contract.clone();
    cfg.history = cli.history;
    cfg.log_interval_secs = cli.log_interval;

    cfg.primary_interval = Timeframe::from_str_loose(&cli.interval)
        .ok_or_else(|| anyhow::anyhow!("unknown interval {:?}", cli.interval))?;
    cfg.mtf.confirmation_timeframes = cli
        .confirm
        .iter()
        .map(|s| {
            Timeframe::from_str_loose(s).ok_or_else(|| anyhow::anyhow!("unknown timeframe {s:?}"))
        })
        .collect::<Result<Vec<_>>>()?;

    // Re-key the weight map when the CLI picks frames the defaults don't
    // cover: primary keeps 0.4, the confirmations split the rest.
    let covered = cfg.mtf.weights.contains_key(&cfg.primary_interval)
        && cfg
            .mtf
            .confirmation_timeframes
            .iter()
            .all(|tf| cfg.mtf.weights.contains_key(tf));
    if !covered && !cfg.mtf.confirmation_timeframes.is_empty() {
        let mut weights = std::collections::HashMap::new();
        weights.insert(cfg.primary_interval, 0.4);
        let share = 0.6 / cfg.mtf.confirmation_timeframes.len() as f64;
        for tf in &cfg.mtf.confirmation_timeframes {
            weights.insert(*tf, share);
        }
        cfg.mtf.weights = weights;
    }

    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match resolve_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    if let Err(e) = run(cfg).await {
        error!("fatal: {e:#}");
        std::process::exit(2);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let client = std::sync::Arc::new(BinanceFuturesClient::new(&cfg)?);
    let (mut engine, _snapshot_rx) = Engine::new(cfg.clone())?;

    engine.seed(client.as_ref()).await?;

    let (tx, rx) = mpsc::channel(1024);
    let mut intervals = vec![cfg.primary_interval];
    intervals.extend(cfg.mtf.confirmation_timeframes.iter().copied());

    let mut stream_tasks = Vec::new();
    for tf in intervals {
        let client = client.clone();
        let tx = tx.clone();
        stream_tasks.push(tokio::spawn(async move {
            client.stream_klines(tf, tx).await
        }));
    }
    drop(tx);

    tokio::select! {
        engine_result = engine.run(rx) => engine_result,
        stream_result = futures::future::select_all(stream_tasks) => {
            let (finished, _, _) = stream_result;
            match finished {
                Ok(Err(e)) => Err(e),
                Ok(Ok(())) => Err(anyhow::anyhow!("kline stream ended unexpectedly")),
                Err(join_err) => Err(anyhow::anyhow!("stream task panicked: {join_err}")),
            }
        }
    }
}
