use anyhow::{bail, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use explosion_trader::api::{self, AppState};
use explosion_trader::engine::Engine;
use explosion_trader::exchange::{ExchangeClient, ExecutionMode, Executor, SimExecutor};
use explosion_trader::notify::Notifier;
use explosion_trader::settings::EngineSettings;
use explosion_trader::streams;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Execution mode (simulation places no real orders)
    #[arg(long, value_enum, default_value_t = ExecutionMode::Simulation)]
    mode: ExecutionMode,

    /// Exchange API key (required for live mode)
    #[arg(long, env = "EXCHANGE_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Exchange API secret (required for live mode)
    #[arg(long, env = "EXCHANGE_API_SECRET", default_value = "", hide_env_values = true)]
    api_secret: String,

    /// Quote currency whose markets are watched
    #[arg(short, long, default_value = "BTC")]
    quote: String,

    /// Ticker poll interval in seconds
    #[arg(short = 'i', long, default_value = "10")]
    poll_interval: u64,

    /// Market universe refresh interval in seconds
    #[arg(long, default_value = "3600")]
    market_refresh_interval: u64,

    /// Balance refresh interval in seconds
    #[arg(long, default_value = "300")]
    balance_refresh_interval: u64,

    /// Port for the HTTP control surface
    #[arg(short, long, default_value = "3000")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("explosion_trader=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    info!("Starting explosion-trader");
    info!("Mode: {}", args.mode);
    info!("Quote currency: {}", args.quote);
    info!("Poll interval: {}s", args.poll_interval);

    let executor = match args.mode {
        ExecutionMode::Simulation => Executor::Simulation(SimExecutor::new()),
        ExecutionMode::Live => {
            if args.api_key.is_empty() || args.api_secret.is_empty() {
                bail!("Live mode requires EXCHANGE_API_KEY and EXCHANGE_API_SECRET");
            }
            Executor::Live(ExchangeClient::with_credentials(
                args.api_key.clone(),
                args.api_secret.clone(),
            ))
        }
    };
    let executor = Arc::new(executor);
    let public_client = Arc::new(ExchangeClient::public());

    let (events_tx, events_rx) = mpsc::channel(1024);
    let notifier = Notifier::new(1024);
    notifier.spawn_log_drain();

    // Engine task: the single serialized pipeline
    let engine = Engine::new(
        EngineSettings::default(),
        executor.clone(),
        events_tx.clone(),
        notifier.clone(),
    );
    tokio::spawn(engine.run(events_rx));

    // Feed loops funnel everything into the engine channel
    tokio::spawn(streams::run_ticker_feed(
        public_client.clone(),
        events_tx.clone(),
        args.poll_interval,
        args.quote.clone(),
    ));
    tokio::spawn(streams::run_market_refresh(
        public_client,
        events_tx.clone(),
        args.market_refresh_interval,
        args.quote,
    ));
    tokio::spawn(streams::run_balance_refresh(
        executor,
        events_tx.clone(),
        args.balance_refresh_interval,
    ));

    // Control surface
    let state = Arc::new(AppState {
        events_tx,
        notifier,
    });
    let app = api::router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    info!("Control surface available on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
