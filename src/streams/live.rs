//! Feed loops: the tick source and the periodic refreshers.
//!
//! Each loop polls the exchange on its own cadence and funnels results into
//! the engine's event channel; nothing here mutates engine state directly.
//! Poll failures are logged and retried on the next interval.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::exchange::{ExchangeClient, Executor};
use crate::types::{EngineEvent, ExchangeUpdate, RateTick};

/// Poll the public market summaries and push one tick per watched market.
///
/// Markets are filtered to the configured quote currency (e.g. "BTC" keeps
/// "BTC-*"). Tick timestamps are stamped at poll time.
pub async fn run_ticker_feed(
    client: Arc<ExchangeClient>,
    events_tx: mpsc::Sender<EngineEvent>,
    poll_interval_secs: u64,
    quote: String,
) {
    let prefix = format!("{}-", quote);
    let mut interval = tokio::time::interval(Duration::from_secs(poll_interval_secs));
    info!(
        "Ticker feed polling every {}s for {}* markets",
        poll_interval_secs, prefix
    );

    loop {
        interval.tick().await;

        let summaries = match client.get_market_summaries().await {
            Ok(summaries) => summaries,
            Err(e) => {
                warn!("Ticker poll failed: {:#}", e);
                continue;
            }
        };

        let now = chrono::Utc::now().timestamp();
        let mut pushed = 0usize;
        for summary in summaries {
            if !summary.market_name.starts_with(&prefix) {
                continue;
            }
            let Some(last) = summary.last else { continue };

            let event = EngineEvent::Tick {
                market: summary.market_name,
                tick: RateTick::new(last, now),
            };
            if events_tx.send(event).await.is_err() {
                info!("Engine gone, stopping ticker feed");
                return;
            }
            pushed += 1;
        }
        debug!("Pushed {} ticks", pushed);
    }
}

/// Periodically refresh the market universe.
pub async fn run_market_refresh(
    client: Arc<ExchangeClient>,
    events_tx: mpsc::Sender<EngineEvent>,
    refresh_interval_secs: u64,
    quote: String,
) {
    let prefix = format!("{}-", quote);
    let mut interval = tokio::time::interval(Duration::from_secs(refresh_interval_secs));

    loop {
        interval.tick().await;

        match client.get_markets().await {
            Ok(markets) => {
                let names: Vec<String> = markets
                    .into_iter()
                    .filter(|m| m.is_active && m.market_name.starts_with(&prefix))
                    .map(|m| m.market_name)
                    .collect();
                info!("Market refresh: {} active {}* markets", names.len(), prefix);
                if events_tx
                    .send(EngineEvent::MarketsRefreshed(names))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => warn!("Market refresh failed: {:#}", e),
        }
    }
}

/// Periodically refresh account balances through the executor.
pub async fn run_balance_refresh(
    executor: Arc<Executor>,
    events_tx: mpsc::Sender<EngineEvent>,
    refresh_interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(refresh_interval_secs));

    loop {
        interval.tick().await;

        match executor.balances().await {
            Ok(balances) => {
                if events_tx
                    .send(EngineEvent::Exchange(ExchangeUpdate::Balances(balances)))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => warn!("Balance refresh failed: {:#}", e),
        }
    }
}
