//! Exchange execution layer: the REST client for the real exchange and a
//! simulated stand-in behind one dispatch surface.

pub mod client;
pub mod models;
pub mod sim;

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use client::ExchangeClient;
pub use sim::{market_currency, SimExecutor};

/// Whether orders are simulated or sent to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Simulated execution (no exchange orders placed)
    Simulation,
    /// Real orders against the exchange
    Live,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Simulation
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulation => write!(f, "simulation"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Outcome of a sell request.
#[derive(Debug, Clone)]
pub enum SellOutcome {
    /// The exchange accepted the sell.
    Placed { order_id: Option<String> },
    /// Nothing to sell on the exchange side; the position cannot be closed
    /// normally and should be dropped without a result.
    Unsellable,
}

/// Private execution surface, dispatching to the simulator or the exchange.
pub enum Executor {
    Simulation(SimExecutor),
    Live(ExchangeClient),
}

impl Executor {
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::Simulation(_) => ExecutionMode::Simulation,
            Self::Live(_) => ExecutionMode::Live,
        }
    }

    /// Place a buy. Returns the exchange-assigned order id.
    pub async fn buy(&self, market: &str, rate: f64, quantity: f64) -> Result<String> {
        match self {
            Self::Simulation(sim) => Ok(sim.buy(market, rate, quantity).await),
            Self::Live(client) => client.buy_limit(market, quantity, rate).await,
        }
    }

    /// Place a sell, distinguishing "nothing to sell" from transient failure.
    pub async fn sell(&self, market: &str, rate: f64, quantity: f64) -> Result<SellOutcome> {
        match self {
            Self::Simulation(sim) => Ok(SellOutcome::Placed {
                order_id: Some(sim.sell(market, rate, quantity).await),
            }),
            Self::Live(client) => match client.sell_limit(market, quantity, rate).await {
                Ok(order_id) => Ok(SellOutcome::Placed {
                    order_id: Some(order_id),
                }),
                // The rejection message sits below the request context
                Err(e)
                    if e.chain()
                        .any(|cause| cause.to_string().contains("INSUFFICIENT_FUNDS")) =>
                {
                    Ok(SellOutcome::Unsellable)
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Cancel an open exchange order. No-op in simulation.
    pub async fn cancel(&self, order_id: &str) -> Result<()> {
        match self {
            Self::Simulation(_) => Ok(()),
            Self::Live(client) => client.cancel(order_id).await,
        }
    }

    /// Account balances, currency -> amount.
    pub async fn balances(&self) -> Result<HashMap<String, f64>> {
        match self {
            Self::Simulation(sim) => Ok(sim.balances().await),
            Self::Live(client) => client.get_balances().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulation_executor_round_trip() {
        let executor = Executor::Simulation(SimExecutor::new());
        assert_eq!(executor.mode(), ExecutionMode::Simulation);

        let order_id = executor.buy("BTC-ABC", 0.0001, 50.0).await.unwrap();
        assert!(!order_id.is_empty());
        assert_eq!(executor.balances().await.unwrap().get("ABC"), Some(&50.0));

        match executor.sell("BTC-ABC", 0.00012, 50.0).await.unwrap() {
            SellOutcome::Placed { order_id } => assert!(order_id.is_some()),
            SellOutcome::Unsellable => panic!("simulated sells always fill"),
        }
        assert!(executor.cancel(&order_id).await.is_ok());
    }
}
