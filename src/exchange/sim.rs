//! Simulated executor: fills every request instantly with a generated id
//! and mirrors the fills into an in-memory balance map. Used when no real
//! execution was requested, and as the test double in pipeline tests.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Drop-in stand-in for the private exchange surface.
#[derive(Debug, Default)]
pub struct SimExecutor {
    balances: Mutex<HashMap<String, f64>>,
}

impl SimExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn buy(&self, market: &str, rate: f64, quantity: f64) -> String {
        let order_id = Uuid::new_v4().to_string();
        if let Some(currency) = market_currency(market) {
            let mut balances = self.balances.lock().await;
            *balances.entry(currency.to_string()).or_insert(0.0) += quantity;
        }
        info!(
            "SIM BUY {} {:.8} @ {:.8} -> {}",
            market, quantity, rate, order_id
        );
        order_id
    }

    pub async fn sell(&self, market: &str, rate: f64, quantity: f64) -> String {
        let order_id = Uuid::new_v4().to_string();
        if let Some(currency) = market_currency(market) {
            let mut balances = self.balances.lock().await;
            if let Some(held) = balances.get_mut(currency) {
                *held = (*held - quantity).max(0.0);
            }
            if balances.get(currency) == Some(&0.0) {
                balances.remove(currency);
            }
        }
        info!(
            "SIM SELL {} {:.8} @ {:.8} -> {}",
            market, quantity, rate, order_id
        );
        order_id
    }

    pub async fn balances(&self) -> HashMap<String, f64> {
        self.balances.lock().await.clone()
    }
}

/// The traded currency of a market identifier, e.g. "BTC-ABC" -> "ABC".
pub fn market_currency(market: &str) -> Option<&str> {
    market.split_once('-').map(|(_, currency)| currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_currency() {
        assert_eq!(market_currency("BTC-ABC"), Some("ABC"));
        assert_eq!(market_currency("USDT-BTC"), Some("BTC"));
        assert_eq!(market_currency("MALFORMED"), None);
    }

    #[tokio::test]
    async fn test_buy_then_sell_round_trips_balance() {
        let sim = SimExecutor::new();
        sim.buy("BTC-ABC", 0.0001, 100.0).await;
        assert_eq!(sim.balances().await.get("ABC"), Some(&100.0));

        sim.sell("BTC-ABC", 0.00011, 100.0).await;
        assert!(sim.balances().await.is_empty());
    }
}
