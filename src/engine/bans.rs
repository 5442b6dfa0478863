//! Per-market ban book.
//!
//! Losing closes increment a market's counter; a winning close resets it.
//! Past two strikes the market is excluded from new opens until a future
//! winning close recovers it. There is no time-based expiry. A small static
//! denylist is seeded at the maximum count and never recovers.

use std::collections::HashMap;

use crate::types::{BanEntry, RateTick};

/// Markets permanently excluded from opens.
pub const DENYLISTED_MARKETS: [&str; 2] = ["BTC-DOGE", "BTC-XVG"];

/// Losing closes tolerated before a market is banned.
pub const BAN_THRESHOLD: u32 = 2;

#[derive(Debug, Default)]
pub struct BanBook {
    entries: HashMap<String, BanEntry>,
}

impl BanBook {
    /// A book with the static denylist seeded at the maximum count.
    pub fn seeded() -> Self {
        let mut entries = HashMap::new();
        for market in DENYLISTED_MARKETS {
            entries.insert(
                market.to_string(),
                BanEntry {
                    count: u32::MAX,
                    last_losing_rate: None,
                },
            );
        }
        Self { entries }
    }

    pub fn is_denylisted(market: &str) -> bool {
        DENYLISTED_MARKETS.contains(&market)
    }

    /// Whether the market is currently excluded from new opens.
    pub fn is_banned(&self, market: &str) -> bool {
        self.entries.get(market).is_some_and(|e| e.count > BAN_THRESHOLD)
    }

    /// Fold a closed order's outcome into the book; returns the new count.
    pub fn on_close(&mut self, market: &str, change: f64, close: RateTick) -> u32 {
        let entry = self.entries.entry(market.to_string()).or_default();
        if change < 0.0 {
            entry.count = entry.count.saturating_add(1);
            entry.last_losing_rate = Some(close);
        } else {
            entry.count = 0;
        }
        entry.count
    }

    /// Drop every entry except the static denylist.
    pub fn clear_all(&mut self) {
        self.entries.retain(|market, _| Self::is_denylisted(market));
    }

    /// Drop one market's entry; denylisted markets stay. Returns whether an
    /// entry was removed.
    pub fn clear(&mut self, market: &str) -> bool {
        if Self::is_denylisted(market) {
            return false;
        }
        self.entries.remove(market).is_some()
    }

    /// Overwrite one market's counter from the control surface.
    pub fn set(&mut self, market: &str, count: u32) {
        if Self::is_denylisted(market) {
            return;
        }
        self.entries.entry(market.to_string()).or_default().count = count;
    }

    pub fn entries(&self) -> &HashMap<String, BanEntry> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(value: f64, time: i64) -> RateTick {
        RateTick::new(value, time)
    }

    #[test]
    fn test_losses_accumulate_until_banned() {
        let mut book = BanBook::seeded();

        assert_eq!(book.on_close("BTC-ABC", -0.06, tick(0.94, 100)), 1);
        assert_eq!(book.on_close("BTC-ABC", -0.05, tick(0.90, 200)), 2);
        assert!(!book.is_banned("BTC-ABC"));

        assert_eq!(book.on_close("BTC-ABC", -0.07, tick(0.85, 300)), 3);
        assert!(book.is_banned("BTC-ABC"));
    }

    #[test]
    fn test_winning_close_recovers() {
        let mut book = BanBook::seeded();
        for i in 0..3 {
            book.on_close("BTC-ABC", -0.05, tick(0.9, 100 * i));
        }
        assert!(book.is_banned("BTC-ABC"));

        book.on_close("BTC-ABC", 0.04, tick(1.1, 1000));
        assert!(!book.is_banned("BTC-ABC"));
        assert_eq!(book.entries()["BTC-ABC"].count, 0);
    }

    #[test]
    fn test_breakeven_counts_as_win() {
        let mut book = BanBook::seeded();
        book.on_close("BTC-ABC", -0.05, tick(0.9, 100));
        book.on_close("BTC-ABC", 0.0, tick(1.0, 200));
        assert_eq!(book.entries()["BTC-ABC"].count, 0);
    }

    #[test]
    fn test_denylist_is_permanent() {
        let mut book = BanBook::seeded();
        assert!(book.is_banned("BTC-DOGE"));
        assert!(BanBook::is_denylisted("BTC-XVG"));

        assert!(!book.clear("BTC-DOGE"));
        book.set("BTC-DOGE", 0);
        book.clear_all();
        assert!(book.is_banned("BTC-DOGE"));
        assert!(book.is_banned("BTC-XVG"));
    }

    #[test]
    fn test_clear_all_keeps_only_denylist() {
        let mut book = BanBook::seeded();
        book.on_close("BTC-ABC", -0.05, tick(0.9, 100));
        book.on_close("BTC-XYZ", -0.05, tick(0.8, 100));
        book.clear_all();
        assert_eq!(book.entries().len(), DENYLISTED_MARKETS.len());
    }
}
