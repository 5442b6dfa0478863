//! Per-market sliding tick windows.
//!
//! Ticks are ordered by their own timestamps, not wall clock, so mild
//! out-of-order and duplicate arrivals from the feed cannot corrupt the
//! window. Retention runs longer than the check period to keep room for
//! multi-interval statistics.

use std::collections::{HashMap, VecDeque};

use crate::types::{RateTick, WindowSnapshot};

#[derive(Debug, Default)]
struct MarketWindow {
    /// Retained ticks, ordered by time (stable for duplicate timestamps).
    ticks: VecDeque<RateTick>,
    /// High-water mark of tick times seen; "now" for pruning and snapshots.
    latest_time: i64,
}

/// Rate window aggregator for all markets.
#[derive(Debug, Default)]
pub struct RateWindows {
    windows: HashMap<String, MarketWindow>,
}

impl RateWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tick, prune entries older than the retention period, and
    /// snapshot the trailing check-period sub-window.
    ///
    /// Returns `None` while the sub-window has fewer than two ticks or spans
    /// no time at all.
    pub fn ingest(
        &mut self,
        market: &str,
        tick: RateTick,
        check_period_secs: u64,
        retention_secs: u64,
    ) -> Option<WindowSnapshot> {
        let window = self.windows.entry(market.to_string()).or_default();

        // Insert keeping time order; a late tick walks back from the tail.
        let mut idx = window.ticks.len();
        while idx > 0 && window.ticks[idx - 1].time > tick.time {
            idx -= 1;
        }
        window.ticks.insert(idx, tick);

        window.latest_time = window.latest_time.max(tick.time);
        let now = window.latest_time;

        while let Some(front) = window.ticks.front() {
            if now - front.time > retention_secs as i64 {
                window.ticks.pop_front();
            } else {
                break;
            }
        }

        Self::snapshot(window, check_period_secs)
    }

    fn snapshot(window: &MarketWindow, check_period_secs: u64) -> Option<WindowSnapshot> {
        let now = window.latest_time;
        let mut iter = window
            .ticks
            .iter()
            .filter(|t| now - t.time <= check_period_secs as i64);

        let first = *iter.next()?;
        let mut last = first;
        let mut max = first;
        let mut min = first;
        let mut sum = first.value;
        let mut count = 1usize;

        for &t in iter {
            last = t;
            // Strict comparisons keep the earliest occurrence on ties
            if t.value > max.value {
                max = t;
            }
            if t.value < min.value {
                min = t;
            }
            sum += t.value;
            count += 1;
        }

        if count < 2 || last.time <= first.time {
            return None;
        }

        Some(WindowSnapshot {
            first,
            last,
            max,
            min,
            mean: sum / count as f64,
        })
    }

    /// Number of ticks currently retained for a market.
    #[cfg(test)]
    fn retained(&self, market: &str) -> usize {
        self.windows.get(market).map_or(0, |w| w.ticks.len())
    }
}
