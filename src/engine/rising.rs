//! Rising confirmation: a detected explosion must be re-observed a
//! configured number of times, spaced at least one check period apart,
//! before the engine acts on it. This debounces single-window noise.

use std::collections::HashMap;

use crate::types::{RateTick, RisingState};

/// Per-market confirmation state book.
#[derive(Debug, Default)]
pub struct RisingBook {
    states: HashMap<String, RisingState>,
}

impl RisingBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a detected explosion and return the updated count.
    ///
    /// The count advances only on the first observation ever, or when the
    /// gap since the previously recorded observation exceeds the check
    /// period; a repeat inside the same window (including an exact tick
    /// replay) does not advance. Once at `max_count`, the state holds there
    /// until [`reset`](Self::reset) on a successful open.
    pub fn observe(
        &mut self,
        market: &str,
        tick: RateTick,
        check_period_secs: u64,
        max_count: u32,
    ) -> u32 {
        let state = self.states.entry(market.to_string()).or_default();

        if state.count >= max_count {
            return state.count;
        }

        let first = state.count == 0 && state.last_time == 0;
        let gap = tick.time - state.last_time;
        if first || gap > check_period_secs as i64 {
            state.count += 1;
            state.last_time = tick.time;
            state.last_value = tick.value;
        }

        state.count
    }

    /// Current confirmation count for a market.
    pub fn count(&self, market: &str) -> u32 {
        self.states.get(market).map_or(0, |s| s.count)
    }

    /// Back to idle after a position opened (or its confirmation was
    /// consumed); the last observation stays recorded.
    pub fn reset(&mut self, market: &str) {
        if let Some(state) = self.states.get_mut(market) {
            state.count = 0;
        }
    }

    /// Seed a reset baseline at a losing close, so the next confirmation
    /// run starts from the loss rather than from scratch.
    pub fn reseed(&mut self, market: &str, losing_rate: RateTick) {
        let state = self.states.entry(market.to_string()).or_default();
        state.count = 0;
        state.last_time = losing_rate.time;
        state.last_value = losing_rate.value;
    }

    pub fn states(&self) -> &HashMap<String, RisingState> {
        &self.states
    }
}
