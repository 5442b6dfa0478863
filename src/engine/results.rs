//! Running performance totals.
//!
//! `finished` is resummed over the full history on every update rather than
//! accumulated incrementally, so a replayed close event cannot double-count
//! and totals stay reproducible from state.

use std::collections::HashMap;

use crate::types::{HistoryRecord, Order, ResultTotals};

pub fn recompute(orders: &HashMap<String, Order>, history: &[HistoryRecord]) -> ResultTotals {
    ResultTotals {
        active: orders.values().map(|o| o.change).sum(),
        finished: history.iter().map(|h| h.change).sum(),
    }
}
