//! The exit ladder: an ordered list of take-profit and stop-loss rules
//! evaluated against an open order on every tick. The first satisfied rule
//! fires; later rules are never consulted in the same tick.

use crate::settings::EngineSettings;
use crate::types::{ExitRule, Order, RateTick};

/// Evaluate the ladder for one tick against an open order.
///
/// Order age is measured from the open tick's timestamp, so replayed tick
/// streams evaluate identically to live ones.
pub fn evaluate(order: &Order, tick: RateTick, settings: &EngineSettings) -> Option<ExitRule> {
    let change = tick.value / order.open.value - 1.0;
    let age_minutes = (tick.time - order.open.time) as f64 / 60.0;

    if change >= settings.sell_growth_threshold_1 {
        return Some(ExitRule::TakeProfit);
    }
    if change >= settings.sell_growth_threshold_2 && age_minutes > settings.sell_growth_2_minutes {
        return Some(ExitRule::TimedProfit);
    }
    if change >= settings.sell_growth_threshold_3 && age_minutes > settings.sell_growth_3_minutes {
        return Some(ExitRule::SlowProfit);
    }
    if change <= settings.sell_fall_threshold {
        return Some(ExitRule::StopLoss);
    }

    None
}
