//! Shared data model for the tick pipeline and the control surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::oneshot;

use crate::settings::EngineSettings;

/// One price observation for a market at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTick {
    /// Last traded price. Non-positive values are dropped at the pipeline
    /// boundary and never reach the aggregator.
    pub value: f64,
    /// Unix seconds.
    pub time: i64,
}

impl RateTick {
    pub fn new(value: f64, time: i64) -> Self {
        Self { value, time }
    }
}

/// Statistics over the trailing check-period sub-window of a market's ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSnapshot {
    pub first: RateTick,
    pub last: RateTick,
    /// Highest tick in the sub-window; earliest occurrence wins ties.
    pub max: RateTick,
    /// Lowest tick in the sub-window; earliest occurrence wins ties.
    pub min: RateTick,
    /// Arithmetic mean of values.
    pub mean: f64,
}

impl WindowSnapshot {
    /// Relative growth from the window low to the window high.
    pub fn growth(&self) -> f64 {
        self.max.value / self.min.value - 1.0
    }
}

/// Engine run state. Paused suppresses new opens; open positions are still
/// managed through the exit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Active,
    Paused,
}

/// Exit ladder rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitRule {
    /// Immediate take-profit, no time gate.
    TakeProfit,
    /// Smaller profit once the position has aged past the first gate.
    TimedProfit,
    /// Marginal profit after a long hold.
    SlowProfit,
    /// Stop-loss, no time gate.
    StopLoss,
}

impl std::fmt::Display for ExitRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TakeProfit => write!(f, "TAKE_PROFIT"),
            Self::TimedProfit => write!(f, "TIMED_PROFIT"),
            Self::SlowProfit => write!(f, "SLOW_PROFIT"),
            Self::StopLoss => write!(f, "STOP_LOSS"),
        }
    }
}

/// An open position. At most one exists per market.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub market: String,
    /// The tick the position was opened at.
    pub open: RateTick,
    /// Relative growth since open, recomputed on every tick.
    pub change: f64,
    /// Position size in market-currency units.
    pub amount: f64,
    /// Exchange-assigned order id, filled in when the buy confirms.
    pub external_id: Option<String>,
    /// Exit rule whose sell request is in flight. Set when the ladder fires
    /// so it cannot fire again while the confirmation is outstanding.
    pub pending_exit: Option<ExitRule>,
}

/// A closed position. Append-only, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub market: String,
    pub open: RateTick,
    pub close: RateTick,
    pub change: f64,
    pub external_id: Option<String>,
}

/// Per-market loss counter. `count > 2` bans the market from new opens.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BanEntry {
    pub count: u32,
    pub last_losing_rate: Option<RateTick>,
}

/// Per-market confirmation progress for a detected explosion.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RisingState {
    pub count: u32,
    pub last_time: i64,
    pub last_value: f64,
}

/// Running performance totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResultTotals {
    /// Sum of `change` over all open orders (unrealized).
    pub active: f64,
    /// Sum of `change` over the full history (realized).
    pub finished: f64,
}

/// Fire-and-forget events for the notification collaborator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NotificationEvent {
    #[serde(rename_all = "camelCase")]
    ExplosionDetected { market: String, rate: f64, growth: f64 },
    #[serde(rename_all = "camelCase")]
    OrderOpened { market: String, rate: f64 },
    #[serde(rename_all = "camelCase")]
    OrderClosed { market: String, rate: f64, change: f64 },
    #[serde(rename_all = "camelCase")]
    RunStateChanged { state: RunState },
}

/// Results of asynchronous exchange calls, folded back into the pipeline.
#[derive(Debug, Clone)]
pub enum ExchangeUpdate {
    BuyPlaced {
        market: String,
        order_id: String,
    },
    BuyFailed {
        market: String,
        reason: String,
    },
    /// Sell accepted by the exchange; the order closes at `close`.
    SellPlaced {
        market: String,
        close: RateTick,
        order_id: Option<String>,
    },
    /// The exchange reports nothing to sell. Recovery path, not a close.
    SellUnfillable {
        market: String,
    },
    SellFailed {
        market: String,
        reason: String,
    },
    Balances(HashMap<String, f64>),
}

/// Writes and reads the control surface is allowed to perform.
#[derive(Debug)]
pub enum ControlCommand {
    GetState(oneshot::Sender<EngineStateView>),
    ClearBans,
    ClearBan {
        market: String,
        reply: oneshot::Sender<bool>,
    },
    SetBan {
        market: String,
        count: u32,
    },
    SetSetting {
        name: String,
        value: f64,
        reply: oneshot::Sender<Result<(), String>>,
    },
    SetRunState(RunState),
    SetMuted(bool),
}

/// Everything the engine reacts to, in one serialized stream.
#[derive(Debug)]
pub enum EngineEvent {
    Tick { market: String, tick: RateTick },
    MarketsRefreshed(Vec<String>),
    Exchange(ExchangeUpdate),
    Control(ControlCommand),
}

/// Read-only snapshot of the full engine state tree.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStateView {
    pub run_state: RunState,
    pub muted: bool,
    pub markets: Vec<String>,
    pub orders: Vec<Order>,
    pub history: Vec<HistoryRecord>,
    pub banned: HashMap<String, BanEntry>,
    pub rising: HashMap<String, RisingState>,
    pub results: ResultTotals,
    pub settings: EngineSettings,
    pub balances: HashMap<String, f64>,
}
