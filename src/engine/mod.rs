//! Core engine: owns all trading state and processes every event through
//! one serialized pipeline.
//!
//! Tick arrivals, exchange confirmations, and control commands all land in
//! the same channel and are handled strictly in order, so no state is ever
//! mutated concurrently. Exchange calls are spawned fire-and-forget; their
//! results re-enter the pipeline as events.

pub mod bans;
pub mod detector;
pub mod ladder;
pub mod results;
pub mod rising;
pub mod window;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::exchange::{market_currency, ExecutionMode, Executor, SellOutcome};
use crate::notify::Notifier;
use crate::settings::EngineSettings;
use crate::types::{
    ControlCommand, EngineEvent, EngineStateView, ExchangeUpdate, HistoryRecord,
    NotificationEvent, Order, RateTick, ResultTotals, RunState,
};

use bans::BanBook;
use rising::RisingBook;
use window::RateWindows;

/// Why an open attempt was refused. Observable, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenRejection {
    Paused,
    AlreadyOpen,
    Denylisted,
    Banned,
    AlreadyHeld,
}

impl std::fmt::Display for OpenRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paused => write!(f, "engine paused"),
            Self::AlreadyOpen => write!(f, "order already open"),
            Self::Denylisted => write!(f, "market denylisted"),
            Self::Banned => write!(f, "market banned"),
            Self::AlreadyHeld => write!(f, "balance already held"),
        }
    }
}

/// The explosion-trading engine. One instance owns all state; everything
/// reaches it through the event channel it is run with.
pub struct Engine {
    settings: EngineSettings,
    run_state: RunState,
    muted: bool,

    windows: RateWindows,
    rising: RisingBook,
    bans: BanBook,
    orders: HashMap<String, Order>,
    history: Vec<HistoryRecord>,
    results: ResultTotals,

    markets: Vec<String>,
    balances: HashMap<String, f64>,

    executor: Arc<Executor>,
    events_tx: mpsc::Sender<EngineEvent>,
    notifier: Notifier,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        executor: Arc<Executor>,
        events_tx: mpsc::Sender<EngineEvent>,
        notifier: Notifier,
    ) -> Self {
        Self {
            settings,
            run_state: RunState::Active,
            muted: false,
            windows: RateWindows::new(),
            rising: RisingBook::new(),
            bans: BanBook::seeded(),
            orders: HashMap::new(),
            history: Vec::new(),
            results: Default::default(),
            markets: Vec::new(),
            balances: HashMap::new(),
            executor,
            events_tx,
            notifier,
        }
    }

    /// Drain the event channel until every sender is gone.
    pub async fn run(mut self, mut events_rx: mpsc::Receiver<EngineEvent>) {
        info!(
            "Engine running ({} mode, {} confirmations, {}s window)",
            self.executor.mode(),
            self.settings.rising_count_threshold,
            self.settings.check_rate_period_secs
        );

        while let Some(event) = events_rx.recv().await {
            self.handle_event(event);
        }

        info!("Engine event channel closed, shutting down");
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Tick { market, tick } => self.on_tick(&market, tick),
            EngineEvent::MarketsRefreshed(markets) => {
                debug!("Market universe refreshed: {} markets", markets.len());
                self.markets = markets;
            }
            EngineEvent::Exchange(update) => self.on_exchange(update),
            EngineEvent::Control(command) => self.on_control(command),
        }
    }

    // ---- tick pipeline -------------------------------------------------

    fn on_tick(&mut self, market: &str, tick: RateTick) {
        if !(tick.value > 0.0) {
            warn!("Dropping invalid tick for {}: {:?}", market, tick);
            return;
        }

        // Open positions are managed first so an exit cannot be delayed by
        // the detection path.
        let mut fired = None;
        if let Some(order) = self.orders.get_mut(market) {
            order.change = tick.value / order.open.value - 1.0;
            if order.pending_exit.is_none() {
                if let Some(rule) = ladder::evaluate(order, tick, &self.settings) {
                    order.pending_exit = Some(rule);
                    fired = Some((rule, order.amount));
                }
            }
        }
        if let Some((rule, amount)) = fired {
            info!(
                "EXIT {} for {} @ {:.8} (sell pending)",
                rule, market, tick.value
            );
            self.spawn_sell(market, tick, amount);
        }

        let snapshot = self.windows.ingest(
            market,
            tick,
            self.settings.check_rate_period_secs,
            self.settings.retention_period_secs,
        );
        self.results = results::recompute(&self.orders, &self.history);

        let Some(snapshot) = snapshot else { return };

        if detector::detect(&snapshot, self.settings.explosion_threshold) {
            debug!(
                "Explosion on {}: +{:.2}% over window",
                market,
                snapshot.growth() * 100.0
            );
            self.notify(NotificationEvent::ExplosionDetected {
                market: market.to_string(),
                rate: tick.value,
                growth: snapshot.growth(),
            });
            self.rising.observe(
                market,
                tick,
                self.settings.check_rate_period_secs,
                self.settings.rising_count_threshold,
            );
        }

        // A confirmed market retries the open on every tick until it either
        // opens or the confirmation is consumed; rejection reasons leave the
        // confirmation in place.
        if self.rising.count(market) >= self.settings.rising_count_threshold {
            match self.try_open(market, tick) {
                Ok(()) => self.rising.reset(market),
                Err(reason) => debug!("Open rejected for {}: {}", market, reason),
            }
        }
    }

    // ---- order lifecycle -----------------------------------------------

    fn try_open(&mut self, market: &str, rate: RateTick) -> Result<(), OpenRejection> {
        if self.run_state != RunState::Active {
            return Err(OpenRejection::Paused);
        }
        if self.orders.contains_key(market) {
            return Err(OpenRejection::AlreadyOpen);
        }
        if BanBook::is_denylisted(market) {
            return Err(OpenRejection::Denylisted);
        }
        if self.bans.is_banned(market) {
            return Err(OpenRejection::Banned);
        }
        if self.executor.mode() == ExecutionMode::Live {
            let held = market_currency(market)
                .and_then(|currency| self.balances.get(currency))
                .copied()
                .unwrap_or(0.0);
            if held > 0.0 {
                return Err(OpenRejection::AlreadyHeld);
            }
        }

        let amount = self.settings.order_budget / rate.value;
        self.spawn_buy(market, rate, amount);

        // The order exists as soon as the buy is on its way; the exchange id
        // is filled in when the confirmation folds back in.
        self.orders.insert(
            market.to_string(),
            Order {
                market: market.to_string(),
                open: rate,
                change: 0.0,
                amount,
                external_id: None,
                pending_exit: None,
            },
        );
        self.spawn_balance_refresh();

        info!("OPEN {} @ {:.8} (amount {:.8})", market, rate.value, amount);
        self.notify(NotificationEvent::OrderOpened {
            market: market.to_string(),
            rate: rate.value,
        });

        Ok(())
    }

    fn on_exchange(&mut self, update: ExchangeUpdate) {
        match update {
            ExchangeUpdate::BuyPlaced { market, order_id } => {
                match self.orders.get_mut(&market) {
                    Some(order) => order.external_id = Some(order_id),
                    None => warn!("Buy confirmation for {} without an open order", market),
                }
            }
            ExchangeUpdate::BuyFailed { market, reason } => {
                warn!("Buy for {} failed ({}), dropping provisional order", market, reason);
                self.orders.remove(&market);
                self.results = results::recompute(&self.orders, &self.history);
            }
            ExchangeUpdate::SellPlaced { market, close, order_id } => {
                self.finalize_close(&market, close, order_id);
            }
            ExchangeUpdate::SellUnfillable { market } => {
                // Nothing on the exchange side to sell: cancel whatever is
                // outstanding and drop the order without a result.
                match self.orders.remove(&market) {
                    Some(order) => {
                        warn!("{} unsellable, dropping order without result", market);
                        if let Some(external_id) = order.external_id {
                            self.spawn_cancel(external_id);
                        }
                        self.results = results::recompute(&self.orders, &self.history);
                    }
                    None => warn!("Unsellable report for {} without an open order", market),
                }
            }
            ExchangeUpdate::SellFailed { market, reason } => {
                warn!("Sell for {} failed ({}), will retry on a later tick", market, reason);
                if let Some(order) = self.orders.get_mut(&market) {
                    order.pending_exit = None;
                }
            }
            ExchangeUpdate::Balances(balances) => {
                debug!("Balances refreshed: {} currencies", balances.len());
                self.balances = balances;
            }
        }
    }

    fn finalize_close(&mut self, market: &str, close: RateTick, order_id: Option<String>) {
        let Some(order) = self.orders.remove(market) else {
            warn!("Sell confirmation for {} without an open order", market);
            return;
        };

        let change = close.value / order.open.value - 1.0;
        let rule = order.pending_exit;

        self.history.push(HistoryRecord {
            market: market.to_string(),
            open: order.open,
            close,
            change,
            external_id: order.external_id.or(order_id),
        });
        self.results = results::recompute(&self.orders, &self.history);

        let ban_count = self.bans.on_close(market, change, close);
        if change < 0.0 {
            self.rising.reseed(market, close);
        }

        info!(
            "CLOSE {} @ {:.8} ({:+.2}%, rule {}, ban count {})",
            market,
            close.value,
            change * 100.0,
            rule.map_or_else(|| "-".to_string(), |r| r.to_string()),
            ban_count
        );
        self.notify(NotificationEvent::OrderClosed {
            market: market.to_string(),
            rate: close.value,
            change,
        });
    }

    // ---- control surface -----------------------------------------------

    fn on_control(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::GetState(reply) => {
                let _ = reply.send(self.state_view());
            }
            ControlCommand::ClearBans => {
                info!("Clearing all bans");
                self.bans.clear_all();
            }
            ControlCommand::ClearBan { market, reply } => {
                let cleared = self.bans.clear(&market);
                if cleared {
                    info!("Cleared ban for {}", market);
                }
                let _ = reply.send(cleared);
            }
            ControlCommand::SetBan { market, count } => {
                info!("Setting ban count for {} to {}", market, count);
                self.bans.set(&market, count);
            }
            ControlCommand::SetSetting { name, value, reply } => {
                let result = self.settings.set(&name, value);
                match &result {
                    Ok(()) => info!("Setting {} = {}", name, value),
                    Err(e) => warn!("Rejected setting {} = {}: {}", name, value, e),
                }
                let _ = reply.send(result.map_err(|e| e.to_string()));
            }
            ControlCommand::SetRunState(state) => {
                if self.run_state != state {
                    info!("Run state -> {:?}", state);
                    self.run_state = state;
                    self.notify(NotificationEvent::RunStateChanged { state });
                }
            }
            ControlCommand::SetMuted(muted) => {
                info!("Notifications {}", if muted { "muted" } else { "unmuted" });
                self.muted = muted;
            }
        }
    }

    fn state_view(&self) -> EngineStateView {
        let mut orders: Vec<Order> = self.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.market.cmp(&b.market));

        EngineStateView {
            run_state: self.run_state,
            muted: self.muted,
            markets: self.markets.clone(),
            orders,
            history: self.history.clone(),
            banned: self.bans.entries().clone(),
            rising: self.rising.states().clone(),
            results: self.results,
            settings: self.settings.clone(),
            balances: self.balances.clone(),
        }
    }

    // ---- async collaborators -------------------------------------------

    fn notify(&self, event: NotificationEvent) {
        if !self.muted {
            self.notifier.send(event);
        }
    }

    fn spawn_buy(&self, market: &str, rate: RateTick, amount: f64) {
        let executor = self.executor.clone();
        let tx = self.events_tx.clone();
        let market = market.to_string();
        tokio::spawn(async move {
            let update = match executor.buy(&market, rate.value, amount).await {
                Ok(order_id) => ExchangeUpdate::BuyPlaced { market, order_id },
                Err(e) => ExchangeUpdate::BuyFailed {
                    market,
                    reason: e.to_string(),
                },
            };
            let _ = tx.send(EngineEvent::Exchange(update)).await;
        });
    }

    fn spawn_sell(&self, market: &str, close: RateTick, amount: f64) {
        let executor = self.executor.clone();
        let tx = self.events_tx.clone();
        let market = market.to_string();
        tokio::spawn(async move {
            let update = match executor.sell(&market, close.value, amount).await {
                Ok(SellOutcome::Placed { order_id }) => ExchangeUpdate::SellPlaced {
                    market,
                    close,
                    order_id,
                },
                Ok(SellOutcome::Unsellable) => ExchangeUpdate::SellUnfillable { market },
                Err(e) => ExchangeUpdate::SellFailed {
                    market,
                    reason: e.to_string(),
                },
            };
            let _ = tx.send(EngineEvent::Exchange(update)).await;
        });
    }

    fn spawn_cancel(&self, order_id: String) {
        let executor = self.executor.clone();
        tokio::spawn(async move {
            if let Err(e) = executor.cancel(&order_id).await {
                warn!("Cancel of order {} failed: {}", order_id, e);
            }
        });
    }

    fn spawn_balance_refresh(&self) {
        let executor = self.executor.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            match executor.balances().await {
                Ok(balances) => {
                    let _ = tx
                        .send(EngineEvent::Exchange(ExchangeUpdate::Balances(balances)))
                        .await;
                }
                Err(e) => warn!("Balance refresh failed: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::SimExecutor;
    use tokio::sync::oneshot;

    const MARKET: &str = "BTC-ABC";

    fn test_settings() -> EngineSettings {
        EngineSettings {
            check_rate_period_secs: 30,
            retention_period_secs: 120,
            explosion_threshold: 0.08,
            rising_count_threshold: 2,
            sell_growth_threshold_1: 0.09,
            sell_growth_threshold_2: 0.04,
            sell_growth_2_minutes: 20.0,
            sell_growth_threshold_3: 0.01,
            sell_growth_3_minutes: 60.0,
            sell_fall_threshold: -0.05,
            order_budget: 0.01,
        }
    }

    fn test_engine() -> (Engine, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let engine = Engine::new(
            test_settings(),
            Arc::new(Executor::Simulation(SimExecutor::new())),
            tx,
            Notifier::new(64),
        );
        (engine, rx)
    }

    fn tick(value: f64, time: i64) -> RateTick {
        RateTick::new(value, time)
    }

    fn open_order(engine: &mut Engine, market: &str, rate: RateTick) {
        engine.try_open(market, rate).unwrap();
    }

    fn close_confirmed(engine: &mut Engine, market: &str, close: RateTick) {
        engine.handle_event(EngineEvent::Exchange(ExchangeUpdate::SellPlaced {
            market: market.to_string(),
            close,
            order_id: Some("sell-1".to_string()),
        }));
    }

    #[tokio::test]
    async fn test_confirmed_explosions_open_exactly_one_order() {
        let (mut engine, _rx) = test_engine();

        // Build up the window; detection first fires at t=20
        for (value, time) in [(1.00, 0), (1.09, 10), (1.12, 20)] {
            engine.on_tick(MARKET, tick(value, time));
        }
        assert_eq!(engine.rising.count(MARKET), 1);
        assert!(engine.orders.is_empty());

        // Re-detection inside the same window does not advance
        engine.on_tick(MARKET, tick(1.12, 30));
        assert_eq!(engine.rising.count(MARKET), 1);

        // A second sustained leg past the spacing gate confirms and opens
        // as soon as the detector re-fires (t=56)
        for (value, time) in [(1.18, 52), (1.22, 56), (1.24, 60)] {
            engine.on_tick(MARKET, tick(value, time));
        }
        assert_eq!(engine.orders.len(), 1);
        let order = &engine.orders[MARKET];
        assert_eq!(order.open, tick(1.22, 56));
        assert_eq!(engine.rising.count(MARKET), 0);

        // A third explosion a few seconds later neither advances nor
        // duplicate-opens
        engine.on_tick(MARKET, tick(1.28, 62));
        engine.on_tick(MARKET, tick(1.28, 64));
        assert_eq!(engine.orders.len(), 1);
        assert_eq!(engine.orders[MARKET].open, tick(1.22, 56));
    }

    #[tokio::test]
    async fn test_no_duplicate_open_per_market() {
        let (mut engine, _rx) = test_engine();
        open_order(&mut engine, MARKET, tick(100.0, 0));
        assert_eq!(
            engine.try_open(MARKET, tick(101.0, 10)),
            Err(OpenRejection::AlreadyOpen)
        );
        assert_eq!(engine.orders.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_loss_closes_and_bans() {
        let (mut engine, _rx) = test_engine();
        open_order(&mut engine, MARKET, tick(100.0, 0));

        engine.on_tick(MARKET, tick(94.0, 10));
        let order = &engine.orders[MARKET];
        assert!((order.change - -0.06).abs() < 1e-12);
        assert_eq!(order.pending_exit, Some(crate::types::ExitRule::StopLoss));

        close_confirmed(&mut engine, MARKET, tick(94.0, 10));

        assert!(engine.orders.is_empty());
        assert_eq!(engine.history.len(), 1);
        assert!((engine.history[0].change - -0.06).abs() < 1e-12);
        assert_eq!(engine.bans.entries()[MARKET].count, 1);
        assert!((engine.results.finished - -0.06).abs() < 1e-12);

        // The rising baseline was reseeded at the losing rate
        assert_eq!(engine.rising.states()[MARKET].last_time, 10);
    }

    #[tokio::test]
    async fn test_pending_exit_never_double_fires() {
        let (mut engine, _rx) = test_engine();
        open_order(&mut engine, MARKET, tick(100.0, 0));

        engine.on_tick(MARKET, tick(94.0, 10));
        assert_eq!(
            engine.orders[MARKET].pending_exit,
            Some(crate::types::ExitRule::StopLoss)
        );

        // A deeper fall while the sell is in flight changes nothing
        engine.on_tick(MARKET, tick(90.0, 20));
        assert_eq!(
            engine.orders[MARKET].pending_exit,
            Some(crate::types::ExitRule::StopLoss)
        );
        assert_eq!(engine.history.len(), 0);
    }

    #[tokio::test]
    async fn test_banned_market_rejects_until_winning_close() {
        let (mut engine, _rx) = test_engine();

        // Position opened before the strikes accumulated
        open_order(&mut engine, MARKET, tick(100.0, 0));
        engine.bans.set(MARKET, 3);

        assert_eq!(
            engine.try_open("BTC-ABC", tick(100.0, 5)),
            Err(OpenRejection::AlreadyOpen)
        );

        // Winning close resets the counter and opens are accepted again
        close_confirmed(&mut engine, MARKET, tick(104.0, 600));
        assert_eq!(engine.bans.entries()[MARKET].count, 0);
        assert!(engine.try_open(MARKET, tick(104.0, 700)).is_ok());
    }

    #[tokio::test]
    async fn test_ban_count_three_rejects_open() {
        let (mut engine, _rx) = test_engine();
        engine.bans.set(MARKET, 3);
        assert_eq!(
            engine.try_open(MARKET, tick(100.0, 0)),
            Err(OpenRejection::Banned)
        );
    }

    #[tokio::test]
    async fn test_denylisted_market_rejects_open() {
        let (mut engine, _rx) = test_engine();
        assert_eq!(
            engine.try_open("BTC-DOGE", tick(100.0, 0)),
            Err(OpenRejection::Denylisted)
        );
    }

    #[tokio::test]
    async fn test_paused_engine_rejects_opens() {
        let (mut engine, _rx) = test_engine();
        engine.handle_event(EngineEvent::Control(ControlCommand::SetRunState(
            RunState::Paused,
        )));
        assert_eq!(
            engine.try_open(MARKET, tick(100.0, 0)),
            Err(OpenRejection::Paused)
        );

        engine.handle_event(EngineEvent::Control(ControlCommand::SetRunState(
            RunState::Active,
        )));
        assert!(engine.try_open(MARKET, tick(100.0, 0)).is_ok());
    }

    #[tokio::test]
    async fn test_unsellable_position_drops_without_result() {
        let (mut engine, _rx) = test_engine();
        open_order(&mut engine, MARKET, tick(100.0, 0));
        engine.on_tick(MARKET, tick(94.0, 10));

        engine.handle_event(EngineEvent::Exchange(ExchangeUpdate::SellUnfillable {
            market: MARKET.to_string(),
        }));

        assert!(engine.orders.is_empty());
        assert!(engine.history.is_empty());
        assert_eq!(engine.bans.entries().get(MARKET).map(|e| e.count), None);
    }

    #[tokio::test]
    async fn test_failed_buy_drops_provisional_order() {
        let (mut engine, _rx) = test_engine();
        open_order(&mut engine, MARKET, tick(100.0, 0));

        engine.handle_event(EngineEvent::Exchange(ExchangeUpdate::BuyFailed {
            market: MARKET.to_string(),
            reason: "timeout".to_string(),
        }));
        assert!(engine.orders.is_empty());
    }

    #[tokio::test]
    async fn test_buy_confirmation_records_external_id() {
        let (mut engine, _rx) = test_engine();
        open_order(&mut engine, MARKET, tick(100.0, 0));

        engine.handle_event(EngineEvent::Exchange(ExchangeUpdate::BuyPlaced {
            market: MARKET.to_string(),
            order_id: "abc-123".to_string(),
        }));
        assert_eq!(
            engine.orders[MARKET].external_id.as_deref(),
            Some("abc-123")
        );
    }

    #[tokio::test]
    async fn test_invalid_tick_is_dropped() {
        let (mut engine, _rx) = test_engine();
        engine.on_tick(MARKET, tick(0.0, 10));
        engine.on_tick(MARKET, tick(-1.0, 20));
        engine.on_tick(MARKET, tick(f64::NAN, 30));
        assert!(engine.windows.ingest(MARKET, tick(1.0, 40), 30, 120).is_none());
    }

    #[tokio::test]
    async fn test_active_results_track_open_orders() {
        let (mut engine, _rx) = test_engine();
        open_order(&mut engine, MARKET, tick(100.0, 0));
        open_order(&mut engine, "BTC-XYZ", tick(200.0, 0));

        engine.on_tick(MARKET, tick(102.0, 10));
        engine.on_tick("BTC-XYZ", tick(198.0, 10));

        assert!((engine.results.active - (0.02 - 0.01)).abs() < 1e-12);
        assert_eq!(engine.results.finished, 0.0);
    }

    #[tokio::test]
    async fn test_state_view_reflects_engine() {
        let (mut engine, _rx) = test_engine();
        open_order(&mut engine, MARKET, tick(100.0, 0));
        engine.handle_event(EngineEvent::MarketsRefreshed(vec![MARKET.to_string()]));

        let (reply_tx, reply_rx) = oneshot::channel();
        engine.handle_event(EngineEvent::Control(ControlCommand::GetState(reply_tx)));
        let view = reply_rx.await.unwrap();

        assert_eq!(view.run_state, RunState::Active);
        assert_eq!(view.markets, vec![MARKET.to_string()]);
        assert_eq!(view.orders.len(), 1);
        assert_eq!(view.orders[0].market, MARKET);
        assert!(view.banned.contains_key("BTC-DOGE"));
    }

    #[tokio::test]
    async fn test_setting_change_applies_on_next_tick() {
        let (mut engine, _rx) = test_engine();
        open_order(&mut engine, MARKET, tick(100.0, 0));

        // -3% does not trip the default stop
        engine.on_tick(MARKET, tick(97.0, 10));
        assert_eq!(engine.orders[MARKET].pending_exit, None);

        let (reply_tx, _reply_rx) = oneshot::channel();
        engine.handle_event(EngineEvent::Control(ControlCommand::SetSetting {
            name: "sell_fall_threshold".to_string(),
            value: -0.02,
            reply: reply_tx,
        }));

        engine.on_tick(MARKET, tick(97.0, 12));
        assert_eq!(
            engine.orders[MARKET].pending_exit,
            Some(crate::types::ExitRule::StopLoss)
        );
    }

    #[tokio::test]
    async fn test_muted_engine_drops_notifications() {
        let (mut engine, _rx) = test_engine();
        let mut notifications = engine.notifier.subscribe();

        engine.handle_event(EngineEvent::Control(ControlCommand::SetMuted(true)));
        open_order(&mut engine, MARKET, tick(100.0, 0));
        assert!(notifications.try_recv().is_err());

        engine.handle_event(EngineEvent::Control(ControlCommand::SetMuted(false)));
        open_order(&mut engine, "BTC-XYZ", tick(100.0, 0));
        assert!(notifications.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_clear_bans_keeps_denylist() {
        let (mut engine, _rx) = test_engine();
        engine.bans.set(MARKET, 3);

        engine.handle_event(EngineEvent::Control(ControlCommand::ClearBans));
        assert!(!engine.bans.is_banned(MARKET));
        assert!(engine.bans.is_banned("BTC-DOGE"));
    }

    #[tokio::test]
    async fn test_finished_results_resummed_over_history() {
        let (mut engine, _rx) = test_engine();

        open_order(&mut engine, MARKET, tick(100.0, 0));
        engine.on_tick(MARKET, tick(94.0, 10));
        close_confirmed(&mut engine, MARKET, tick(94.0, 10));

        open_order(&mut engine, MARKET, tick(94.0, 700));
        engine.on_tick(MARKET, tick(103.0, 710));
        close_confirmed(&mut engine, MARKET, tick(103.0, 710));

        assert_eq!(engine.history.len(), 2);
        let expected = (94.0 / 100.0 - 1.0) + (103.0 / 94.0 - 1.0);
        assert!((engine.results.finished - expected).abs() < 1e-12);
        assert_eq!(engine.results.active, 0.0);
    }
}
