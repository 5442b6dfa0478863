//! Notification fan-out.
//!
//! The engine publishes fire-and-forget events onto a broadcast channel;
//! subscribers are the WebSocket handler and a logging drain. A send with
//! no receivers is not an error, and slow receivers lag rather than block
//! the pipeline.

use tokio::sync::broadcast;
use tracing::info;

use crate::types::NotificationEvent;

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<NotificationEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn send(&self, event: NotificationEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }

    /// Spawn a task that logs every event, so notifications are observable
    /// even with no WebSocket client attached.
    pub fn spawn_log_drain(&self) {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(NotificationEvent::ExplosionDetected { market, rate, growth }) => {
                        info!("NOTIFY explosion {} @ {:.8} (+{:.2}%)", market, rate, growth * 100.0);
                    }
                    Ok(NotificationEvent::OrderOpened { market, rate }) => {
                        info!("NOTIFY bought {} @ {:.8}", market, rate);
                    }
                    Ok(NotificationEvent::OrderClosed { market, rate, change }) => {
                        info!("NOTIFY sold {} @ {:.8} ({:+.2}%)", market, rate, change * 100.0);
                    }
                    Ok(NotificationEvent::RunStateChanged { state }) => {
                        info!("NOTIFY run state {:?}", state);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        info!("Notification drain lagged, skipped {}", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let notifier = Notifier::new(16);
        let mut rx = notifier.subscribe();

        notifier.send(NotificationEvent::OrderOpened {
            market: "BTC-ABC".to_string(),
            rate: 0.0001,
        });

        match rx.recv().await.unwrap() {
            NotificationEvent::OrderOpened { market, .. } => assert_eq!(market, "BTC-ABC"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_send_without_receivers_is_swallowed() {
        let notifier = Notifier::new(16);
        notifier.send(NotificationEvent::RunStateChanged {
            state: crate::types::RunState::Paused,
        });
    }
}
