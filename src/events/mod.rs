use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Domain events published after a change has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderUpdated(Uuid),
    OrderCancelled(Uuid),
    OrderPaid(Uuid),
    OrderCompleted(Uuid),
    StockAdjusted {
        product_id: Uuid,
        old_quantity: i32,
        new_quantity: i32,
        reason: String,
    },
    LowStock {
        product_id: Uuid,
        name: String,
        stock_quantity: i32,
        threshold: i32,
    },
    DayEnded {
        end_day_id: Uuid,
        net_total: Decimal,
    },
    SettingsUpdated {
        keys: Vec<String>,
    },
}

/// Publishes every event in order, logging instead of failing when the channel is gone.
pub async fn publish_all(sender: Option<&EventSender>, events: Vec<Event>) {
    let Some(sender) = sender else {
        return;
    };
    for event in events {
        if let Err(e) = sender.send(event).await {
            warn!(error = %e, "Failed to publish event");
        }
    }
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderCreated(order_id) => info!(%order_id, "Order created"),
            Event::OrderUpdated(order_id) => info!(%order_id, "Order updated"),
            Event::OrderCancelled(order_id) => info!(%order_id, "Order cancelled"),
            Event::OrderPaid(order_id) => info!(%order_id, "Order paid"),
            Event::OrderCompleted(order_id) => info!(%order_id, "Order completed"),
            Event::StockAdjusted {
                product_id,
                old_quantity,
                new_quantity,
                reason,
            } => {
                info!(
                    %product_id,
                    old_quantity,
                    new_quantity,
                    reason = %reason,
                    "Stock adjusted"
                );
            }
            Event::LowStock {
                product_id,
                name,
                stock_quantity,
                threshold,
            } => {
                warn!(
                    %product_id,
                    product = %name,
                    stock_quantity,
                    threshold,
                    "Product stock is below the low stock threshold"
                );
            }
            Event::DayEnded {
                end_day_id,
                net_total,
            } => info!(%end_day_id, %net_total, "Day ended"),
            Event::SettingsUpdated { keys } => info!(keys = ?keys, "Settings updated"),
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_all_preserves_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();

        publish_all(
            Some(&sender),
            vec![Event::OrderCreated(order_id), Event::OrderPaid(order_id)],
        )
        .await;

        assert_eq!(rx.recv().await, Some(Event::OrderCreated(order_id)));
        assert_eq!(rx.recv().await, Some(Event::OrderPaid(order_id)));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::OrderUpdated(Uuid::new_v4())).await.is_err());

        // publishing to a closed channel only logs
        publish_all(Some(&sender), vec![Event::OrderUpdated(Uuid::new_v4())]).await;
    }
}
