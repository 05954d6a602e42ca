use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Cloneable handle commands use to publish domain events after their
/// transaction committed.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Everything downstream consumers can observe about the engine: one
/// lifecycle event per document transition, carrying the identity of the
/// document that moved. Stock quantities stay queryable through the movement
/// log keyed by the event's document number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Purchase lifecycle
    PurchaseOrderCreated(Uuid),
    PurchaseOrderAudited(Uuid),
    PurchaseOrderCanceled(Uuid),
    PurchaseOrderReceived {
        order_id: Uuid,
        inbound_no: String,
        completed: bool,
    },
    PurchaseInboundReversed {
        order_id: Uuid,
        inbound_no: String,
        reversal_no: String,
    },
    PurchaseReturnCreated(Uuid),
    PurchaseReturnAudited(Uuid),
    PurchaseReturnExecuted {
        return_id: Uuid,
        document_no: String,
    },
    PurchaseReturnCanceled(Uuid),

    // Sales lifecycle
    SalesOrderCreated(Uuid),
    SalesOrderAudited(Uuid),
    SalesOrderCanceled(Uuid),
    SalesOrderShipped {
        order_id: Uuid,
        shipment_no: String,
        fully_shipped: bool,
    },
    ShipmentReversed {
        order_id: Uuid,
        shipment_no: String,
        reversal_no: String,
    },
    SalesReturnCreated(Uuid),
    SalesReturnAudited(Uuid),
    SalesReturnReceived(Uuid),
    SalesReturnCompleted(Uuid),
    SalesReturnRejected(Uuid),
    SalesReturnCanceled(Uuid),

    // Stock counts
    StockCountCreated(Uuid),
    StockCountExecuted {
        count_id: Uuid,
        adjust_in_no: Option<String>,
        adjust_out_no: Option<String>,
    },
    StockCountCanceled(Uuid),
}

/// Drains the event channel and logs each event. Runs for the lifetime of
/// the process; downstream consumers (billing, notifications) subscribe by
/// extending this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::SalesOrderShipped {
                order_id,
                shipment_no,
                fully_shipped,
            } => {
                info!(
                    order_id = %order_id,
                    shipment_no = %shipment_no,
                    fully_shipped = %fully_shipped,
                    "sales order shipped"
                );
            }
            Event::ShipmentReversed {
                order_id,
                shipment_no,
                reversal_no,
            } => {
                warn!(
                    order_id = %order_id,
                    shipment_no = %shipment_no,
                    reversal_no = %reversal_no,
                    "shipment reversed"
                );
            }
            other => {
                info!(event = ?other, "domain event");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::SalesOrderShipped {
                order_id: Uuid::new_v4(),
                shipment_no: "SH20250301120000-1234".into(),
                fully_shipped: false,
            })
            .await
            .unwrap();

        let got = rx.recv().await.unwrap();
        assert!(
            matches!(got, Event::SalesOrderShipped { shipment_no, .. } if shipment_no.starts_with("SH"))
        );
    }

    #[tokio::test]
    async fn send_fails_once_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let err = sender.send(Event::SalesOrderCreated(Uuid::new_v4())).await;
        assert!(err.is_err());
    }
}
