use tokio::io::AsyncWriteExt;

use crate::events::EngineEvent;
use crate::publisher::Subscription;

/// Logs every engine event and optionally appends it as a JSON line.
#[derive(Clone, Default)]
pub struct EventObserver {
    jsonl_path: Option<String>,
}

impl EventObserver {
    pub fn new(jsonl_path: Option<String>) -> Self {
        let jsonl_path = jsonl_path.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        Self { jsonl_path }
    }

    /// Runs until the engine goes away.
    pub async fn run(self, mut sub: Subscription) {
        while let Some(event) = sub.recv().await {
            self.observe(&event).await;
        }
        tracing::debug!("event stream closed");
    }

    pub async fn observe(&self, event: &EngineEvent) {
        match event {
            EngineEvent::BalanceChanged { old, new } => {
                tracing::info!(old = %old, new = %new, delta = %(*new - *old), "balance changed");
            }
            EngineEvent::NewOrder { order } => {
                tracing::info!(
                    order_id = %order.id,
                    buyer = %order.buyer.name,
                    status = %order.status,
                    price = %order.price,
                    quantity = order.quantity,
                    "new order"
                );
            }
            EngineEvent::OrderStatusChanged { order, old, new } => {
                tracing::info!(order_id = %order.id, old = %old, new = %new, "order status changed");
            }
            EngineEvent::NewMessage { message } => {
                let author = message.author.as_ref().map(|a| a.name.as_str()).unwrap_or("-");
                tracing::info!(chat_id = message.chat_id, message_id = message.id, author, text = %message.text, "new message");
            }
            EngineEvent::EngineError { resource, error } => {
                tracing::warn!(resource = %resource, error = %error, "engine error");
            }
        }

        if let Some(path) = &self.jsonl_path {
            let line = serde_json::json!({
                "ts_ms": chrono::Utc::now().timestamp_millis(),
                "event": event,
            });
            append_line(path, &line.to_string()).await;
        }
    }
}

async fn append_line(path: &str, line: &str) {
    match tokio::fs::OpenOptions::new().create(true).append(true).open(path).await {
        Ok(mut f) => {
            let _ = f.write_all(line.as_bytes()).await;
            let _ = f.write_all(b"\n").await;
        }
        Err(e) => tracing::warn!(path, error = %e, "cannot open events jsonl"),
    }
}
