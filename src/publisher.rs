use std::collections::HashSet;

use tokio::sync::broadcast;

use crate::events::{EngineEvent, EventKind};

/// Non-blocking multicast of engine events.
///
/// Each subscriber gets a bounded ring of `capacity` events. With no
/// subscribers an event is simply dropped, nothing accumulates.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers the event reached.
    pub fn publish(&self, event: EngineEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.tx.subscribe(), kinds: None }
    }

    pub fn subscribe_to(&self, kinds: &[EventKind]) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            kinds: Some(kinds.iter().copied().collect()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<EngineEvent>,
    kinds: Option<HashSet<EventKind>>,
}

impl Subscription {
    /// Next matching event, or `None` once the publisher is gone.
    ///
    /// A subscriber that falls more than the buffer behind loses the oldest
    /// events and carries on from the oldest one still buffered.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        loop {
            match self.rx.recv().await {
                Ok(ev) if self.wants(&ev) => return Some(ev),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(dropped = n, "subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). `None` when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(ev) if self.wants(&ev) => return Some(ev),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(dropped = n, "subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    fn wants(&self, ev: &EngineEvent) -> bool {
        self.kinds.as_ref().map_or(true, |k| k.contains(&ev.kind()))
    }
}
