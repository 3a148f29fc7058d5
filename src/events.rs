use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::source::{Resource, TransportError};
use crate::types::{ChatMessage, Order};

/// Why one resource could not be processed in a cycle.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("extraction: {0}")]
    Extraction(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Never emitted while the stored balance is still the zero sentinel.
    BalanceChanged { old: Decimal, new: Decimal },

    NewOrder { order: Order },

    OrderStatusChanged { order: Order, old: String, new: String },

    NewMessage { message: ChatMessage },

    /// A fetch or extraction failed. The loop keeps going.
    EngineError { resource: Resource, error: FetchError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BalanceChanged,
    NewOrder,
    OrderStatusChanged,
    NewMessage,
    EngineError,
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::BalanceChanged { .. } => EventKind::BalanceChanged,
            EngineEvent::NewOrder { .. } => EventKind::NewOrder,
            EngineEvent::OrderStatusChanged { .. } => EventKind::OrderStatusChanged,
            EngineEvent::NewMessage { .. } => EventKind::NewMessage,
            EngineEvent::EngineError { .. } => EventKind::EngineError,
        }
    }

    pub fn error(resource: Resource, error: impl Into<FetchError>) -> Self {
        EngineEvent::EngineError { resource, error: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_event_wraps_transport_error() {
        let ev = EngineEvent::error(Resource::Orders, TransportError::Status { status: 502 });
        assert_eq!(ev.kind(), EventKind::EngineError);
        match ev {
            EngineEvent::EngineError { resource, error } => {
                assert_eq!(resource.to_string(), "orders");
                assert_eq!(error.to_string(), "transport: non-success response: HTTP 502");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let ev = EngineEvent::BalanceChanged {
            old: Decimal::new(100, 0),
            new: Decimal::new(150, 0),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "balance_changed");
    }
}
