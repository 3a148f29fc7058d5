//! Snapshot-diff poller for a marketplace account.
//!
//! Polls the balance, orders and chat pages, turns the markup into records,
//! diffs them against the latest snapshot and publishes change events
//! (`NewOrder`, `OrderStatusChanged`, `NewMessage`, `BalanceChanged`,
//! `EngineError`) to any number of subscribers.
//!
//! ```no_run
//! use std::sync::Arc;
//! use market_poller::{Engine, EngineConfig, HtmlExtractor, HttpSource};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = EngineConfig::default();
//! let source = HttpSource::new("https://market.example".into(), None, "demo", config.fetch_timeout)?;
//! let engine = Engine::new(Arc::new(source), Arc::new(HtmlExtractor::new()), config);
//! let mut events = engine.subscribe();
//! engine.start(None);
//! while let Some(ev) = events.recv().await {
//!     println!("{:?}", ev);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diff;
pub mod engine;
pub mod events;
pub mod extract;
pub mod gateway;
pub mod observer;
pub mod publisher;
pub mod snapshot;
pub mod source;
pub mod stats;
pub mod types;

pub use config::{EngineConfig, Settings};
pub use engine::{Engine, EngineState};
pub use events::{EngineEvent, EventKind, FetchError};
pub use extract::{Extractor, HtmlExtractor};
pub use gateway::{HttpGateway, MutationAction, MutationGateway};
pub use publisher::{EventPublisher, Subscription};
pub use source::{DataSource, HttpSource, RawDocument, Resource, TransportError};
pub use types::{Chat, ChatMessage, Order, Profile, Record, RecordKind};
