
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::EngineConfig;
use crate::diff;
use crate::events::{EngineEvent, EventKind, FetchError};
use crate::extract::Extractor;
use crate::publisher::{EventPublisher, Subscription};
use crate::snapshot::SnapshotStore;
use crate::source::{DataSource, RawDocument, Resource, TransportError};
use crate::stats::{now_ms, Stats, StatsSnapshot};
use crate::types::{Chat, Order, Record, RecordKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopping,
}

struct Shared {
    source: Arc<dyn DataSource>,
    extractor: Arc<dyn Extractor>,
    config: EngineConfig,
    snapshot: RwLock<SnapshotStore>,
    publisher: EventPublisher,
    stats: Arc<Stats>,
    state: Mutex<EngineState>,
    bootstrapped: AtomicBool,
}

#[derive(Default)]
struct Control {
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

pub struct Engine {
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl Engine {
    pub fn new(source: Arc<dyn DataSource>, extractor: Arc<dyn Extractor>, config: EngineConfig) -> Self {
        let publisher = EventPublisher::new(config.event_buffer);
        Self {
            shared: Arc::new(Shared {
                source,
                extractor,
                config,
                snapshot: RwLock::new(SnapshotStore::new()),
                publisher,
                stats: Stats::new(now_ms()),
                state: Mutex::new(EngineState::Idle),
                bootstrapped: AtomicBool::new(false),
            }),
            control: Mutex::new(Control::default()),
        }
    }

    /// Spawns the poll loop. Returns `false` (and does nothing) unless idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval: Option<Duration>) -> bool {
        let mut control = self.control.lock();
        {
            let mut state = self.shared.state.lock();
            if *state != EngineState::Idle {
                tracing::debug!(state = ?*state, "start ignored");
                return false;
            }
            *state = EngineState::Running;
        }

        let interval = interval.unwrap_or(self.shared.config.poll_interval);
        let cancel = CancellationToken::new();
        let worker = Worker {
            shared: self.shared.clone(),
            cancel: cancel.clone(),
        };
        control.cancel = Some(cancel);
        control.handle = Some(tokio::spawn(worker.run(interval)));
        true
    }

    /// Signals the loop and waits for it to wind down. No-op when idle.
    ///
    /// The worker itself moves the state back to `Idle` on exit, so dropping
    /// this future early still leaves a restartable engine.
    pub async fn stop(&self) {
        let (cancel, handle) = {
            let mut control = self.control.lock();
            let mut state = self.shared.state.lock();
            if *state == EngineState::Running {
                *state = EngineState::Stopping;
            }
            (control.cancel.take(), control.handle.take())
        };

        let Some(handle) = handle else { return };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "poll loop task failed");
        }
    }

    pub fn state(&self) -> EngineState {
        *self.shared.state.lock()
    }

    pub fn subscribe(&self) -> Subscription {
        self.shared.publisher.subscribe()
    }

    pub fn subscribe_to(&self, kinds: &[EventKind]) -> Subscription {
        self.shared.publisher.subscribe_to(kinds)
    }

    pub fn current_balance(&self) -> Decimal {
        self.shared.snapshot.read().balance
    }

    pub fn current_orders(&self) -> Vec<Order> {
        self.shared.snapshot.read().orders_sorted()
    }

    pub fn current_chats(&self) -> Vec<Chat> {
        self.shared.snapshot.read().chats_sorted()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot(now_ms())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(cancel) = self.control.get_mut().cancel.take() {
            cancel.cancel();
        }
    }
}

struct Worker {
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

/// Resets the engine to `Idle` when the worker exits, panics included.
struct IdleOnExit(Arc<Shared>);

impl Drop for IdleOnExit {
    fn drop(&mut self) {
        *self.0.state.lock() = EngineState::Idle;
    }
}

impl Worker {
    async fn run(self, interval: Duration) {
        let _idle = IdleOnExit(self.shared.clone());
        tracing::info!(interval_ms = interval.as_millis() as u64, "poll loop started");

        if !self.shared.bootstrapped.load(Ordering::Acquire) && self.bootstrap().await.is_continue() {
            self.shared.bootstrapped.store(true, Ordering::Release);
        }

        let mut cycle: u64 = 0;
        while !self.cancel.is_cancelled() {
            cycle += 1;
            let started = Instant::now();
            let flow = self.cycle().instrument(tracing::info_span!("cycle", cycle)).await;

            self.shared.stats.inc_cycle();
            self.shared.stats.set_last_cycle_ms(started.elapsed().as_millis() as u64);
            self.maybe_log_stats();

            if flow.is_break() {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!(cycles = cycle, "poll loop stopped");
    }

    /// First pass: fill the snapshot, publish nothing, ignore failures.
    async fn bootstrap(&self) -> ControlFlow<()> {
        tracing::info!("bootstrap: seeding snapshot");

        match self.load(Resource::Balance).await? {
            Ok(doc) => {
                if let Some(balance) = self.extract(&doc, RecordKind::Balance, Record::into_balance).into_iter().next() {
                    diff::seed_balance(&mut self.shared.snapshot.write(), balance);
                }
            }
            Err(e) => tracing::debug!(error = %e, "bootstrap: balance unavailable"),
        }

        match self.load(Resource::Orders).await? {
            Ok(doc) => {
                let orders = self.extract(&doc, RecordKind::Order, Record::into_order);
                tracing::debug!(records = orders.len(), "bootstrap: orders");
                diff::seed_orders(&mut self.shared.snapshot.write(), orders);
            }
            Err(e) => tracing::debug!(error = %e, "bootstrap: orders unavailable"),
        }

        match self.load(Resource::Chats).await? {
            Ok(doc) => {
                let chats = self.extract(&doc, RecordKind::Chat, Record::into_chat);
                tracing::debug!(records = chats.len(), "bootstrap: chats");
                diff::seed_chats(&mut self.shared.snapshot.write(), chats);
            }
            Err(e) => tracing::debug!(error = %e, "bootstrap: chats unavailable"),
        }

        ControlFlow::Continue(())
    }

    async fn cycle(&self) -> ControlFlow<()> {
        self.poll_balance().await?;
        self.poll_orders().await?;
        self.poll_chats().await
    }

    async fn poll_balance(&self) -> ControlFlow<()> {
        let outcome = self.load(Resource::Balance).await?.and_then(|doc| {
            self.extract(&doc, RecordKind::Balance, Record::into_balance)
                .into_iter()
                .next()
                .ok_or_else(|| FetchError::Extraction("balance not found".into()))
        });

        match outcome {
            Ok(balance) => {
                let event = diff::diff_balance(&mut self.shared.snapshot.write(), balance);
                self.publish(event);
            }
            Err(e) => self.report(Resource::Balance, e),
        }
        ControlFlow::Continue(())
    }

    async fn poll_orders(&self) -> ControlFlow<()> {
        match self.load(Resource::Orders).await? {
            Ok(doc) => {
                let orders = self.extract(&doc, RecordKind::Order, Record::into_order);
                let records = orders.len();
                let events = diff::diff_orders(&mut self.shared.snapshot.write(), orders);
                tracing::debug!(records, events = events.len(), "orders diffed");
                self.publish(events);
            }
            Err(e) => self.report(Resource::Orders, e),
        }
        ControlFlow::Continue(())
    }

    async fn poll_chats(&self) -> ControlFlow<()> {
        let chats = match self.load(Resource::Chats).await? {
            Ok(doc) => self.extract(&doc, RecordKind::Chat, Record::into_chat),
            Err(e) => {
                self.report(Resource::Chats, e);
                return ControlFlow::Continue(());
            }
        };

        let changed = diff::changed_chats(&self.shared.snapshot.read(), &chats);
        tracing::debug!(records = chats.len(), changed = changed.len(), "chats listed");
        if changed.is_empty() {
            return ControlFlow::Continue(());
        }

        let this = self;
        let threads: Vec<_> = stream::iter(changed)
            .map(move |chat| async move {
                let loaded = this.load(Resource::ChatThread(chat.id)).await;
                (chat, loaded)
            })
            .buffered(self.shared.config.thread_concurrency.max(1))
            .collect()
            .await;

        // applied one at a time, in chat-list order
        for (chat, loaded) in threads {
            let resource = Resource::ChatThread(chat.id);
            match loaded? {
                Ok(doc) => {
                    let messages = self.extract(&doc, RecordKind::ChatMessage, Record::into_message);
                    let events = diff::apply_thread(&mut self.shared.snapshot.write(), chat, messages);
                    self.publish(events);
                }
                Err(e) => self.report(resource, e),
            }
        }
        ControlFlow::Continue(())
    }

    /// One bounded, cancelable fetch. `Break` means stop was requested.
    async fn load(&self, resource: Resource) -> ControlFlow<(), Result<RawDocument, FetchError>> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }

        let timeout = self.shared.config.fetch_timeout;
        tokio::select! {
            _ = self.cancel.cancelled() => ControlFlow::Break(()),
            res = tokio::time::timeout(timeout, self.shared.source.fetch(resource)) => {
                ControlFlow::Continue(match res {
                    Ok(Ok(doc)) => Ok(doc),
                    Ok(Err(e)) => Err(e.into()),
                    Err(_) => Err(TransportError::Timeout(timeout).into()),
                })
            }
        }
    }

    fn extract<T>(&self, doc: &RawDocument, kind: RecordKind, pick: fn(Record) -> Option<T>) -> Vec<T> {
        self.shared
            .extractor
            .extract(doc, kind)
            .into_iter()
            .filter_map(pick)
            .collect()
    }

    fn report(&self, resource: Resource, error: FetchError) {
        tracing::warn!(resource = %resource, error = %error, "resource failed this cycle");
        self.publish(Some(EngineEvent::error(resource, error)));
    }

    fn publish(&self, events: impl IntoIterator<Item = EngineEvent>) {
        for event in events {
            if event.kind() == EventKind::EngineError {
                self.shared.stats.inc_error();
            }
            self.shared.stats.inc_event();
            self.shared.publisher.publish(event);
        }
    }

    fn maybe_log_stats(&self) {
        let t = now_ms();
        let stats = &self.shared.stats;
        if stats.should_log(t, self.shared.config.stats_log_sec) {
            let ss = stats.snapshot(t);
            stats.mark_logged(t);
            tracing::info!(
                up_sec = ss.up_sec,
                cycles = ss.cycles,
                events_published = ss.events_published,
                engine_errors = ss.engine_errors,
                last_cycle_ms = ss.last_cycle_ms,
                "stats"
            );
        }
    }
}
