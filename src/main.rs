use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use market_poller::observer::EventObserver;
use market_poller::{Engine, HtmlExtractor, HttpSource, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let s = Settings::from_env()?;
    let engine_config = s.engine_config();

    let source = HttpSource::new(
        s.base_url.clone(),
        s.golden_key(),
        &s.user_agent,
        engine_config.fetch_timeout,
    )?;
    if s.golden_key().is_none() {
        tracing::warn!("GOLDEN_KEY not set, requests are unauthenticated");
    }

    let engine = Engine::new(Arc::new(source), Arc::new(HtmlExtractor::new()), engine_config);

    let observer = EventObserver::new(s.events_jsonl_path.clone());
    let observer_task = tokio::spawn(observer.run(engine.subscribe()));

    tracing::info!(base_url = %s.base_url, poll_ms = s.poll_ms, "starting engine");
    engine.start(None);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    engine.stop().await;
    let stats = engine.stats();
    tracing::info!(
        cycles = stats.cycles,
        events_published = stats.events_published,
        engine_errors = stats.engine_errors,
        orders = engine.current_orders().len(),
        chats = engine.current_chats().len(),
        balance = %engine.current_balance(),
        "engine stopped"
    );

    drop(engine);
    let _ = observer_task.await;
    Ok(())
}
