use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub golden_key: Option<String>,
    pub user_agent: String,

    pub poll_ms: u64,
    pub fetch_timeout_ms: u64,
    pub thread_concurrency: usize,
    pub event_buffer: usize,

    // Stats
    pub stats_log_sec: u64,
    pub events_jsonl_path: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let c = config::Config::builder()
            .set_default("user_agent", "market-poller/0.1")?
            .set_default("poll_ms", 15_000)?
            .set_default("fetch_timeout_ms", 10_000)?
            .set_default("thread_concurrency", 4)?
            .set_default("event_buffer", 256)?
            .set_default("stats_log_sec", 60)?
            .add_source(config::Environment::default())
            .build()?;
        Ok(c.try_deserialize()?)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_millis(self.poll_ms),
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            thread_concurrency: self.thread_concurrency.max(1),
            event_buffer: self.event_buffer.max(1),
            stats_log_sec: self.stats_log_sec,
        }
    }

    pub fn golden_key(&self) -> Option<&str> {
        self.golden_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

/// Knobs of the polling engine itself.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    /// Bound on each individual fetch, not on the whole cycle.
    pub fetch_timeout: Duration,
    pub thread_concurrency: usize,
    pub event_buffer: usize,
    pub stats_log_sec: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(15_000),
            fetch_timeout: Duration::from_millis(10_000),
            thread_concurrency: 4,
            event_buffer: 256,
            stats_log_sec: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            base_url: "https://market.example".into(),
            golden_key: Some("  ".into()),
            user_agent: "ua".into(),
            poll_ms: 2_000,
            fetch_timeout_ms: 500,
            thread_concurrency: 0,
            event_buffer: 16,
            stats_log_sec: 0,
            events_jsonl_path: None,
        }
    }

    #[test]
    fn test_default_engine_config() {
        let c = EngineConfig::default();
        assert_eq!(c.poll_interval, Duration::from_secs(15));
        assert_eq!(c.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_engine_config_from_settings() {
        let c = settings().engine_config();
        assert_eq!(c.poll_interval, Duration::from_secs(2));
        assert_eq!(c.fetch_timeout, Duration::from_millis(500));
        assert_eq!(c.thread_concurrency, 1);
        assert_eq!(c.event_buffer, 16);
    }

    #[test]
    fn test_blank_golden_key_is_none() {
        assert!(settings().golden_key().is_none());
    }
}
