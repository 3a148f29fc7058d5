pub mod http;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpSource;

/// One logical page the engine knows how to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Balance,
    Orders,
    Chats,
    ChatThread(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Balance,
    Orders,
    Chats,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Balance => ResourceKind::Balance,
            Resource::Orders => ResourceKind::Orders,
            Resource::Chats | Resource::ChatThread(_) => ResourceKind::Chats,
        }
    }

    /// Path relative to the base endpoint.
    pub fn path(&self) -> String {
        match self {
            Resource::Balance => "/account/balance".to_string(),
            Resource::Orders => "/orders/trade".to_string(),
            Resource::Chats => "/chat/".to_string(),
            Resource::ChatThread(id) => format!("/chat/?node={}", id),
        }
    }
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Balance => "balance",
            ResourceKind::Orders => "orders",
            ResourceKind::Chats => "chats",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::ChatThread(id) => write!(f, "chats/{}", id),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Markup as returned by the site, tagged with the resource it came from.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub resource: Resource,
    pub body: String,
}

#[derive(Debug, Clone, Error, PartialEq, Serialize)]
pub enum TransportError {
    #[error("non-success response: HTTP {status}")]
    Status { status: u16 },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network failure: {0}")]
    Network(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Authenticated retrieval of one resource.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, resource: Resource) -> Result<RawDocument, TransportError>;
}
