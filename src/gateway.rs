use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::source::http::{build_client, map_reqwest_error};
use crate::source::TransportError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationAction {
    AcceptOrder { order_id: String },
    CancelOrder { order_id: String },
    DeliverOrder { order_id: String, payload: String },
    SetOfferPrice { offer_id: u64, price: Decimal },
    SetOfferAvailability { offer_id: u64, available: bool },
    SendMessage { chat_id: u64, text: String },
}

impl MutationAction {
    pub fn path(&self) -> &'static str {
        match self {
            MutationAction::AcceptOrder { .. } => "/orders/accept",
            MutationAction::CancelOrder { .. } => "/orders/refund",
            MutationAction::DeliverOrder { .. } => "/orders/deliver",
            MutationAction::SetOfferPrice { .. } | MutationAction::SetOfferAvailability { .. } => "/lots/offerSave",
            MutationAction::SendMessage { .. } => "/chat/send",
        }
    }

    pub fn form(&self) -> Vec<(&'static str, String)> {
        match self {
            MutationAction::AcceptOrder { order_id } | MutationAction::CancelOrder { order_id } => {
                vec![("id", order_id.clone())]
            }
            MutationAction::DeliverOrder { order_id, payload } => {
                vec![("id", order_id.clone()), ("payload", payload.clone())]
            }
            MutationAction::SetOfferPrice { offer_id, price } => {
                vec![("offer_id", offer_id.to_string()), ("price", price.normalize().to_string())]
            }
            MutationAction::SetOfferAvailability { offer_id, available } => {
                let active = if *available { "on" } else { "off" };
                vec![("offer_id", offer_id.to_string()), ("active", active.to_string())]
            }
            MutationAction::SendMessage { chat_id, text } => {
                vec![("node", chat_id.to_string()), ("content", text.clone())]
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[async_trait]
pub trait MutationGateway: Send + Sync {
    /// `Ok(true)` if the site accepted the action, `Ok(false)` if it refused.
    async fn submit(&self, action: MutationAction) -> Result<bool, GatewayError>;
}

#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(
        base_url: String,
        golden_key: Option<&str>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: build_client(golden_key, user_agent, timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl MutationGateway for HttpGateway {
    async fn submit(&self, action: MutationAction) -> Result<bool, GatewayError> {
        let url = format!("{}{}", self.base_url, action.path());
        let resp = self
            .http
            .post(&url)
            .form(&action.form())
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;

        let accepted = resp.status().is_success();
        tracing::info!(action = ?action, status = resp.status().as_u16(), accepted, "mutation submitted");
        Ok(accepted)
    }
}
