//! Client context negotiation.
//!
//! Only one management system should act on a VPP account at a time. Each
//! system claims the account by writing a small JSON document, the client
//! context, into the account configuration; the service stores it as an
//! opaque string. Writes are last-writer-wins: reading the claim before
//! acting lets a system notice that another host has taken over.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::VppError;
use crate::service_config::Operation;
use crate::session::Session;

/// A claim on the account by one management host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    pub hostname: String,
    pub guid: String,
}

impl ClientContext {
    /// A fresh claim for `hostname` with a random guid.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            guid: Uuid::new_v4().to_string(),
        }
    }

    /// Whether `other` is the same claim as this one.
    pub fn is_same_owner(&self, other: &ClientContext) -> bool {
        self.guid.eq_ignore_ascii_case(&other.guid)
    }
}

/// Account configuration returned by the client-config operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// The current claim; `None` when no host has claimed the account or the
    /// stored text is not a claim this library wrote.
    #[serde(default, deserialize_with = "embedded_context")]
    pub client_context: Option<ClientContext>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub apple_id: Option<String>,
    #[serde(default)]
    pub facilitator_member_id: Option<String>,
    #[serde(default)]
    pub organization_id_hash: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
}

impl ClientConfig {
    /// True when another host holds the claim.
    pub fn conflicts_with(&self, local: &ClientContext) -> bool {
        self.client_context
            .as_ref()
            .is_some_and(|current| !current.is_same_owner(local))
    }
}

fn embedded_context<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ClientContext>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| serde_json::from_str(&s).ok()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientConfigRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    client_context: Option<String>,
    verbose: bool,
}

/// Client context verbs.
#[derive(Debug, Clone)]
pub struct ContextClient {
    session: Arc<Session>,
}

impl ContextClient {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Read the account configuration including the current claim.
    pub async fn get(&self) -> Result<ClientConfig, VppError> {
        let request = ClientConfigRequest {
            client_context: None,
            verbose: true,
        };
        self.session
            .dispatch(Operation::ClientConfig.key(), &request)
            .await
    }

    /// Write `context` as the current claim, replacing any other host's claim.
    pub async fn update(&self, context: &ClientContext) -> Result<ClientConfig, VppError> {
        let operation = Operation::ClientConfig.key();
        let encoded = serde_json::to_string(context).map_err(|e| VppError::Encode {
            operation: operation.to_string(),
            source: e,
        })?;
        let request = ClientConfigRequest {
            client_context: Some(encoded),
            verbose: true,
        };
        let config: ClientConfig = self.session.dispatch(operation, &request).await?;
        tracing::info!(hostname = %context.hostname, "claimed VPP account");
        Ok(config)
    }
}
