//! Backend connection service
//!
//! Owns the live tool clients, one per backend identity. Clients are created
//! lazily on first request and reused afterwards; creation is serialized so
//! two concurrent first requests for the same backend never start two
//! server processes.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{config::default_npx_command, error::AppResult};

use super::client::ToolClient;
use super::stdio::{StdioMcpClient, StdioTransportOptions};

/// Identity of a tool backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendKey {
    /// Azure resource management and monitoring
    Azure,
    /// GitHub repositories, pull requests and workflows
    GitHub,
    /// Any other backend, by name
    Named(String),
}

impl fmt::Display for BackendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKey::Azure => write!(f, "azure"),
            BackendKey::GitHub => write!(f, "github"),
            BackendKey::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Cache of live tool clients keyed by backend identity
///
/// Entries keep their registration order, which is the order tools are
/// later aggregated in. The lock is held while a client is being created.
#[derive(Default)]
pub struct ClientCache {
    entries: Mutex<Vec<(BackendKey, Arc<dyn ToolClient>)>>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached client for `key`, creating it with `connect` if absent
    pub async fn get_or_connect<F, Fut>(
        &self,
        key: BackendKey,
        connect: F,
    ) -> AppResult<Arc<dyn ToolClient>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Arc<dyn ToolClient>>>,
    {
        let mut entries = self.entries.lock().await;

        if let Some((_, client)) = entries.iter().find(|(k, _)| *k == key) {
            debug!(backend = %key, "Reusing cached tool client");
            return Ok(client.clone());
        }

        let client = connect().await?;
        entries.push((key, client.clone()));
        Ok(client)
    }

    /// Every live client, in registration order
    pub async fn clients(&self) -> Vec<Arc<dyn ToolClient>> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(_, client)| client.clone())
            .collect()
    }

    /// Drop every client (terminating their server processes)
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

/// Source of tool clients used by the watchdog and the agents
#[async_trait]
pub trait ToolBackends: Send + Sync {
    /// Client for the Azure backend scoped to the given coordinates
    ///
    /// Connecting stops with `Cancelled` once `cancel` fires.
    async fn azure_client(
        &self,
        subscription_id: &str,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Arc<dyn ToolClient>>;

    /// Client for the GitHub backend
    async fn github_client(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Arc<dyn ToolClient>>;

    /// Every currently connected client, in registration order
    async fn active_clients(&self) -> Vec<Arc<dyn ToolClient>>;
}

/// Tool backends served by MCP servers launched through `npx`
pub struct McpService {
    cache: ClientCache,
    npx_command: String,
}

impl McpService {
    /// Create a service launching servers with the given `npx` command
    pub fn new(npx_command: impl Into<String>) -> Self {
        Self {
            cache: ClientCache::new(),
            npx_command: npx_command.into(),
        }
    }

    /// Transport options for the Azure MCP server
    pub fn azure_transport_options(
        &self,
        subscription_id: &str,
        tenant_id: &str,
    ) -> StdioTransportOptions {
        let mut env = BTreeMap::new();
        env.insert("AZURE_SUBSCRIPTION_ID".to_string(), subscription_id.to_string());
        env.insert("AZURE_TENANT_ID".to_string(), tenant_id.to_string());

        StdioTransportOptions {
            command: self.npx_command.clone(),
            args: vec![
                "-y".to_string(),
                "@azure/mcp".to_string(),
                "server".to_string(),
                "start".to_string(),
            ],
            env,
        }
    }

    /// Transport options for the GitHub MCP server
    pub fn github_transport_options(&self, token: &str) -> StdioTransportOptions {
        let mut env = BTreeMap::new();
        env.insert("GITHUB_PERSONAL_ACCESS_TOKEN".to_string(), token.to_string());

        StdioTransportOptions {
            command: self.npx_command.clone(),
            args: vec![
                "-y".to_string(),
                "@modelcontextprotocol/server-github".to_string(),
            ],
            env,
        }
    }

    /// Shut down every server process
    pub async fn shutdown(&self) {
        self.cache.clear().await;
        info!("Closed all MCP connections");
    }

    async fn connect(
        &self,
        key: BackendKey,
        options: StdioTransportOptions,
        cancel: &CancellationToken,
    ) -> AppResult<Arc<dyn ToolClient>> {
        self.cache
            .get_or_connect(key.clone(), || async move {
                let name = key.to_string();
                let client = StdioMcpClient::spawn(&name, &options, cancel).await?;
                info!(backend = %name, "Connected to MCP server");
                Ok(Arc::new(client) as Arc<dyn ToolClient>)
            })
            .await
    }
}

impl Default for McpService {
    fn default() -> Self {
        Self::new(default_npx_command())
    }
}

#[async_trait]
impl ToolBackends for McpService {
    #[instrument(skip(self, cancel))]
    async fn azure_client(
        &self,
        subscription_id: &str,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Arc<dyn ToolClient>> {
        let options = self.azure_transport_options(subscription_id, tenant_id);
        self.connect(BackendKey::Azure, options, cancel).await
    }

    #[instrument(skip(self, token, cancel))]
    async fn github_client(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Arc<dyn ToolClient>> {
        let options = self.github_transport_options(token);
        self.connect(BackendKey::GitHub, options, cancel).await
    }

    async fn active_clients(&self) -> Vec<Arc<dyn ToolClient>> {
        self.cache.clients().await
    }
}
