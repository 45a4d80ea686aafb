//! Seam for an external search index with an arbitrary record schema.
//!
//! Transport, authentication and TLS live behind [`IndexClient`]; this module
//! only consumes the outcome of each call.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::BuddyResult;
use crate::mapping::FieldMapping;
use crate::processor::{DataProcessor, ProcessedData};
use crate::suggest::{FieldSample, FieldSuggestions};

/// Login credentials for an external index: username/password or an API key.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    Basic { username: String, password: String },
    ApiKey { api_key: String },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic { username: username.into(), password: password.into() }
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Credentials::ApiKey { api_key: key.into() }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::ApiKey { .. } => f.debug_struct("ApiKey").field("api_key", &"<redacted>").finish(),
        }
    }
}

/// A successful client call: the payload plus the client's status message.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientReply<T> {
    pub payload: T,
    pub message: String,
}

impl<T> ClientReply<T> {
    pub fn new(payload: T, message: impl Into<String>) -> Self {
        ClientReply { payload, message: message.into() }
    }
}

/// Client for an external search index. Failures are reported as
/// [`BuddyError::Collaborator`](crate::error::BuddyError::Collaborator)
/// carrying the client's message.
#[async_trait]
pub trait IndexClient: Send + Sync {
    async fn connect(&mut self, url: &str, credentials: Option<&Credentials>) -> BuddyResult<ClientReply<()>>;

    /// Returns sampled values per field path of `index`.
    async fn analyze_fields(&self, index: &str) -> BuddyResult<ClientReply<FieldSample>>;

    async fn fetch(&self, index: &str, limit: usize) -> BuddyResult<ClientReply<Vec<Value>>>;
}

/// Drives an [`IndexClient`] through the processor.
#[derive(Debug)]
pub struct ExternalSource<C> {
    client: C,
    processor: DataProcessor,
}

impl<C: IndexClient> ExternalSource<C> {
    pub fn new(client: C, processor: DataProcessor) -> Self {
        ExternalSource { client, processor }
    }

    pub async fn connect(&mut self, url: &str, credentials: Option<&Credentials>) -> BuddyResult<String> {
        let reply = self.client.connect(url, credentials).await?;
        info!(url, message = %reply.message, "Connected to external index");
        Ok(reply.message)
    }

    /// Ranks candidate fields of `index` for every canonical role.
    pub async fn suggest_fields(&self, index: &str) -> BuddyResult<FieldSuggestions> {
        let reply = self.client.analyze_fields(index).await?;
        info!(index, fields = reply.payload.len(), "Analyzed index fields");
        Ok(self.processor.suggest_from_sample(&reply.payload))
    }

    /// Fetches up to `limit` records (clamped by the processor's config) and
    /// processes them with the confirmed `mapping`. Fetch failures end up in
    /// `ProcessedData::error`.
    pub async fn load(&self, index: &str, mapping: &FieldMapping, limit: Option<usize>) -> ProcessedData {
        let limit = self.processor.config().fetch_limit(limit);
        match self.client.fetch(index, limit).await {
            Ok(reply) => {
                info!(index, limit, fetched = reply.payload.len(), "Fetched records from external index");
                self.processor.process_external(&reply.payload, mapping)
            }
            Err(e) => {
                warn!(index, error = %e, "Fetch from external index failed");
                ProcessedData::failed(&e)
            }
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}
