use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use embuddy_core::{DataProcessor, Session};

use crate::error::{ServerError, ServerResult};

/// Shared state for all request handlers.
///
/// Sessions are keyed by id and live in memory only. Each handler takes the
/// map lock once, so a session's two sets are always read and reset together.
#[derive(Clone, Debug)]
pub struct AppState {
    pub processor: Arc<DataProcessor>,
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl AppState {
    pub fn new(processor: DataProcessor) -> Self {
        AppState {
            processor: Arc::new(processor),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fails with `SessionNotFound` unless `session_id` exists.
    pub async fn ensure_session(&self, session_id: &str) -> ServerResult<()> {
        if self.sessions.read().await.contains_key(session_id) {
            Ok(())
        } else {
            Err(ServerError::SessionNotFound(session_id.to_string()))
        }
    }
}
