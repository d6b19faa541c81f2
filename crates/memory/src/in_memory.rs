//! In-memory turn store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use medintake_core::error::HistoryError;
use medintake_core::history::TurnStore;
use medintake_core::message::{SessionId, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps every session's turns in a Vec behind an `RwLock`.
pub struct InMemoryTurnStore {
    sessions: Arc<RwLock<HashMap<SessionId, Vec<Turn>>>>,
}

impl InMemoryTurnStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of sessions with at least one turn.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemoryTurnStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TurnStore for InMemoryTurnStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append_turns(&self, session: &SessionId, turns: &[Turn]) -> Result<(), HistoryError> {
        if turns.is_empty() {
            return Ok(());
        }
        self.sessions
            .write()
            .await
            .entry(session.clone())
            .or_default()
            .extend_from_slice(turns);
        Ok(())
    }

    async fn read_turns(&self, session: &SessionId) -> Result<Vec<Turn>, HistoryError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, session: &SessionId) -> Result<(), HistoryError> {
        self.sessions.write().await.remove(session);
        Ok(())
    }
}
