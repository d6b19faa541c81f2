//! File-based turn store — persistent JSON-lines storage.
//!
//! One file per session, one JSON-encoded `Turn` per line. Appends are
//! written as new lines; existing lines are never rewritten.
//!
//! Storage location: `~/.medintake/sessions/<session_id>.jsonl`

use async_trait::async_trait;
use medintake_core::error::HistoryError;
use medintake_core::history::TurnStore;
use medintake_core::message::{SessionId, Turn};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub struct FileTurnStore {
    dir: PathBuf,
}

impl FileTurnStore {
    /// Store session files under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Session IDs become file names, so only a safe alphabet is allowed.
    fn session_path(&self, session: &SessionId) -> Result<PathBuf, HistoryError> {
        if !session.is_valid() {
            return Err(HistoryError::Storage(format!("invalid session id: {:?}", session.as_str())));
        }
        Ok(self.dir.join(format!("{}.jsonl", session.as_str())))
    }

    fn parse_lines(session: &SessionId, content: &str) -> Vec<Turn> {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Turn>(line) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(session_id = %session, error = %e, "Skipping corrupted turn");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl TurnStore for FileTurnStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append_turns(&self, session: &SessionId, turns: &[Turn]) -> Result<(), HistoryError> {
        if turns.is_empty() {
            return Ok(());
        }
        let path = self.session_path(session)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            HistoryError::Storage(format!("Failed to create history directory: {e}"))
        })?;

        let mut content = String::new();
        for turn in turns {
            let line = serde_json::to_string(turn)
                .map_err(|e| HistoryError::Storage(format!("Failed to serialize turn: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open {}: {e}", path.display())))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to append turns: {e}")))?;
        file.flush()
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to flush turns: {e}")))?;

        debug!(session_id = %session, count = turns.len(), "Appended turns");
        Ok(())
    }

    async fn read_turns(&self, session: &SessionId) -> Result<Vec<Turn>, HistoryError> {
        let path = self.session_path(session)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(HistoryError::Corrupted {
                    session_id: session.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        Ok(Self::parse_lines(session, &content))
    }

    async fn clear(&self, session: &SessionId) -> Result<(), HistoryError> {
        let path = self.session_path(session)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HistoryError::Storage(format!("Failed to remove {}: {e}", path.display()))),
        }
    }
}
