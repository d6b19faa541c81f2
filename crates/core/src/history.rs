//! Turn history trait — where a session's dialogue lives between turns.
//!
//! Append-only from the controller's point of view. Turns are appended
//! after the controller returns; concurrent turns for the same session
//! get no ordering guarantee beyond what the backend provides.

use async_trait::async_trait;
use crate::error::HistoryError;
use crate::message::{SessionId, Turn};

#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Backend name for logs and `doctor` output.
    fn name(&self) -> &str;

    /// Append turns to the end of a session's history, in order.
    async fn append_turns(&self, session: &SessionId, turns: &[Turn]) -> Result<(), HistoryError>;

    /// All turns of a session, oldest first. Unknown sessions are empty.
    async fn read_turns(&self, session: &SessionId) -> Result<Vec<Turn>, HistoryError>;

    /// Forget a session entirely.
    async fn clear(&self, session: &SessionId) -> Result<(), HistoryError>;
}
