//! History windowing.
//!
//! Sessions grow without bound; the prompt does not. The window keeps the
//! most recent turns that fit both a turn count and a token budget.
//!
//! Heuristic: 1 token ≈ 4 characters, plus 4 tokens of per-turn overhead
//! for role names and delimiters.

use medintake_config::IntakeConfig;
use medintake_core::message::{Role, Turn};

const TURN_OVERHEAD: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

pub fn estimate_turn_tokens(turn: &Turn) -> usize {
    TURN_OVERHEAD
        + estimate_tokens(&turn.content)
        + turn
            .tool_calls
            .iter()
            .map(|c| estimate_tokens(&c.name) + estimate_tokens(&c.arguments))
            .sum::<usize>()
}

pub fn estimate_turns_tokens(turns: &[Turn]) -> usize {
    turns.iter().map(estimate_turn_tokens).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub max_turns: usize,
    pub token_budget: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::from_config(&IntakeConfig::default())
    }
}

impl HistoryWindow {
    pub fn new(max_turns: usize, token_budget: usize) -> Self {
        Self { max_turns, token_budget }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(config.history_window, config.history_token_budget)
    }

    /// The suffix of `history` that goes into the prompt.
    ///
    /// Never starts with a tool result: its call was cut off, and a
    /// result without its call is rejected by chat endpoints.
    pub fn apply<'a>(&self, history: &'a [Turn]) -> &'a [Turn] {
        let mut start = history.len().saturating_sub(self.max_turns);
        let mut tokens = estimate_turns_tokens(&history[start..]);

        while start < history.len() && tokens > self.token_budget {
            tokens -= estimate_turn_tokens(&history[start]);
            start += 1;
        }
        while start < history.len() && history[start].role == Role::ToolResult {
            start += 1;
        }

        &history[start..]
    }
}
