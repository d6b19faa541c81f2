//! Session routing state.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which behavior handles the current turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Initial state; the next message is classified
    #[default]
    Triage,
    /// Symptom interview with clinical tools
    Clinical,
    /// Scheduling, billing and other logistics
    Admin,
    /// Fixed escalation, no model call and no tools
    Emergency,
    /// Structured summary generation (terminal for the turn)
    Summarizing,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Triage => "triage",
            Mode::Clinical => "clinical",
            Mode::Admin => "admin",
            Mode::Emergency => "emergency",
            Mode::Summarizing => "summarizing",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "triage" => Ok(Mode::Triage),
            "clinical" => Ok(Mode::Clinical),
            "admin" => Ok(Mode::Admin),
            "emergency" => Ok(Mode::Emergency),
            "summarizing" => Ok(Mode::Summarizing),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageStatus {
    #[default]
    Unknown,
    Stable,
    /// Set on any emergency match; never cleared within a session
    Critical,
}

/// Per-session routing state, owned by whoever owns the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_mode: Mode,
    pub triage_status: TriageStatus,
}

impl SessionState {
    pub fn is_critical(&self) -> bool {
        self.triage_status == TriageStatus::Critical
    }
}

/// Who is typing. Selects system instructions only; not a security boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorRole {
    #[default]
    Patient,
    Doctor,
}

impl FromStr for OperatorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(OperatorRole::Patient),
            "doctor" => Ok(OperatorRole::Doctor),
            other => Err(format!("unknown role '{other}' (expected patient or doctor)")),
        }
    }
}

impl std::fmt::Display for OperatorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorRole::Patient => f.write_str("patient"),
            OperatorRole::Doctor => f.write_str("doctor"),
        }
    }
}
