//! Mode routing.
//!
//! Keyword classification decides which behavior handles a turn. An
//! emergency match always wins, from any mode, and marks the session
//! critical for the rest of its life.

use medintake_core::message::Turn;
use medintake_core::session::{Mode, SessionState, TriageStatus};
use tracing::{info, warn};

pub const EMERGENCY_PHRASES: &[&str] = &[
    "chest pain",
    "can't breathe",
    "cannot breathe",
    "can not breathe",
    "fainted",
    "blood",
    "unconscious",
    "seizure",
    "stroke",
    "suicidal",
    "heart attack",
];

pub const ADMIN_PHRASES: &[&str] = &[
    "appointment",
    "schedule",
    "bill",
    "admin",
    "booking",
    "reschedule",
    "invoice",
    "payment",
];

fn normalize(message: &str) -> String {
    message.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// Classify a message on its own. Emergency beats admin; no match is clinical.
pub fn classify(message: &str) -> Mode {
    let text = normalize(message);
    if EMERGENCY_PHRASES.iter().any(|p| text.contains(p)) {
        Mode::Emergency
    } else if ADMIN_PHRASES.iter().any(|p| text.contains(p)) {
        Mode::Admin
    } else {
        Mode::Clinical
    }
}

/// Turn metadata key holding the mode that handled the turn.
pub const MODE_METADATA: &str = "mode";

/// Drives [`SessionState`] from one message to the next.
#[derive(Debug, Default, Clone, Copy)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    /// Pick the mode for this turn and update `state`.
    ///
    /// Triage (and a finished summary) classify afresh. Clinical and admin
    /// keep their mode. Critical sessions stay in emergency.
    pub fn route(&self, state: &mut SessionState, message: &str) -> Mode {
        let classified = classify(message);

        let next = if classified == Mode::Emergency || state.is_critical() {
            if !state.is_critical() {
                warn!("Emergency phrase matched, escalating session");
            }
            state.triage_status = TriageStatus::Critical;
            Mode::Emergency
        } else {
            match state.current_mode {
                Mode::Triage | Mode::Summarizing | Mode::Emergency => {
                    state.triage_status = TriageStatus::Stable;
                    classified
                }
                mode @ (Mode::Clinical | Mode::Admin) => mode,
            }
        };

        if next != state.current_mode {
            info!(from = %state.current_mode, to = %next, "Mode transition");
        }
        state.current_mode = next;
        next
    }

    /// Rebuild routing state for a resumed session from its stored turns.
    ///
    /// Any turn handled in emergency makes the session critical. Otherwise
    /// the last recorded mode carries over.
    pub fn restore(&self, history: &[Turn]) -> SessionState {
        let mut state = SessionState::default();
        let recorded = history
            .iter()
            .filter_map(|t| t.metadata.get(MODE_METADATA)?.as_str()?.parse::<Mode>().ok());
        for mode in recorded {
            if mode == Mode::Emergency || state.is_critical() {
                state.triage_status = TriageStatus::Critical;
                state.current_mode = Mode::Emergency;
            } else {
                state.triage_status = TriageStatus::Stable;
                state.current_mode = mode;
            }
        }
        state
    }
}
