//! Multi-turn session driver.
//!
//! Reads the session's history, routes the turn, runs the mode's
//! behavior, and appends the new turns once the turn is complete.

use std::sync::Arc;
use chrono::Utc;
use medintake_core::event::{DomainEvent, EventBus};
use medintake_core::history::TurnStore;
use medintake_core::message::{Role, SessionId, Turn};
use medintake_core::session::{Mode, OperatorRole, SessionState};
use medintake_core::tool::ToolResult;
use medintake_tools::{REPORT_MARKER, tools_for_mode};
use tracing::{info, warn};
use crate::controller::{ConversationController, TurnRequest};
use crate::instructions::{ESCALATION_REPLY, SUMMARY_NOTICE};
use crate::router::{MODE_METADATA, Router};
use crate::summary::{ClinicalSummary, SummaryGenerator};

/// One intake conversation. The caller owns it; concurrent turns on the
/// same session must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct IntakeSession {
    pub id: SessionId,
    pub role: OperatorRole,
    pub state: SessionState,
}

impl IntakeSession {
    pub fn new(role: OperatorRole) -> Self {
        Self::with_id(SessionId::new(), role)
    }

    pub fn with_id(id: SessionId, role: OperatorRole) -> Self {
        Self {
            id,
            role,
            state: SessionState::default(),
        }
    }
}

/// A user turn plus optional preprocessed context.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub message: String,
    pub context: Option<String>,
}

impl TurnInput {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct TurnReply {
    pub text: String,
    /// The mode that handled the turn
    pub mode: Mode,
    /// Present when the turn finished the interview
    pub summary: Option<ClinicalSummary>,
    /// Report references produced by tools this turn
    pub report_refs: Vec<String>,
    pub degraded: bool,
    /// False when the turns could not be written to the store
    pub saved: bool,
}

pub struct IntakeAgent {
    controller: ConversationController,
    summarizer: SummaryGenerator,
    router: Router,
    store: Arc<dyn TurnStore>,
    event_bus: Arc<EventBus>,
}

impl IntakeAgent {
    pub fn new(
        controller: ConversationController,
        summarizer: SummaryGenerator,
        store: Arc<dyn TurnStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            controller,
            summarizer,
            router: Router::new(),
            store,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub async fn history(&self, session: &IntakeSession) -> Vec<Turn> {
        match self.store.read_turns(&session.id).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Failed to read history, continuing without it");
                self.publish_error("read_history", e.to_string());
                Vec::new()
            }
        }
    }

    /// Handle one user turn. Always produces a reply.
    pub async fn handle_turn(&self, session: &mut IntakeSession, input: TurnInput) -> TurnReply {
        let history = self.history(session).await;
        if session.state == SessionState::default() && !history.is_empty() {
            session.state = self.router.restore(&history);
            info!(
                session_id = %session.id,
                mode = %session.state.current_mode,
                critical = session.state.is_critical(),
                "Restored session state from history"
            );
        }

        self.event_bus.publish(DomainEvent::TurnReceived {
            session_id: session.id.to_string(),
            content_chars: input.message.chars().count(),
            has_context: input.context.is_some(),
            timestamp: Utc::now(),
        });

        let previous = session.state;
        let mode = self.router.route(&mut session.state, &input.message);
        self.publish_transition(session, previous.current_mode, mode);

        let mut user_turn = Turn::user(input.message.clone()).with_metadata(MODE_METADATA, serde_json::json!(mode.as_str()));
        if input.context.is_some() {
            user_turn = user_turn.with_metadata("has_context", serde_json::json!(true));
        }

        if mode == Mode::Emergency {
            if !previous.is_critical() {
                self.event_bus.publish(DomainEvent::EmergencyEscalated {
                    session_id: session.id.to_string(),
                    timestamp: Utc::now(),
                });
            }
            let reply = Turn::assistant(ESCALATION_REPLY).with_metadata(MODE_METADATA, serde_json::json!(mode.as_str()));
            let saved = self.persist(session, vec![user_turn, reply]).await;
            return TurnReply {
                text: ESCALATION_REPLY.to_string(),
                mode,
                summary: None,
                report_refs: Vec::new(),
                degraded: false,
                saved,
            };
        }

        let outcome = self
            .controller
            .respond(TurnRequest {
                history: &history,
                message: &input.message,
                context: input.context.as_deref(),
                role: session.role,
                mode,
                tools: tools_for_mode(mode),
            })
            .await;

        let report_refs = report_refs(&outcome.tool_results);
        let mut turns = vec![user_turn];
        turns.extend(outcome.turns);

        let marker = self.controller.completion_marker();
        if outcome.degraded || !outcome.reply.contains(marker) {
            let saved = self.persist(session, turns).await;
            return TurnReply {
                text: outcome.reply,
                mode,
                summary: None,
                report_refs,
                degraded: outcome.degraded,
                saved,
            };
        }

        // ── Completion marker: strip it and summarize ──
        let mut text = outcome.reply.replace(marker, "").trim().to_string();
        if text.is_empty() {
            text = SUMMARY_NOTICE.to_string();
        }
        if let Some(last) = turns.iter_mut().rev().find(|t| t.role == Role::Assistant) {
            last.content = text.clone();
            last.metadata
                .insert(MODE_METADATA.to_string(), serde_json::json!(Mode::Summarizing.as_str()));
        }

        session.state.current_mode = Mode::Summarizing;
        self.publish_transition(session, mode, Mode::Summarizing);

        let mut transcript = history;
        transcript.extend(turns.iter().cloned());
        let summary = self.summarizer.generate(&transcript).await;
        info!(session_id = %session.id, fallback = summary.is_fallback(), "Interview complete");

        let saved = self.persist(session, turns).await;
        TurnReply {
            text,
            mode: Mode::Summarizing,
            summary: Some(summary),
            report_refs,
            degraded: false,
            saved,
        }
    }

    /// Summarize the session on request, whatever its mode.
    pub async fn summarize(&self, session: &mut IntakeSession) -> ClinicalSummary {
        let history = self.history(session).await;
        let previous = session.state.current_mode;
        session.state.current_mode = Mode::Summarizing;
        self.publish_transition(session, previous, Mode::Summarizing);
        self.summarizer.generate(&history).await
    }

    async fn persist(&self, session: &IntakeSession, turns: Vec<Turn>) -> bool {
        match self.store.append_turns(&session.id, &turns).await {
            Ok(()) => true,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Failed to persist turns");
                self.publish_error("append_turns", e.to_string());
                false
            }
        }
    }

    fn publish_transition(&self, session: &IntakeSession, from: Mode, to: Mode) {
        if from != to {
            self.event_bus.publish(DomainEvent::ModeChanged {
                session_id: session.id.to_string(),
                from,
                to,
                timestamp: Utc::now(),
            });
        }
    }

    fn publish_error(&self, context: &str, error_message: String) {
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message,
            timestamp: Utc::now(),
        });
    }
}

/// References from successful report tool results.
fn report_refs(results: &[ToolResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.content.strip_prefix(REPORT_MARKER))
        .map(|rest| rest.trim().to_string())
        .collect()
}
