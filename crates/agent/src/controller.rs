//! The conversation controller: one turn, at most two model calls.
//!
//! 1. **Build the prompt** (system instructions + file context + windowed history + user turn)
//! 2. **Call the model** with the mode's tools offered
//! 3. **If tool calls**: dispatch each in order through the registry, which
//!    validates before executing, and append every result
//! 4. **Call the model once more** with no tools; that reply is final
//!
//! Transport failures on either call end the turn with a fixed reply.

use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::Utc;
use medintake_config::AppConfig;
use medintake_core::error::ProviderError;
use medintake_core::event::{DomainEvent, EventBus};
use medintake_core::message::Turn;
use medintake_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use medintake_core::session::{Mode, OperatorRole};
use medintake_core::tool::{ToolCall, ToolKind, ToolOutcome, ToolRegistry, ToolResult};
use tracing::{debug, info, warn};
use crate::instructions::{self, FALLBACK_REPLY};
use crate::window::HistoryWindow;

/// Everything the controller needs for one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest<'a> {
    /// Prior turns, oldest first
    pub history: &'a [Turn],
    pub message: &'a str,
    /// Preprocessed file or audio context for this turn only
    pub context: Option<&'a str>,
    pub role: OperatorRole,
    pub mode: Mode,
    /// Tools the model is offered and may run this turn
    pub tools: &'a [ToolKind],
}

/// What a turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The user-visible reply
    pub reply: String,
    /// Assistant and tool turns to persist after the user turn
    pub turns: Vec<Turn>,
    pub tool_results: Vec<ToolResult>,
    pub model_calls: u32,
    /// True when a transport failure replaced the reply
    pub degraded: bool,
}

pub struct ConversationController {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    window: HistoryWindow,
    model_timeout: Duration,
    completion_marker: String,
    event_bus: Arc<EventBus>,
}

impl ConversationController {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
            tools,
            window: HistoryWindow::default(),
            model_timeout: Duration::from_secs(60),
            completion_marker: "SUMMARY_READY".into(),
            event_bus,
        }
    }

    /// Model, sampling, window and timeout settings from the config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
        config: &AppConfig,
    ) -> Self {
        Self::new(provider, config.default_model.clone(), tools, event_bus)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_window(HistoryWindow::from_config(&config.intake))
            .with_timeout(Duration::from_secs(config.intake.model_timeout_secs))
            .with_completion_marker(config.intake.completion_marker.clone())
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_window(mut self, window: HistoryWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_completion_marker(mut self, marker: impl Into<String>) -> Self {
        self.completion_marker = marker.into();
        self
    }

    pub fn completion_marker(&self) -> &str {
        &self.completion_marker
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_prompt(&self, request: &TurnRequest<'_>) -> Vec<Turn> {
        let mut messages = vec![Turn::system(instructions::system_instructions(
            request.role,
            request.mode,
            &self.completion_marker,
        ))];
        if let Some(context) = request.context.filter(|c| !c.trim().is_empty()) {
            messages.push(Turn::system(instructions::file_context(context)));
        }
        messages.extend_from_slice(self.window.apply(request.history));
        messages.push(Turn::user(request.message));
        messages
    }

    /// One model invocation, bounded by the configured timeout.
    async fn invoke(&self, messages: Vec<Turn>, tools: Vec<ToolDefinition>) -> Result<ProviderResponse, ProviderError> {
        let mut request = ProviderRequest::new(self.model.clone(), messages)
            .with_temperature(self.temperature)
            .with_tools(tools);
        request.max_tokens = self.max_tokens;

        match tokio::time::timeout(self.model_timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "no response from {} within {}s",
                self.provider.name(),
                self.model_timeout.as_secs()
            ))),
        }
    }

    /// Produce the reply for one user turn.
    ///
    /// Never fails: transport errors become [`FALLBACK_REPLY`], tool
    /// failures and rejections become tool results the model sees.
    pub async fn respond(&self, request: TurnRequest<'_>) -> TurnOutcome {
        info!(
            mode = %request.mode,
            role = %request.role,
            history = request.history.len(),
            has_context = request.context.is_some(),
            "Processing turn"
        );

        let mut messages = self.build_prompt(&request);
        let definitions = self.tools.definitions_for(request.tools);
        let mut tokens_used = 0;

        // ── Invocation 1 ──
        let first = match self.invoke(messages.clone(), definitions).await {
            Ok(response) => response,
            Err(e) => return self.degraded("model_call_1", e, Vec::new(), Vec::new(), 1),
        };
        tokens_used += first.usage.as_ref().map_or(0, |u| u.total_tokens);

        if !first.message.has_tool_calls() {
            let mut message = first.message;
            if message.content.trim().is_empty() {
                warn!("Model returned an empty reply");
                message.content = FALLBACK_REPLY.to_string();
            }
            let reply = message.content.clone();
            self.publish_response(&first.model, 1, tokens_used, false);
            return TurnOutcome {
                reply,
                turns: vec![message],
                tool_results: Vec::new(),
                model_calls: 1,
                degraded: false,
            };
        }

        // ── Tool dispatch, in the order returned ──
        let assistant = first.message;
        debug!(tool_count = assistant.tool_calls.len(), "Executing tool calls");
        messages.push(assistant.clone());
        let mut turns = vec![assistant.clone()];
        let mut tool_results = Vec::with_capacity(assistant.tool_calls.len());

        for wire in &assistant.tool_calls {
            let call = ToolCall::from_wire(wire);
            let result = self.dispatch(&call, request.tools).await;
            let turn = Turn::tool_result(&call.id, &result.content);
            messages.push(turn.clone());
            turns.push(turn);
            tool_results.push(result);
        }

        // ── Invocation 2: no tools offered, tool calls ignored ──
        let second = match self.invoke(messages, Vec::new()).await {
            Ok(response) => response,
            Err(e) => return self.degraded("model_call_2", e, turns, tool_results, 2),
        };
        tokens_used += second.usage.as_ref().map_or(0, |u| u.total_tokens);

        if second.message.has_tool_calls() {
            warn!(
                ignored = second.message.tool_calls.len(),
                "Second model call requested tools, ignoring"
            );
        }
        let reply = if second.message.content.trim().is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            second.message.content
        };
        turns.push(Turn::assistant(reply.clone()));
        self.publish_response(&second.model, 2, tokens_used, false);

        TurnOutcome {
            reply,
            turns,
            tool_results,
            model_calls: 2,
            degraded: false,
        }
    }

    /// Run one call through the registry and report what happened.
    async fn dispatch(&self, call: &ToolCall, allowed: &[ToolKind]) -> ToolResult {
        let start = Instant::now();
        let outcome = self.tools.dispatch(call, allowed).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            ToolOutcome::Executed(result) => {
                debug!(tool = %call.name, call_id = %call.id, duration_ms, "Tool executed");
                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success: result.success,
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
            ToolOutcome::Rejected(verdict) => {
                info!(tool = %call.name, missing = ?verdict.missing_fields, "Tool call rejected by validation");
                self.event_bus.publish(DomainEvent::ToolRejected {
                    tool_name: call.name.clone(),
                    missing_fields: verdict.missing_fields.clone(),
                    timestamp: Utc::now(),
                });
            }
            ToolOutcome::Failed(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success: false,
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
        }

        outcome.into_result(&call.id)
    }

    fn degraded(
        &self,
        stage: &str,
        error: ProviderError,
        mut turns: Vec<Turn>,
        tool_results: Vec<ToolResult>,
        model_calls: u32,
    ) -> TurnOutcome {
        warn!(stage, error = %error, "Model call failed, returning fallback reply");
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: stage.to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
        self.publish_response(&self.model, model_calls, 0, true);

        turns.push(Turn::assistant(FALLBACK_REPLY).with_metadata("degraded", serde_json::json!(true)));
        TurnOutcome {
            reply: FALLBACK_REPLY.to_string(),
            turns,
            tool_results,
            model_calls,
            degraded: true,
        }
    }

    fn publish_response(&self, model: &str, model_calls: u32, tokens_used: u32, degraded: bool) {
        self.event_bus.publish(DomainEvent::ResponseGenerated {
            model: model.to_string(),
            model_calls,
            tokens_used,
            degraded,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use async_trait::async_trait;
    use medintake_core::error::ToolError;
    use medintake_core::message::Role;
    use medintake_core::tool::{TOOL_ERROR_MARKER, Tool};
    use medintake_tools::{CLINICAL_TOOLS, JsonReportRenderer, default_registry};
    use serde_json::json;

    fn registry(dir: &std::path::Path) -> Arc<ToolRegistry> {
        Arc::new(default_registry(Arc::new(JsonReportRenderer::new(dir, "/static/reports"))))
    }

    fn controller(provider: Arc<ScriptedProvider>, tools: Arc<ToolRegistry>) -> ConversationController {
        ConversationController::new(provider, "mock-model", tools, Arc::new(EventBus::default()))
    }

    fn request<'a>(history: &'a [Turn], message: &'a str) -> TurnRequest<'a> {
        TurnRequest {
            history,
            message,
            context: None,
            role: OperatorRole::Patient,
            mode: Mode::Clinical,
            tools: &CLINICAL_TOOLS,
        }
    }

    #[tokio::test]
    async fn text_reply_is_final_after_one_call() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::single_text("How long have you had the fever?"));
        let c = controller(provider.clone(), registry(dir.path()));

        let outcome = c.respond(request(&[], "I have a fever")).await;

        assert_eq!(outcome.reply, "How long have you had the fever?");
        assert_eq!(outcome.model_calls, 1);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(outcome.turns.len(), 1);
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn empty_first_reply_becomes_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::single_text("  "));
        let c = controller(provider.clone(), registry(dir.path()));

        let outcome = c.respond(request(&[], "I have a headache")).await;

        assert_eq!(outcome.reply, FALLBACK_REPLY);
        assert_eq!(outcome.turns[0].content, FALLBACK_REPLY);
        assert_eq!(outcome.model_calls, 1);
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn prompt_order_is_system_context_history_user() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::single_text("Noted."));
        let c = controller(provider.clone(), registry(dir.path()));
        let history = vec![Turn::user("Hello"), Turn::assistant("Hi, what brings you in?")];

        let mut req = request(&history, "Here is my report");
        req.context = Some("[SYSTEM: PDF Content]:\nHb 11.2");
        c.respond(req).await;

        let sent = &provider.requests()[0];
        let roles: Vec<Role> = sent.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::System, Role::User, Role::Assistant, Role::User]);
        assert!(sent.messages[1].content.starts_with("SYSTEM NOTICE: User file analysis:"));
        assert_eq!(sent.messages[4].content, "Here is my report");
        assert_eq!(sent.tools.len(), 4);
    }

    #[tokio::test]
    async fn rejected_report_is_fed_back_and_nothing_written() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::tool_then_answer(
            vec![make_tool_call("generate_hospital_pdf", json!({"patient_name": "", "age": "29", "gender": "Female"}))],
            "Could you tell me the patient's name?",
        ));
        let c = controller(provider.clone(), registry(dir.path()));

        let outcome = c.respond(request(&[], "Make a report")).await;

        assert_eq!(outcome.model_calls, 2);
        assert_eq!(outcome.reply, "Could you tell me the patient's name?");
        let result = &outcome.tool_results[0];
        assert!(!result.success);
        assert!(result.content.starts_with("SYSTEM_REJECTION:"));
        assert!(result.content.contains("Patient Name"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // the second call sees the rejection and is offered no tools
        let second = &provider.requests()[1];
        assert!(second.tools.is_empty());
        let last = second.messages.last().unwrap();
        assert_eq!(last.role, Role::ToolResult);
        assert_eq!(last.tool_call_id.as_deref(), Some("call_generate_hospital_pdf"));
    }

    #[tokio::test]
    async fn accepted_report_is_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::tool_then_answer(
            vec![make_tool_call(
                "generate_hospital_pdf",
                json!({"patient_name": "asha rao", "age": "34", "gender": "female", "medications": "metformin, lisinopril"}),
            )],
            "Your report is ready.",
        ));
        let c = controller(provider, registry(dir.path()));

        let outcome = c.respond(request(&[], "Report please")).await;

        assert!(outcome.tool_results[0].success);
        assert!(outcome.tool_results[0].content.starts_with("REPORT_GENERATED_AT: /static/reports/Report_AshaRao_"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn every_call_gets_exactly_one_result_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::tool_then_answer(
            vec![
                make_tool_call("search_patient_records", json!({"query_name": "John Doe"})),
                make_tool_call("invent_diagnosis", json!({})),
                make_tool_call("check_drug_interaction", json!({"drug_a": "aspirin", "drug_b": "warfarin"})),
            ],
            "Aspirin and warfarin together raise bleeding risk.",
        ));
        let c = controller(provider.clone(), registry(dir.path()));

        let outcome = c.respond(request(&[], "I take aspirin and warfarin")).await;

        let ids: Vec<&str> = outcome.tool_results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["call_search_patient_records", "call_invent_diagnosis", "call_check_drug_interaction"]);
        assert!(outcome.tool_results[1].content.starts_with(TOOL_ERROR_MARKER));
        assert!(outcome.tool_results[2].content.starts_with("CRITICAL"));
        // assistant + 3 tool results + final assistant
        assert_eq!(outcome.turns.len(), 5);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn at_most_two_model_calls() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(make_tool_call_response(
                vec![make_tool_call("scan_uploaded_document", json!({"doc_type": "lab report"}))],
                "",
            )),
            Ok(make_tool_call_response(
                vec![make_tool_call("scan_uploaded_document", json!({"doc_type": "lab report"}))],
                "Your CBC shows a raised white cell count.",
            )),
        ]));
        let c = controller(provider.clone(), registry(dir.path()));

        let outcome = c.respond(request(&[], "I uploaded my labs")).await;

        assert_eq!(provider.call_count(), 2);
        assert_eq!(outcome.model_calls, 2);
        assert_eq!(outcome.tool_results.len(), 1);
        assert_eq!(outcome.reply, "Your CBC shows a raised white cell count.");
        assert!(!outcome.turns.last().unwrap().has_tool_calls());
    }

    #[tokio::test]
    async fn tool_outside_mode_is_not_executed() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::tool_then_answer(
            vec![make_tool_call("schedule_appointment", json!({"department": "Cardiology"}))],
            "Let me ask the front desk.",
        ));
        let c = controller(provider, registry(dir.path()));

        let outcome = c.respond(request(&[], "Book me in")).await;
        assert!(outcome.tool_results[0].content.contains("not available in this mode"));
    }

    struct ExplodingTool;

    #[async_trait]
    impl Tool for ExplodingTool {
        fn kind(&self) -> ToolKind {
            ToolKind::SearchPatientRecords
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "search_patient_records".into(),
                reason: "database offline".into(),
            })
        }
    }

    #[tokio::test]
    async fn tool_failure_becomes_error_result_and_second_call_proceeds() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(ExplodingTool));
        let provider = Arc::new(ScriptedProvider::tool_then_answer(
            vec![make_tool_call("search_patient_records", json!({"query_name": "Asha Rao"}))],
            "I couldn't reach the records system, let's continue.",
        ));
        let c = controller(provider.clone(), Arc::new(tools));

        let outcome = c.respond(request(&[], "Check my history")).await;

        assert!(outcome.tool_results[0].content.starts_with(TOOL_ERROR_MARKER));
        assert!(outcome.tool_results[0].content.contains("database offline"));
        assert_eq!(provider.call_count(), 2);
        assert_eq!(outcome.reply, "I couldn't reach the records system, let's continue.");
    }

    #[tokio::test]
    async fn transport_failure_returns_fallback_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::RateLimited { retry_after_secs: 5 })]));
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let c = ConversationController::new(provider.clone(), "mock-model", registry(dir.path()), bus);

        let outcome = c.respond(request(&[], "Hello")).await;

        assert_eq!(outcome.reply, FALLBACK_REPLY);
        assert!(outcome.degraded);
        assert_eq!(provider.call_count(), 1);
        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::ErrorOccurred { context, .. } => assert_eq!(context, "model_call_1"),
            other => panic!("expected ErrorOccurred, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_call_failure_keeps_tool_turns() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(make_tool_call_response(
                vec![make_tool_call("check_drug_interaction", json!({"drug_a": "ibuprofen", "drug_b": "lisinopril"}))],
                "",
            )),
            Err(ProviderError::Network("connection reset".into())),
        ]));
        let c = controller(provider, registry(dir.path()));

        let outcome = c.respond(request(&[], "Can I take ibuprofen?")).await;

        assert!(outcome.degraded);
        assert_eq!(outcome.reply, FALLBACK_REPLY);
        assert_eq!(outcome.tool_results.len(), 1);
        assert_eq!(outcome.turns.len(), 3);
    }

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }
        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(make_text_response("too late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_transport_failure() {
        let dir = tempfile::tempdir().unwrap();
        let c = ConversationController::new(Arc::new(SlowProvider), "m", registry(dir.path()), Arc::new(EventBus::default()))
            .with_timeout(Duration::from_secs(5));

        let outcome = c.respond(request(&[], "Hello")).await;
        assert!(outcome.degraded);
        assert_eq!(outcome.reply, FALLBACK_REPLY);
    }
}
