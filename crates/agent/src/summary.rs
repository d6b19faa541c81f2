//! Structured clinical summary generation.

use std::sync::Arc;
use std::time::Duration;
use medintake_core::message::{Role, Turn};
use medintake_core::provider::{Provider, ProviderRequest};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};
use crate::instructions;

/// Vitals mentioned during the conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vitals {
    pub heart_rate: Option<u32>,
    pub bp_systolic: Option<u32>,
    pub bp_diastolic: Option<u32>,
    pub temp_c: Option<f32>,
}

/// Fixed-schema summary handed to the treating doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalSummary {
    pub patient_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub age: String,
    pub gender: String,
    pub visit_type: String,
    pub chief_complaint: String,
    pub hpi: String,
    #[serde(alias = "detected_vitals")]
    pub vitals: Vitals,
    pub medication_plan: Vec<String>,
    pub follow_up_required: bool,
    pub risk_level: String,
}

impl Default for ClinicalSummary {
    /// The fallback when no summary could be produced. Always asks for follow-up.
    fn default() -> Self {
        Self {
            patient_name: String::new(),
            age: String::new(),
            gender: String::new(),
            visit_type: "Routine".into(),
            chief_complaint: String::new(),
            hpi: String::new(),
            vitals: Vitals::default(),
            medication_plan: Vec::new(),
            follow_up_required: true,
            risk_level: "Unknown".into(),
        }
    }
}

impl ClinicalSummary {
    pub fn is_fallback(&self) -> bool {
        *self == Self::default()
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Parse the first `{` to the last `}` of a model reply.
pub fn parse_summary(text: &str) -> Option<ClinicalSummary> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// One tool-less model call that turns the dialogue into a [`ClinicalSummary`].
pub struct SummaryGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
}

impl SummaryGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Summarize `history`. Any failure yields the default summary.
    pub async fn generate(&self, history: &[Turn]) -> ClinicalSummary {
        let mut messages = vec![Turn::system(instructions::summary_instructions())];
        messages.extend(
            history
                .iter()
                .filter(|t| matches!(t.role, Role::User | Role::Assistant) && !t.content.trim().is_empty())
                .map(|t| {
                    let mut turn = t.clone();
                    turn.tool_calls.clear();
                    turn
                }),
        );
        messages.push(Turn::user("Produce the JSON summary of this consultation now."));

        let request = ProviderRequest::new(self.model.clone(), messages).with_temperature(0.0);
        let response = match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, "Summary generation failed, using fallback");
                return ClinicalSummary::default();
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Summary generation timed out, using fallback");
                return ClinicalSummary::default();
            }
        };

        match parse_summary(&response.message.content) {
            Some(summary) => {
                debug!(risk = %summary.risk_level, "Summary generated");
                summary
            }
            None => {
                warn!(chars = response.message.content.len(), "Unparseable summary, using fallback");
                ClinicalSummary::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use medintake_core::error::ProviderError;

    const REPLY: &str = r#"Here is the summary:
```json
{"patient_name": "Asha Rao", "age": 34, "gender": "Female", "visit_type": "Urgent",
 "chief_complaint": "Fever for 3 days", "hpi": "High-grade fever with chills.",
 "detected_vitals": {"heart_rate": 102, "temp_c": 39.2},
 "medication_plan": ["Paracetamol 500mg"], "follow_up_required": true, "risk_level": "Moderate"}
```"#;

    #[test]
    fn parses_fenced_json_with_numeric_age() {
        let summary = parse_summary(REPLY).unwrap();
        assert_eq!(summary.age, "34");
        assert_eq!(summary.vitals.heart_rate, Some(102));
        assert_eq!(summary.vitals.bp_systolic, None);
        assert_eq!(summary.risk_level, "Moderate");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let summary = parse_summary(r#"{"chief_complaint": "Cough"}"#).unwrap();
        assert_eq!(summary.chief_complaint, "Cough");
        assert_eq!(summary.risk_level, "Unknown");
        assert!(summary.medication_plan.is_empty());
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_summary("I cannot summarize this.").is_none());
        assert!(parse_summary("} backwards {").is_none());
        assert!(parse_summary(r#"{"age": [1, 2]}"#).is_some());
        assert!(parse_summary(r#"{"follow_up_required": "maybe"}"#).is_none());
    }

    #[tokio::test]
    async fn generate_uses_dialogue_without_tools() {
        let provider = Arc::new(ScriptedProvider::single_text(REPLY));
        let mut call_turn = Turn::assistant("");
        call_turn.tool_calls.push(make_tool_call("search_patient_records", serde_json::json!({})));
        let history = vec![
            Turn::user("I have a fever"),
            call_turn,
            Turn::tool_result("call_search_patient_records", "[DATABASE RETURN] No record found."),
            Turn::assistant("How high is it?"),
        ];

        let summary = SummaryGenerator::new(provider.clone(), "m").generate(&history).await;

        assert_eq!(summary.patient_name, "Asha Rao");
        let sent = &provider.requests()[0];
        assert!(sent.tools.is_empty());
        // system + 2 dialogue turns + closing instruction
        assert_eq!(sent.messages.len(), 4);
        assert!(sent.messages.iter().all(|m| m.tool_calls.is_empty()));
    }

    #[tokio::test]
    async fn failures_fall_back_to_default() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Network("down".into()))]));
        let summary = SummaryGenerator::new(provider, "m").generate(&[]).await;
        assert!(summary.is_fallback());

        let provider = Arc::new(ScriptedProvider::single_text("Sorry, no JSON today."));
        let summary = SummaryGenerator::new(provider, "m").generate(&[]).await;
        assert_eq!(summary.risk_level, "Unknown");
    }
}
