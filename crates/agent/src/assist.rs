//! Small fast-model helpers around the conversation: titles, typing
//! suggestions and quick replies. None of them can fail; each has a
//! fixed fallback.

use std::sync::Arc;
use std::time::Duration;
use medintake_core::message::{Role, Turn};
use medintake_core::provider::{Provider, ProviderRequest};
use regex_lite::Regex;
use tracing::{debug, warn};

pub const NEW_TITLE: &str = "New Consultation";
pub const FALLBACK_TITLE: &str = "Medical Consultation";
pub const DEFAULT_SMART_REPLIES: [&str; 3] = ["Upload Report", "Book Appointment", "Emergency"];

const MAX_SUGGESTIONS: usize = 3;
const MAX_REPLY_CHARS: usize = 20;

/// First `[...]` span in `text`, parsed as a JSON array.
fn first_json_array(text: &str) -> Option<Vec<serde_json::Value>> {
    let pattern = Regex::new(r"(?s)\[.*\]").ok()?;
    let span = pattern.find(text)?;
    serde_json::from_str(span.as_str()).ok()
}

pub struct AssistService {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
}

impl AssistService {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn ask(&self, prompt: String, temperature: f32) -> Option<String> {
        let request = ProviderRequest::new(self.model.clone(), vec![Turn::user(prompt)]).with_temperature(temperature);
        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => Some(response.message.content.trim().to_string()),
            Ok(Err(e)) => {
                warn!(error = %e, "Assist call failed");
                None
            }
            Err(_) => {
                warn!("Assist call timed out");
                None
            }
        }
    }

    /// A 3-5 word clinical title for the first message of a session.
    pub async fn generate_chat_title(&self, message: &str) -> String {
        if message.trim().chars().count() < 2 {
            return NEW_TITLE.to_string();
        }
        let clean: String = message.chars().take(250).collect::<String>().replace('\n', " ");
        let prompt = format!(
            "Role: Medical Admin.\n\
             Task: Generate a 3-5 word professional title for this patient query.\n\
             Input: \"{}\"\n\n\
             Constraints:\n\
             - Use clinical terminology where possible (e.g., \"Stomach hurt\" -> \"Abdominal Pain\").\n\
             - Do NOT use quotes, periods, or prefixes like \"Title:\".\n\
             - Return ONLY the text.",
            clean.trim()
        );

        let Some(raw) = self.ask(prompt, 0.3).await else {
            return FALLBACK_TITLE.to_string();
        };
        let title = clean_title(&raw);
        if title.is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            debug!(title = %title, "Generated chat title");
            title
        }
    }

    /// Up to three continuations of what the user is typing.
    pub async fn text_suggestions(&self, input: &str) -> Vec<String> {
        if input.trim().chars().count() < 2 {
            return Vec::new();
        }
        let prompt = format!(
            "Role: Keyboard Autocomplete Engine.\n\
             Task: Complete the user's sentence logically.\n\
             Input: \"{input}\"\n\n\
             Constraints:\n\
             - Return a JSON List of 3 strings.\n\
             - NO polite talk. NO conversational filler.\n\
             - The suggestions must strictly continue the input text.\n\n\
             Example:\n\
             Input: \"I feel d\" -> Output: [\"dizzy\", \"drained\", \"down lately\"]"
        );

        let Some(raw) = self.ask(prompt, 0.3).await else {
            return Vec::new();
        };
        first_json_array(&raw)
            .map(|items| {
                items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .take(MAX_SUGGESTIONS)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Quick-reply buttons answering the assistant's latest message.
    pub async fn smart_replies(&self, history: &[Turn]) -> Vec<String> {
        let defaults = || DEFAULT_SMART_REPLIES.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let Some(last) = history
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant && !t.content.trim().is_empty())
        else {
            return defaults();
        };
        let excerpt: String = last.content.chars().take(300).collect();
        let prompt = format!(
            "Role: UX Writing Assistant.\n\
             Context: The AI Doctor just said: \"{excerpt}...\"\n\n\
             Task: Generate 3 short, relevant 'Quick Reply' buttons for the patient.\n\
             Rules:\n\
             - Max 3-4 words per button.\n\
             - Must directly answer the Doctor's question/statement.\n\
             - Return strictly JSON list.\n\n\
             Example:\n\
             Doctor: \"How long have you had the fever?\"\n\
             Output: [\"Since yesterday\", \"2 days\", \"A week\"]"
        );

        let Some(raw) = self.ask(prompt, 0.5).await else {
            return defaults();
        };
        match first_json_array(&raw) {
            Some(items) => items
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .map(|s| s.chars().take(MAX_REPLY_CHARS).collect())
                .take(MAX_SUGGESTIONS)
                .collect(),
            None => defaults(),
        }
    }
}

/// Strip quotes, a trailing period and any `Title:` prefix.
pub fn clean_title(raw: &str) -> String {
    let title = raw.replace(['"', '\''], "");
    let title = title.trim().trim_end_matches('.').trim();
    let title = match title.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("title:") => title[6..].trim(),
        _ => title,
    };
    title.to_string()
}
