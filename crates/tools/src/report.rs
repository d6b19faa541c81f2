//! Clinical report generation.
//!
//! `GenerateReportTool` is the one tool whose side effect leaves a lasting
//! artifact, so it sits behind the validation gate. Layout and file format
//! belong to a `ReportRenderer`; the bundled `JsonReportRenderer` writes
//! the normalized payload as JSON next to where a PDF renderer would put
//! its output.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medintake_core::error::{RenderError, ToolError};
use medintake_core::tool::{Tool, ToolKind, ToolResult, ValidationVerdict};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use crate::gate;

/// Prefix of a successful report tool result.
pub const REPORT_MARKER: &str = "REPORT_GENERATED_AT:";

/// Normalized report content. Built only by [`gate::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub patient_name: String,
    pub age: String,
    pub gender: String,
    pub chief_complaint: String,
    pub history: String,
    pub lifestyle_impact: String,
    pub diagnosis: String,
    pub medications: Vec<String>,
    pub prognosis: String,
    pub medical_opinion: String,
    pub recommendations: String,
    pub generated_at: DateTime<Utc>,
}

/// Where a rendered report ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    /// Reference handed back to the model and the user
    pub url: String,
}

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, payload: &ReportPayload) -> Result<ArtifactRef, RenderError>;
}

/// At most ten alphanumeric characters of the patient name.
pub fn safe_file_stem(patient_name: &str) -> String {
    patient_name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(10)
        .collect()
}

/// Writes `Report_<name>_<unix ts>.json` under a directory.
pub struct JsonReportRenderer {
    output_dir: PathBuf,
    url_prefix: String,
}

impl JsonReportRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn file_name(payload: &ReportPayload) -> String {
        format!(
            "Report_{}_{}.json",
            safe_file_stem(&payload.patient_name),
            payload.generated_at.timestamp()
        )
    }
}

#[async_trait]
impl ReportRenderer for JsonReportRenderer {
    async fn render(&self, payload: &ReportPayload) -> Result<ArtifactRef, RenderError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| RenderError::Io(format!("{}: {e}", self.output_dir.display())))?;

        let file_name = Self::file_name(payload);
        let path = self.output_dir.join(&file_name);
        let body = serde_json::to_vec_pretty(payload).map_err(|e| RenderError::Encoding(e.to_string()))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| RenderError::Io(format!("{}: {e}", path.display())))?;

        Ok(ArtifactRef {
            path,
            url: format!("{}/{file_name}", self.url_prefix),
        })
    }
}

/// `generate_hospital_pdf`: gate, normalize, render.
pub struct GenerateReportTool {
    renderer: Arc<dyn ReportRenderer>,
}

impl GenerateReportTool {
    pub fn new(renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Tool for GenerateReportTool {
    fn kind(&self) -> ToolKind {
        ToolKind::GenerateReport
    }

    fn description(&self) -> &str {
        "Generates a formal medical report for the patient. CRITICAL: Do NOT call this unless you know the patient's real name, age and gender."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let text = |description: &str| serde_json::json!({ "type": "string", "description": description });
        serde_json::json!({
            "type": "object",
            "properties": {
                "patient_name": text("Patient's full name as they stated it"),
                "age": text("Patient's age in years"),
                "gender": text("Patient's gender"),
                "chief_complaint": text("Main symptom with duration and severity"),
                "history": text("Relevant medical history"),
                "lifestyle_impact": text("How the condition affects daily life"),
                "diagnosis": text("Provisional assessment"),
                "medications": text("Current or suggested medications, comma separated"),
                "prognosis": text("Expected course"),
                "medical_opinion": text("Clinical opinion in plain language"),
                "recommendations": text("Next steps for the patient")
            },
            "required": ["patient_name", "age", "gender"]
        })
    }

    fn validate(&self, arguments: &serde_json::Value) -> ValidationVerdict {
        gate::check(arguments)
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let payload = gate::normalize(&arguments).map_err(|v| ToolError::Rejected(v.message))?;

        let artifact = self
            .renderer
            .render(&payload)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: ToolKind::GenerateReport.name().into(),
                reason: format!("Report generation failed: {e}"),
            })?;

        info!(url = %artifact.url, medications = payload.medications.len(), "Report generated");

        Ok(ToolResult::ok(format!("{REPORT_MARKER} {}", artifact.url)).with_data(serde_json::json!({
            "url": artifact.url,
            "path": artifact.path,
            "payload": payload,
        })))
    }
}
