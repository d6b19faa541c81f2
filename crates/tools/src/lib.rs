//! Intake tools for MedIntake.
//!
//! Tools give the assistant a small, closed set of things it may do:
//! generate a clinical report (behind the validation gate), look up
//! patient records, check drug interactions, read back an uploaded
//! document, and book an appointment.

pub mod admin;
pub mod clinical;
pub mod gate;
pub mod report;

use medintake_core::session::Mode;
use medintake_core::tool::{ToolKind, ToolRegistry};
use std::sync::Arc;

pub use report::{ArtifactRef, GenerateReportTool, JsonReportRenderer, REPORT_MARKER, ReportPayload, ReportRenderer};

/// Tools offered during the clinical interview.
pub const CLINICAL_TOOLS: [ToolKind; 4] = [
    ToolKind::GenerateReport,
    ToolKind::SearchPatientRecords,
    ToolKind::CheckDrugInteraction,
    ToolKind::ScanUploadedDocument,
];

/// Tools offered for logistics.
pub const ADMIN_TOOLS: [ToolKind; 1] = [ToolKind::ScheduleAppointment];

/// The tool subset a mode may use. Emergency and summarizing get none.
pub fn tools_for_mode(mode: Mode) -> &'static [ToolKind] {
    match mode {
        Mode::Clinical => &CLINICAL_TOOLS,
        Mode::Admin => &ADMIN_TOOLS,
        Mode::Triage | Mode::Emergency | Mode::Summarizing => &[],
    }
}

/// Create a registry with every intake tool.
pub fn default_registry(renderer: Arc<dyn ReportRenderer>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(GenerateReportTool::new(renderer)));
    registry.register(Box::new(clinical::SearchPatientRecordsTool));
    registry.register(Box::new(clinical::CheckDrugInteractionTool));
    registry.register(Box::new(clinical::ScanUploadedDocumentTool));
    registry.register(Box::new(admin::ScheduleAppointmentTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use medintake_core::tool::{ToolCall, ToolOutcome};

    fn registry() -> (ToolRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(JsonReportRenderer::new(dir.path(), "/static/reports"));
        (default_registry(renderer), dir)
    }

    #[test]
    fn registers_every_kind() {
        let (registry, _dir) = registry();
        assert_eq!(registry.kinds(), ToolKind::ALL.to_vec());
    }

    #[test]
    fn mode_subsets() {
        assert_eq!(tools_for_mode(Mode::Clinical).len(), 4);
        assert_eq!(tools_for_mode(Mode::Admin), &[ToolKind::ScheduleAppointment]);
        assert!(tools_for_mode(Mode::Emergency).is_empty());
        assert!(tools_for_mode(Mode::Summarizing).is_empty());
    }

    #[tokio::test]
    async fn report_rejected_through_dispatch_writes_nothing() {
        let (registry, dir) = registry();
        let call = ToolCall {
            id: "call_1".into(),
            name: "generate_hospital_pdf".into(),
            arguments: serde_json::json!({"patient_name": "", "age": "29", "gender": "Female"}),
        };
        let outcome = registry.dispatch(&call, &CLINICAL_TOOLS).await;
        match outcome {
            ToolOutcome::Rejected(v) => assert_eq!(v.missing_fields, vec!["Patient Name"]),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn admin_mode_cannot_generate_reports() {
        let (registry, _dir) = registry();
        let call = ToolCall {
            id: "call_1".into(),
            name: "generate_hospital_pdf".into(),
            arguments: serde_json::json!({"patient_name": "Asha Rao", "age": "34", "gender": "Female"}),
        };
        let result = registry.dispatch(&call, &ADMIN_TOOLS).await.into_result("call_1");
        assert!(!result.success);
        assert!(result.content.starts_with("Error:"));
    }
}
