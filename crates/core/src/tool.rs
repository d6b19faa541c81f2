//! Tool trait and registry — what the model may ask the system to do.
//!
//! The set of tools is closed: every tool is a [`ToolKind`] variant, and
//! the registry is built once at startup. A name the model invents that
//! does not map to a kind is a detectable error, never a silent no-op.
//!
//! Execution goes through [`ToolRegistry::dispatch`], which always runs
//! the tool's validator before its side effect.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// Prefix of every tool result produced from a tool failure.
pub const TOOL_ERROR_MARKER: &str = "Error:";

/// Every tool the assistant knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Build a clinical report artifact (real-world side effect)
    GenerateReport,
    /// Look up a patient's prior history
    SearchPatientRecords,
    /// Check two medications for contraindications
    CheckDrugInteraction,
    /// Read back an uploaded document
    ScanUploadedDocument,
    /// Book an appointment slot
    ScheduleAppointment,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::GenerateReport,
        ToolKind::SearchPatientRecords,
        ToolKind::CheckDrugInteraction,
        ToolKind::ScanUploadedDocument,
        ToolKind::ScheduleAppointment,
    ];

    /// The wire name the model uses to call this tool.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::GenerateReport => "generate_hospital_pdf",
            ToolKind::SearchPatientRecords => "search_patient_records",
            ToolKind::CheckDrugInteraction => "check_drug_interaction",
            ToolKind::ScanUploadedDocument => "scan_uploaded_document",
            ToolKind::ScheduleAppointment => "schedule_appointment",
        }
    }

    /// Resolve a wire name. Exact match only.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Whether executing this tool changes anything outside the process.
    pub fn has_side_effects(&self) -> bool {
        matches!(self, ToolKind::GenerateReport | ToolKind::ScheduleAppointment)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute, as the model spelled it
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Decode the wire form carried in an assistant turn.
    ///
    /// Arguments that are not a JSON object are treated as an empty
    /// object: every field is absent as far as validation is concerned.
    pub fn from_wire(call: &MessageToolCall) -> Self {
        let arguments = match serde_json::from_str::<serde_json::Value>(&call.arguments) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            _ => {
                tracing::warn!(tool = %call.name, call_id = %call.id, "Unparseable tool arguments, treating as empty");
                serde_json::Value::Object(serde_json::Map::new())
            }
        };
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        }
    }
}

/// The result of a tool call, fed back to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result answers
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// Text the model will see
    pub content: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            content: content.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Outcome of running a validator over a tool call's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub accepted: bool,

    /// Display labels of missing fields, in a stable order
    pub missing_fields: Vec<String>,

    /// Machine-actionable explanation the model can relay to the user
    pub message: String,
}

impl ValidationVerdict {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            missing_fields: Vec::new(),
            message: String::new(),
        }
    }

    pub fn reject(missing_fields: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            missing_fields,
            message: message.into(),
        }
    }
}

/// The core Tool trait.
///
/// Every tool pairs a deterministic validator with its side effect.
/// The registry calls `validate` first and `execute` only on acceptance.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which kind of tool this is.
    fn kind(&self) -> ToolKind;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Pure pre-execution check. Accepts everything unless overridden.
    fn validate(&self, _arguments: &serde_json::Value) -> ValidationVerdict {
        ValidationVerdict::accept()
    }

    /// Perform the tool's effect.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// What happened when a tool call was dispatched.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// The validator accepted and the tool ran
    Executed(ToolResult),
    /// The validator rejected; nothing was executed
    Rejected(ValidationVerdict),
    /// Unknown tool, tool outside the allowed subset, or execution error
    Failed(ToolError),
}

impl ToolOutcome {
    /// Turn any outcome into the single result the model sees for `call_id`.
    pub fn into_result(self, call_id: &str) -> ToolResult {
        match self {
            ToolOutcome::Executed(mut result) => {
                result.call_id = call_id.to_string();
                result
            }
            ToolOutcome::Rejected(verdict) => ToolResult {
                call_id: call_id.to_string(),
                success: false,
                content: verdict.message.clone(),
                data: serde_json::to_value(&verdict).ok(),
            },
            ToolOutcome::Failed(err) => ToolResult {
                call_id: call_id.to_string(),
                success: false,
                content: format!("{TOOL_ERROR_MARKER} {err}"),
                data: None,
            },
        }
    }
}

/// A registry of available tools, keyed by kind.
///
/// The controller uses this to:
/// 1. Get the definitions for the current mode's tool subset
/// 2. Dispatch the model's tool calls through validation
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool of the same kind.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    /// Get a tool by kind.
    pub fn get(&self, kind: ToolKind) -> Option<&dyn Tool> {
        self.tools.get(&kind).map(|t| t.as_ref())
    }

    /// Map a model-supplied name to a registered kind.
    pub fn resolve(&self, name: &str) -> std::result::Result<ToolKind, ToolError> {
        ToolKind::from_name(name)
            .filter(|kind| self.tools.contains_key(kind))
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Definitions for a subset of kinds, in the order given.
    pub fn definitions_for(&self, kinds: &[ToolKind]) -> Vec<ToolDefinition> {
        kinds
            .iter()
            .filter_map(|kind| self.tools.get(kind))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Run one call: resolve, check the allowed subset, validate, execute.
    ///
    /// This is the only path to a tool's `execute`.
    pub async fn dispatch(&self, call: &ToolCall, allowed: &[ToolKind]) -> ToolOutcome {
        let kind = match self.resolve(&call.name) {
            Ok(kind) => kind,
            Err(e) => return ToolOutcome::Failed(e),
        };
        if !allowed.contains(&kind) {
            return ToolOutcome::Failed(ToolError::NotPermitted(call.name.clone()));
        }
        let Some(tool) = self.tools.get(&kind) else {
            return ToolOutcome::Failed(ToolError::NotFound(call.name.clone()));
        };

        let verdict = tool.validate(&call.arguments);
        if !verdict.accepted {
            return ToolOutcome::Rejected(verdict);
        }

        match tool.execute(call.arguments.clone()).await {
            Ok(mut result) => {
                result.call_id = call.id.clone();
                ToolOutcome::Executed(result)
            }
            Err(e) => ToolOutcome::Failed(e),
        }
    }

    /// All registered kinds.
    pub fn kinds(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|k| self.tools.contains_key(k))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
