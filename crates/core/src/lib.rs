//! # MedIntake Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! MedIntake conversational intake assistant. This crate has **zero
//! framework dependencies** — it defines the domain model that all other
//! crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (model, tool, turn history, OCR, audio
//! transcription, image understanding) is defined as a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with fakes
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod history;
pub mod media;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use history::TurnStore;
pub use media::{ArtifactKind, ImageDescriber, MediaArtifact, OcrEngine, TextExtractor, Transcriber, TranscriptionOptions};
pub use message::{MessageToolCall, Role, SessionId, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use session::{Mode, OperatorRole, SessionState, TriageStatus};
pub use tool::{TOOL_ERROR_MARKER, Tool, ToolCall, ToolKind, ToolOutcome, ToolRegistry, ToolResult, ValidationVerdict};
