//! The intake conversation core.
//!
//! Each patient turn follows a fixed path:
//!
//! 1. **Route** the message to a mode (clinical, admin, emergency)
//! 2. **Emergency**: fixed escalation reply, no model and no tools
//! 3. **Clinical/Admin**: the controller calls the model with the mode's
//!    tools, runs any tool calls through validation, and calls the model
//!    once more for the final reply
//! 4. **Completion marker** in the reply: produce a structured summary
//!
//! The controller never makes more than two model calls per turn.

pub mod assist;
pub mod controller;
pub mod instructions;
pub mod router;
pub mod session;
pub mod summary;
pub mod window;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assist::AssistService;
pub use controller::{ConversationController, TurnOutcome, TurnRequest};
pub use router::{Router, classify};
pub use session::{IntakeAgent, IntakeSession, TurnInput, TurnReply};
pub use summary::{ClinicalSummary, SummaryGenerator, Vitals};
pub use window::HistoryWindow;
