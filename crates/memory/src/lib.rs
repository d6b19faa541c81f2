//! Turn history store implementations for MedIntake.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileTurnStore;
pub use in_memory::InMemoryTurnStore;
