//! Chat turn orchestration.
//!
//! The engine glues the seams together: resolve a session, assemble the
//! history window, classify the question, retrieve knowledge, compose the
//! answer, and persist the finished turn. Every chat turn flows through
//! [`orchestrator::ChatOrchestrator`].

pub mod audit;
pub mod composer;
pub mod history;
pub mod orchestrator;

pub use audit::{CreditAudit, CreditThresholds};
pub use composer::{Composed, ResponseComposer};
pub use history::HistoryAssembler;
pub use orchestrator::{ChatInput, ChatOrchestrator, ChatOutcome};
