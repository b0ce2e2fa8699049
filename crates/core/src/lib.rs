//! # haksa Core
//!
//! Domain types, traits, and error definitions for the haksa chat backend.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem seam is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod generate;
pub mod message;
pub mod profile;
pub mod retrieval;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use generate::{GenerationRequest, Generator};
pub use message::{Message, Role, SessionId};
pub use profile::{CourseInput, UserProfile};
pub use retrieval::{KnowledgeIndex, QueryType, Retrieval, SearchSource};
pub use session::{Session, SessionStore};
