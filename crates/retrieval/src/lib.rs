//! Query classification and knowledge retrieval for haksa.

pub mod classifier;
pub mod engine;
pub mod in_memory;
pub mod rest;

pub use classifier::QueryClassifier;
pub use engine::RetrievalEngine;
pub use in_memory::InMemoryIndex;
pub use rest::RestIndex;
