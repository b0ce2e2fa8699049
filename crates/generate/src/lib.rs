//! Answer generation backends for haksa.

pub mod openai_compat;
pub mod template;

pub use openai_compat::OpenAiCompatGenerator;
pub use template::TemplateGenerator;
