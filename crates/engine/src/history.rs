//! History windowing for prompt assembly.
//!
//! The stored history is authoritative and unbounded; the generation prompt
//! only carries a sliding window of the most recent turns. Truncation is
//! pair-aware: the window never opens on a dangling assistant message, and a
//! trailing user message without a reply is kept.

use haksa_core::message::{Message, Role};

/// Produces the history window sent to the generator.
#[derive(Debug, Clone, Copy)]
pub struct HistoryAssembler {
    /// Maximum number of user+assistant turns in the window.
    window: usize,
}

impl HistoryAssembler {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// The most recent `window` turns of `history`, oldest first.
    pub fn window(&self, history: &[Message]) -> Vec<Message> {
        if self.window == 0 || history.is_empty() {
            return Vec::new();
        }

        // Walk back until `window` user messages are inside the slice.
        let mut users_seen = 0;
        let mut start = history.len();
        for (i, message) in history.iter().enumerate().rev() {
            if message.role == Role::User {
                users_seen += 1;
            }
            start = i;
            if users_seen == self.window {
                break;
            }
        }

        // A slice opening on an assistant message is mid-pair; drop it.
        while start < history.len() && history[start].role == Role::Assistant {
            start += 1;
        }

        history[start..].to_vec()
    }
}
