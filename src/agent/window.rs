//! The bounded working window carried between turns.
//!
//! The window keeps at most the last [`WINDOW_SIZE`] messages and is always
//! anchored at a user message: after truncation, anything before the first
//! user-role message is dropped so the model never sees a window that opens
//! mid-exchange (an orphaned tool result or assistant reply).

use serde::{Deserialize, Serialize};

use crate::llm::Message;
use crate::tools::ToolReply;

pub const WINDOW_SIZE: usize = 10;

/// Snapshot persisted per (thread, user) between turns: the reduced window
/// plus the last structured payload that crossed the side channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ToolReply>,
}

/// Merge prior window state with this turn's messages and re-bound the result.
///
/// Truncates to the last [`WINDOW_SIZE`] messages, then drops leading
/// messages until the first user message. If no user message survives
/// truncation the window comes back empty.
pub fn reduce_window(existing: &[Message], new: &[Message]) -> Vec<Message> {
    let combined: Vec<&Message> = existing.iter().chain(new.iter()).collect();

    let start = combined.len().saturating_sub(WINDOW_SIZE);
    let tail = &combined[start..];

    match tail.iter().position(|msg| msg.role == "user") {
        Some(anchor) => tail[anchor..].iter().map(|m| (*m).clone()).collect(),
        None => Vec::new(),
    }
}
