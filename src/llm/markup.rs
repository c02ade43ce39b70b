//! Normalization for model backends that emit tool calls as inline markup.
//!
//! Some backends (Deepseek-style) wrap tool requests in
//! `[TOOL_REQUEST]{...}[END_TOOL_REQUEST]` blocks inside the content string
//! instead of populating the structured `tool_calls` field, and interleave
//! `<think>` reasoning and `[TOOL_RESULT]` echoes. All marker parsing lives
//! here; the rest of the loop only ever sees the canonical structured form.

use regex_lite::Regex;

use super::{LlmFunctionCall, LlmToolCall, Message};

const TOOL_REQUEST_MARKER: &str = "[TOOL_REQUEST]";
const TOOL_RESULT_MARKER: &str = "[TOOL_RESULT]";
const THINK_MARKER: &str = "<think>";

fn tool_request_capture() -> Regex {
    Regex::new(r"(?s)\[TOOL_REQUEST\]\s*(\{.*?\})\s*\[END_TOOL_REQUEST\]")
        .expect("valid tool request pattern")
}

fn tool_request_block() -> Regex {
    Regex::new(r"(?s)\[TOOL_REQUEST\].*?\[END_TOOL_REQUEST\]").expect("valid tool request pattern")
}

fn tool_result_block() -> Regex {
    Regex::new(r"(?s)\[TOOL_RESULT\].*?\[END_TOOL_RESULT\]").expect("valid tool result pattern")
}

fn think_block() -> Regex {
    Regex::new(r"(?s)<think>.*?</think>").expect("valid think pattern")
}

fn blank_lines() -> Regex {
    Regex::new(r"\n\s*\n").expect("valid blank line pattern")
}

/// Parse marker-delimited tool requests out of raw content.
///
/// Each block holds one JSON object with `name` and optional `arguments`.
/// Malformed JSON skips that one call; the others are still honored. Ids are
/// synthesized from position and name so replays are stable.
pub fn parse_tool_requests(content: &str) -> Vec<LlmToolCall> {
    let mut calls = Vec::new();

    for (i, caps) in tool_request_capture().captures_iter(content).enumerate() {
        let raw = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        let parsed: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Failed to parse tool call JSON: {} ({})", raw, e);
                continue;
            }
        };

        let Some(name) = parsed["name"].as_str().map(str::to_string) else {
            tracing::error!("Tool request block missing 'name': {}", raw);
            continue;
        };

        let arguments = parsed
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        calls.push(LlmToolCall {
            id: format!("call_{}_{}", i, name),
            call_type: "function".to_string(),
            function: LlmFunctionCall {
                name,
                arguments: arguments.to_string(),
            },
        });
    }

    calls
}

/// Strip tool request markers, tool result echoes, and think blocks.
///
/// Idempotent: cleaning already-clean content is a no-op.
pub fn clean_content(content: &str) -> String {
    let cleaned = tool_request_block().replace_all(content, "");
    let cleaned = tool_result_block().replace_all(&cleaned, "");
    let cleaned = think_block().replace_all(&cleaned, "");
    let cleaned = blank_lines().replace_all(cleaned.trim(), "\n");
    cleaned.trim().to_string()
}

/// Normalize a raw assistant message before it enters the message list.
///
/// Messages that already carry structured tool calls or contain no markup
/// pass through unchanged.
pub fn normalize_assistant_message(message: Message) -> Message {
    let content = message.content_str();

    if content.contains(TOOL_REQUEST_MARKER) {
        let tool_calls = parse_tool_requests(content);
        if !tool_calls.is_empty() {
            tracing::info!(
                "Parsed {} inline tool call(s) from marked-up content",
                tool_calls.len()
            );
            return Message::assistant_with_tool_calls(clean_content(content), tool_calls);
        }
        return message;
    }

    if content.contains(THINK_MARKER) || content.contains(TOOL_RESULT_MARKER) {
        tracing::debug!("Stripping think/tool-result blocks from content");
        return Message::assistant(clean_content(content));
    }

    message
}
