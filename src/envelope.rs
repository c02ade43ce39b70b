//! The normalized response shape returned to callers (UI, API clients).
//!
//! Every completed agent run collapses into one of these, regardless of how
//! many tools ran or what they returned.

use serde::{Deserialize, Serialize};

pub const STRUCTURED_RESULT_MESSAGE: &str = "Here are the results";

pub const NO_RELEVANT_INFO_MESSAGE: &str = "I couldn't find relevant campaign information \
     for your question. Please try rephrasing or ask about a specific campaign, \
     metric, topic or segment!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Text,
    Table,
    Chart,
    Image,
}

/// The envelope surfaced to the caller for every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ChatResponse {
    pub fn text(message: impl Into<String>, source: Option<String>) -> Self {
        Self {
            kind: ResponseKind::Text,
            message: message.into(),
            source: source.filter(|s| !s.trim().is_empty()),
            data: None,
        }
    }

    pub fn table(data: serde_json::Value) -> Self {
        Self {
            kind: ResponseKind::Table,
            message: STRUCTURED_RESULT_MESSAGE.to_string(),
            source: None,
            data: Some(data),
        }
    }

    pub fn chart(data: serde_json::Value) -> Self {
        Self {
            kind: ResponseKind::Chart,
            message: STRUCTURED_RESULT_MESSAGE.to_string(),
            source: None,
            data: Some(data),
        }
    }

    pub fn image(data: serde_json::Value) -> Self {
        Self {
            kind: ResponseKind::Image,
            message: STRUCTURED_RESULT_MESSAGE.to_string(),
            source: None,
            data: Some(data),
        }
    }

    /// The fixed apology surfaced when a run fails outright or tools found nothing.
    pub fn error() -> Self {
        Self {
            kind: ResponseKind::Text,
            message: NO_RELEVANT_INFO_MESSAGE.to_string(),
            source: None,
            data: None,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            ResponseKind::Text => "text",
            ResponseKind::Table => "table",
            ResponseKind::Chart => "chart",
            ResponseKind::Image => "image",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_response_omits_empty_source() {
        let resp = ChatResponse::text("hello", Some("  ".to_string()));
        assert!(resp.source.is_none());

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "text");
        assert!(json.get("source").is_none());
        assert!(json.get("data").is_none());
    }

    #[test]
    fn structured_responses_use_fixed_message() {
        let resp = ChatResponse::chart(serde_json::json!({"chart_type": "trends"}));
        assert_eq!(resp.message, STRUCTURED_RESULT_MESSAGE);
        assert_eq!(resp.data.unwrap()["chart_type"], "trends");
    }

    #[test]
    fn error_response_is_text_kind() {
        let resp = ChatResponse::error();
        assert_eq!(resp.kind, ResponseKind::Text);
        assert!(resp.message.contains("rephrasing"));
    }
}
