//! Model client for OpenAI-compatible chat completions with function-calling.
//!
//! The agent loop talks to the model through the `ModelClient` trait so tests
//! can substitute a scripted client; `OpenAiChatModel` is the production
//! implementation (LM Studio, Ollama, vLLM, OpenAI, etc.).

pub mod markup;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AssistantConfig;
use crate::tools::ToolDef;

/// A message in the conversation, OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<LlmToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<LlmToolCall>,
    ) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|calls| !calls.is_empty())
            .unwrap_or(false)
    }
}

/// Tool call as returned by the LLM (OpenAI format)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: LlmFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmFunctionCall {
    pub name: String,
    pub arguments: String, // JSON string
}

/// Token counts reported by the model backend, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

/// One model invocation's result: the assistant message plus usage metadata.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub message: Message,
    pub usage: Option<TokenUsage>,
}

/// Seam between the agent loop and the model backend.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(&self, messages: &[Message], tools: &[ToolDef]) -> Result<AssistantReply>;
}

/// Production client against an OpenAI-compatible /chat/completions endpoint.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatModel {
    pub fn new(config: &AssistantConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_url: config.llm_api_url.trim_end_matches('/').to_string(),
            model: config.llm_model.clone(),
            api_key: config.llm_api_key.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiChatModel {
    async fn invoke(&self, messages: &[Message], tools: &[ToolDef]) -> Result<AssistantReply> {
        let url = format!("{}/chat/completions", self.api_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        // Only include tools if we have any
        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools)?;
        }

        let mut req = self.client.post(&url).json(&body);

        // API key header is optional; local backends don't require one
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await.context("Failed to send LLM request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error {}: {}", status, body);
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let choice = response_json["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .context("Empty choices in LLM response")?;

        let message = &choice["message"];
        let content = message["content"].as_str().map(String::from);
        let tool_calls: Option<Vec<LlmToolCall>> = message
            .get("tool_calls")
            .and_then(|tc| serde_json::from_value(tc.clone()).ok());

        let usage = parse_usage(&response_json["usage"]);

        Ok(AssistantReply {
            message: Message {
                role: "assistant".to_string(),
                content,
                tool_calls,
                tool_call_id: None,
            },
            usage,
        })
    }
}

/// Accept both OpenAI naming (prompt/completion) and the normalized naming
/// some local backends emit (input/output).
fn parse_usage(usage: &serde_json::Value) -> Option<TokenUsage> {
    if !usage.is_object() {
        return None;
    }
    let input_tokens = usage["prompt_tokens"]
        .as_u64()
        .or_else(|| usage["input_tokens"].as_u64())
        .unwrap_or(0);
    let output_tokens = usage["completion_tokens"]
        .as_u64()
        .or_else(|| usage["output_tokens"].as_u64())
        .unwrap_or(0);
    Some(TokenUsage {
        input_tokens,
        output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serialization_skips_absent_fields() {
        let msg = Message::user("Hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "Hello");
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn tool_message_carries_call_id() {
        let msg = Message::tool("result text", "call_123");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_123");
    }

    #[test]
    fn has_tool_calls_ignores_empty_vec() {
        let msg = Message::assistant_with_tool_calls("", vec![]);
        assert!(!msg.has_tool_calls());

        let msg = Message::assistant_with_tool_calls(
            "",
            vec![LlmToolCall {
                id: "call_0".to_string(),
                call_type: "function".to_string(),
                function: LlmFunctionCall {
                    name: "search_documents".to_string(),
                    arguments: "{}".to_string(),
                },
            }],
        );
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn parses_openai_usage_field_names() {
        let usage = parse_usage(&serde_json::json!({
            "prompt_tokens": 100,
            "completion_tokens": 25,
            "total_tokens": 125
        }))
        .unwrap();
        assert_eq!(usage.input_tokens, 100);
        assert_eq!(usage.output_tokens, 25);
        assert!(!usage.is_zero());
    }

    #[test]
    fn parses_normalized_usage_field_names() {
        let usage = parse_usage(&serde_json::json!({
            "input_tokens": 7,
            "output_tokens": 3
        }))
        .unwrap();
        assert_eq!(usage.input_tokens, 7);
        assert_eq!(usage.output_tokens, 3);
    }

    #[test]
    fn missing_usage_is_none() {
        assert!(parse_usage(&serde_json::Value::Null).is_none());
    }
}
