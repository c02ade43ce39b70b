//! Tool system for the assistant's retrieval and analytics capabilities.
//!
//! Each tool declares a JSON Schema for its parameters, enabling LLM
//! function-calling. Tools are registered in a thread-safe ToolRegistry that
//! generates OpenAI-format function definitions for the LLM and folds every
//! failure mode (unknown tool, execution error) into a tool-result message
//! instead of aborting the agent loop.

pub mod campaigns;
pub mod charts;
pub mod documents;
pub mod images;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What a tool hands back to the agent loop.
///
/// Structured variants (table, chart, image) are hoisted into the run's
/// side-channel data slot and determine the final envelope kind; text and
/// error variants only feed the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolReply {
    Text {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Table {
        columns: Vec<String>,
        rows: Vec<serde_json::Value>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Chart {
        chart_type: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Image {
        image_url: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
}

impl ToolReply {
    pub fn text(message: impl Into<String>, source: impl Into<String>) -> Self {
        ToolReply::Text {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn error(message: impl Into<String>, source: impl Into<String>) -> Self {
        ToolReply::Error {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ToolReply::Text { message, .. }
            | ToolReply::Table { message, .. }
            | ToolReply::Chart { message, .. }
            | ToolReply::Image { message, .. }
            | ToolReply::Error { message, .. } => message,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            ToolReply::Text { source, .. }
            | ToolReply::Table { source, .. }
            | ToolReply::Chart { source, .. }
            | ToolReply::Image { source, .. }
            | ToolReply::Error { source, .. } => source.as_deref(),
        }
    }

    /// Table, chart, and image replies carry payloads the UI renders directly.
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            ToolReply::Table { .. } | ToolReply::Chart { .. } | ToolReply::Image { .. }
        )
    }

    /// Serialize for the model. The model sees the full mapping, including
    /// the source field, just like any other tool-result text.
    pub fn to_llm_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message().to_string())
    }
}

/// A tool provides the assistant with one retrieval or analytics capability.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used in function-calling (e.g., "search_documents")
    fn name(&self) -> &str;

    /// Human-readable description the LLM uses for tool selection
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments
    async fn execute(&self, args: serde_json::Value) -> Result<ToolReply>;
}

/// OpenAI-format function definition for LLM function-calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// OpenAI-format tool definition (wraps FunctionDef)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

/// A tool call requested by the model, already decoded to JSON arguments
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The resolution of one dispatched tool call.
///
/// `content` is what goes back to the model as the tool message; `reply` is
/// the typed result when the tool actually ran.
#[derive(Debug, Clone)]
pub struct ToolDispatch {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: String,
    pub reply: Option<ToolReply>,
    pub is_error: bool,
}

/// Thread-safe registry of the assistant's fixed tool set.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        tracing::info!("Registered tool: {}", name);
        self.tools.write().await.insert(name, tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn list_names(&self) -> Vec<String> {
        self.tools.read().await.keys().cloned().collect()
    }

    /// Generate OpenAI-format tool definitions for all registered tools.
    ///
    /// This output can be passed directly to the `tools` parameter of an
    /// OpenAI-compatible chat completions request.
    pub async fn tool_definitions(&self) -> Vec<ToolDef> {
        let tools = self.tools.read().await;
        tools
            .values()
            .map(|tool| ToolDef {
                tool_type: "function".to_string(),
                function: FunctionDef {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a requested tool call, folding every failure into the result.
    ///
    /// A missing tool or a tool that returns Err never escapes as an error;
    /// the model gets the failure text and the loop continues.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolDispatch {
        let tool = match self.get(&request.name).await {
            Some(t) => t,
            None => {
                tracing::warn!("Model requested unknown tool: {}", request.name);
                return ToolDispatch {
                    tool_call_id: request.id.clone(),
                    tool_name: request.name.clone(),
                    content: format!("Unknown tool: {}", request.name),
                    reply: None,
                    is_error: true,
                };
            }
        };

        match tool.execute(request.arguments.clone()).await {
            Ok(reply) => ToolDispatch {
                tool_call_id: request.id.clone(),
                tool_name: request.name.clone(),
                content: reply.to_llm_string(),
                reply: Some(reply),
                is_error: false,
            },
            Err(e) => {
                tracing::error!("Tool {} failed: {}", request.name, e);
                ToolDispatch {
                    tool_call_id: request.id.clone(),
                    tool_name: request.name.clone(),
                    content: format!("Error executing tool {}: {}", request.name, e),
                    reply: None,
                    is_error: true,
                }
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
