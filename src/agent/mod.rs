//! The conversational agent: bootstrap, ask/act loop, finalization.
//!
//! One `chat` call runs the full state machine: assemble the model-visible
//! context (priming + durable text history + query), alternate between model
//! invocations and tool dispatch until the model stops requesting tools, then
//! collapse the run into a single `ChatResponse` and persist the turn.

pub mod window;

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::database::{AssistantDatabase, NewChatMessage};
use crate::envelope::ChatResponse;
use crate::llm::{markup, Message, ModelClient, TokenUsage};
use crate::tools::{ToolCallRequest, ToolDispatch, ToolRegistry, ToolReply};
use window::{reduce_window, CheckpointState};

const PERSONA_PROMPT: &str = "You are ONLY a Campaign Analytics Assistant. \
    You MUST reject ANY non-campaign queries immediately.";

const REFUSAL_EXAMPLE: &str = "I am a Campaign Analytics Assistant. I can only \
    provide information about campaign performance data.";

const STRICT_RULES_PROMPT: &str = "You are a Campaign Performance Assistant with a strict focus on campaign analytics data. \
    Your responses MUST be based ONLY on: \
    1. Information from previous conversations in our chat history \
    2. Data retrieved through campaign data tools \
    3. Direct campaign performance metrics and analytics \
    STRICT RULES: \
    - NEVER create, invent, or make up any information \
    - NEVER tell jokes or engage in casual conversation \
    - NEVER provide responses about topics outside of campaign performance \
    - If information is not in the chat history or available through tools, respond ONLY with: 'I can only provide information about campaign performance based on available data.' \
    WORKFLOW: \
    1. First, check conversation history for relevant information \
    2. If history doesn't contain the answer, use campaign data tools \
    3. If neither source has the information, provide the standard response \
    Remember: You are an analytics tool, not a conversational AI. \
    Stay focused only on campaign performance data and metrics.";

/// The persona/priming sequence prepended to every model call. Never subject
/// to window truncation.
fn priming_messages() -> Vec<Message> {
    vec![
        Message::system(PERSONA_PROMPT),
        Message::user("Tell me a joke"),
        Message::assistant(REFUSAL_EXAMPLE),
        Message::user("How are you today?"),
        Message::assistant(REFUSAL_EXAMPLE),
        Message::system(STRICT_RULES_PROMPT),
    ]
}

/// Per-thread conversational state summary, surfaced over the API.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub thread_id: String,
    pub user_id: String,
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub status: String,
}

/// Everything one completed loop run produced.
struct RunOutcome {
    final_content: String,
    window: Vec<Message>,
    data: Option<ToolReply>,
    dispatches: Vec<ToolDispatch>,
    usage: TokenUsage,
}

pub struct Agent {
    model: Arc<dyn ModelClient>,
    registry: Arc<ToolRegistry>,
    db: Arc<AssistantDatabase>,
    history_limit: usize,
    max_iterations: usize,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        db: Arc<AssistantDatabase>,
        history_limit: usize,
        max_iterations: usize,
    ) -> Self {
        Self {
            model,
            registry,
            db,
            history_limit,
            max_iterations,
        }
    }

    /// Handle one user query end to end.
    ///
    /// Any failure inside the run collapses into the fixed apology envelope;
    /// this never returns a raw error to the caller.
    pub async fn chat(&self, query: &str, thread_id: &str, user_id: &str) -> ChatResponse {
        tracing::info!(
            "Processing query - user: {}, thread: {}: {}",
            user_id,
            thread_id,
            query
        );

        // Durable text history is read before this turn is appended, so the
        // query never shows up twice in its own context.
        let history = self.load_text_history(user_id, thread_id);

        if let Err(e) = self.db.save_chat_message(&NewChatMessage {
            user_id,
            thread_id,
            role: "user",
            content: query,
            response_type: "text",
            ..Default::default()
        }) {
            tracing::error!("Failed to persist user turn: {}", e);
        }

        let mut seed = history;
        seed.push(Message::user(query));

        let response = match self.run(&seed, thread_id, user_id).await {
            Ok(outcome) => {
                if !outcome.usage.is_zero() {
                    if let Err(e) = self.db.save_token_usage(
                        user_id,
                        thread_id,
                        outcome.usage.input_tokens,
                        outcome.usage.output_tokens,
                    ) {
                        tracing::error!("Failed to save token usage: {}", e);
                    }
                }

                let state = CheckpointState {
                    messages: outcome.window.clone(),
                    data: outcome.data.clone(),
                };
                if let Err(e) = self.db.put_checkpoint(thread_id, user_id, &state) {
                    tracing::error!("Failed to save checkpoint: {}", e);
                }

                finalize(&outcome)
            }
            Err(e) => {
                tracing::error!("Agent run failed - thread {}: {}", thread_id, e);
                ChatResponse::error()
            }
        };

        self.persist_assistant_turn(user_id, thread_id, &response);
        response
    }

    /// Pull up to `history_limit` text-only turns from the durable log,
    /// oldest first. Table/chart/image turns stay in the UI but are never
    /// replayed to the model.
    fn load_text_history(&self, user_id: &str, thread_id: &str) -> Vec<Message> {
        let entries = match self
            .db
            .get_chat_history(user_id, thread_id, self.history_limit * 2)
        {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Failed to load chat history: {}", e);
                return Vec::new();
            }
        };

        let mut messages: Vec<Message> = entries
            .iter()
            .filter(|e| e.response_type.as_deref() == Some("text"))
            .filter_map(|e| match e.role.as_str() {
                "user" => Some(Message::user(e.content.clone())),
                "assistant" => Some(Message::assistant(e.content.clone())),
                _ => None,
            })
            .collect();

        // Keep the most recent turns, oldest first
        if messages.len() > self.history_limit {
            messages.drain(..messages.len() - self.history_limit);
        }

        tracing::info!(
            "Loaded {} text messages from chat history for thread {}",
            messages.len(),
            thread_id
        );
        messages
    }

    /// The ask/act cycle. `seed` is the bootstrapped tail (history + query);
    /// the priming sequence is re-prepended on every model call and never
    /// truncated.
    async fn run(&self, seed: &[Message], thread_id: &str, user_id: &str) -> Result<RunOutcome> {
        let prior = self
            .db
            .get_checkpoint(thread_id, user_id)?
            .map(|state| state.messages)
            .unwrap_or_default();

        let priming = priming_messages();
        let mut window = reduce_window(&prior, seed);
        let tool_defs = self.registry.tool_definitions().await;

        let mut data: Option<ToolReply> = None;
        let mut dispatches: Vec<ToolDispatch> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut final_content = String::new();

        for iteration in 0..self.max_iterations {
            let mut visible = priming.clone();
            visible.extend(window.iter().cloned());

            tracing::info!(
                "Model call {} - thread: {}, window: {} messages",
                iteration + 1,
                thread_id,
                window.len()
            );

            let reply = self.model.invoke(&visible, &tool_defs).await?;
            if let Some(u) = reply.usage {
                usage.input_tokens += u.input_tokens;
                usage.output_tokens += u.output_tokens;
                tracing::info!(
                    "Tokens - input: {}, output: {}",
                    u.input_tokens,
                    u.output_tokens
                );
            }

            let assistant = markup::normalize_assistant_message(reply.message);
            final_content = assistant.content_str().to_string();

            if !assistant.has_tool_calls() {
                window = reduce_window(&window, &[assistant]);
                return Ok(RunOutcome {
                    final_content,
                    window,
                    data,
                    dispatches,
                    usage,
                });
            }

            let mut tool_messages = Vec::new();
            if let Some(calls) = &assistant.tool_calls {
                for call in calls {
                    let arguments = serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|e| {
                            tracing::warn!(
                                "Unparseable arguments for {}: {}",
                                call.function.name,
                                e
                            );
                            serde_json::json!({})
                        });

                    let dispatch = self
                        .registry
                        .dispatch(&ToolCallRequest {
                            id: call.id.clone(),
                            name: call.function.name.clone(),
                            arguments,
                        })
                        .await;

                    tool_messages.push(Message::tool(
                        dispatch.content.clone(),
                        dispatch.tool_call_id.clone(),
                    ));

                    if let Some(reply) = &dispatch.reply {
                        match reply {
                            // An image lookup that came back empty carries no payload
                            ToolReply::Image { image_url, .. } if image_url.is_empty() => {}
                            r if r.is_structured() => data = Some(r.clone()),
                            _ => {}
                        }
                    }
                    dispatches.push(dispatch);
                }
            }

            let mut appended = vec![assistant];
            appended.extend(tool_messages);
            window = reduce_window(&window, &appended);
        }

        tracing::warn!(
            "Iteration cap ({}) reached for thread {}; finalizing with last content",
            self.max_iterations,
            thread_id
        );
        Ok(RunOutcome {
            final_content,
            window,
            data,
            dispatches,
            usage,
        })
    }

    fn persist_assistant_turn(&self, user_id: &str, thread_id: &str, response: &ChatResponse) {
        let data_json = response
            .data
            .as_ref()
            .and_then(|d| serde_json::to_string(d).ok());

        let chart_type = response
            .data
            .as_ref()
            .and_then(|d| d.get("chart_type"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let image_url = response
            .data
            .as_ref()
            .and_then(|d| d.get("image_url"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let kind = response.kind_str();
        let table_data = if kind == "table" { data_json.as_deref() } else { None };

        if let Err(e) = self.db.save_chat_message(&NewChatMessage {
            user_id,
            thread_id,
            role: "assistant",
            content: &response.message,
            response_type: kind,
            chart_type: if kind == "chart" { chart_type.as_deref() } else { None },
            table_data,
            source: response.source.as_deref(),
            image_url: if kind == "image" { image_url.as_deref() } else { None },
        }) {
            tracing::error!("Failed to persist assistant turn: {}", e);
        }
    }

    /// Drop the ephemeral checkpoint for a conversation. The durable chat log
    /// is untouched; use `clear_history` for that.
    pub fn clear_memory(&self, thread_id: &str, user_id: &str) -> Result<()> {
        self.db.clear_checkpoint(thread_id, user_id)
    }

    /// Delete the durable chat log for a conversation, returning the number
    /// of removed entries. Checkpoint state is untouched.
    pub fn clear_history(&self, user_id: &str, thread_id: &str) -> Result<usize> {
        self.db.clear_chat_history(user_id, thread_id)
    }

    pub fn memory_stats(&self, thread_id: &str, user_id: &str) -> Result<MemoryStats> {
        let messages = self
            .db
            .get_checkpoint(thread_id, user_id)?
            .map(|state| state.messages)
            .unwrap_or_default();

        let user_messages = messages.iter().filter(|m| m.role == "user").count();
        let assistant_messages = messages.iter().filter(|m| m.role == "assistant").count();

        Ok(MemoryStats {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
            total_messages: messages.len(),
            user_messages,
            assistant_messages,
            status: if messages.is_empty() { "empty" } else { "active" }.to_string(),
        })
    }
}

/// Keyword heuristic over the serialized tool-result content. Not semantic:
/// a result "means something" when it lacks the known empty/failure markers.
fn is_meaningful(content: &str) -> bool {
    let lower = content.to_lowercase();
    !lower.contains("no relevant campaign documents found")
        && !lower.contains("not found")
        && !lower.contains("error")
}

/// Collapse a completed run into the caller-facing envelope.
///
/// Structured tool output takes precedence over the model's prose. With only
/// text results, the model's answer survives when at least one tool result
/// was meaningful; otherwise the fixed fallback replaces it. With no tools
/// run at all, the model's content passes through verbatim, no provenance.
fn finalize(outcome: &RunOutcome) -> ChatResponse {
    if let Some(reply) = &outcome.data {
        let payload = match serde_json::to_value(reply) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Failed to serialize structured result: {}", e);
                return ChatResponse::error();
            }
        };
        return match reply {
            ToolReply::Table { .. } => ChatResponse::table(payload),
            ToolReply::Chart { .. } => ChatResponse::chart(payload),
            ToolReply::Image { .. } => ChatResponse::image(payload),
            _ => ChatResponse::text(outcome.final_content.clone(), None),
        };
    }

    if outcome.dispatches.is_empty() {
        return ChatResponse::text(outcome.final_content.clone(), None);
    }

    let mut source = None;
    let mut meaningful = false;
    for dispatch in &outcome.dispatches {
        if is_meaningful(&dispatch.content) {
            meaningful = true;
            source = dispatch
                .reply
                .as_ref()
                .and_then(|r| r.source())
                .map(str::to_string);
            break;
        }
    }

    if meaningful {
        ChatResponse::text(outcome.final_content.clone(), source)
    } else {
        ChatResponse::error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{ResponseKind, NO_RELEVANT_INFO_MESSAGE, STRUCTURED_RESULT_MESSAGE};
    use crate::llm::{AssistantReply, LlmFunctionCall, LlmToolCall};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Model stub that plays back a fixed script of replies.
    struct ScriptedModel {
        replies: Mutex<Vec<AssistantReply>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<AssistantReply>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }

        fn plain(content: &str) -> AssistantReply {
            AssistantReply {
                message: Message::assistant(content),
                usage: Some(TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                }),
            }
        }

        fn calling(content: &str, calls: Vec<(&str, serde_json::Value)>) -> AssistantReply {
            let tool_calls = calls
                .into_iter()
                .enumerate()
                .map(|(i, (name, args))| LlmToolCall {
                    id: format!("call_{}_{}", i, name),
                    call_type: "function".to_string(),
                    function: LlmFunctionCall {
                        name: name.to_string(),
                        arguments: args.to_string(),
                    },
                })
                .collect();
            AssistantReply {
                message: Message::assistant_with_tool_calls(content, tool_calls),
                usage: None,
            }
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn invoke(
            &self,
            _messages: &[Message],
            _tools: &[crate::tools::ToolDef],
        ) -> Result<AssistantReply> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                // Scripts that run out behave like a model that keeps asking
                return Ok(ScriptedModel::calling("", vec![("echo", serde_json::json!({}))]));
            }
            Ok(replies.remove(0))
        }
    }

    struct StubTool {
        name: String,
        reply: ToolReply,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "test stub"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolReply> {
            Ok(self.reply.clone())
        }
    }

    struct PanickyTool;

    #[async_trait]
    impl Tool for PanickyTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolReply> {
            anyhow::bail!("backend unreachable")
        }
    }

    async fn agent_with(
        replies: Vec<AssistantReply>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> (Agent, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(AssistantDatabase::new(dir.path().join("test.db")).unwrap());
        let registry = Arc::new(ToolRegistry::new());
        for tool in tools {
            registry.register(tool).await;
        }
        let agent = Agent::new(
            Arc::new(ScriptedModel::new(replies)),
            registry,
            db,
            10,
            10,
        );
        (agent, dir)
    }

    #[tokio::test]
    async fn no_tool_passthrough() {
        let (agent, _dir) = agent_with(
            vec![ScriptedModel::plain("Campaign 101 had 5,000 opens.")],
            vec![],
        )
        .await;

        let response = agent.chat("opens for 101?", "t1", "u1").await;
        assert_eq!(response.kind, ResponseKind::Text);
        assert_eq!(response.message, "Campaign 101 had 5,000 opens.");
        assert!(response.source.is_none());
    }

    #[tokio::test]
    async fn meaningful_text_tool_result_keeps_model_answer_and_source() {
        let stats = StubTool {
            name: "get_campaign_summary_stats".to_string(),
            reply: ToolReply::text(
                "Campaign Summary Statistics: 42 campaigns total",
                "Campaign Database (campaigns table)",
            ),
        };
        let (agent, _dir) = agent_with(
            vec![
                ScriptedModel::calling(
                    "",
                    vec![("get_campaign_summary_stats", serde_json::json!({}))],
                ),
                ScriptedModel::plain("Campaign Summary Statistics: 42 campaigns total"),
            ],
            vec![Arc::new(stats)],
        )
        .await;

        let response = agent
            .chat("Provide summary statistics for all campaigns", "t1", "u1")
            .await;
        assert_eq!(response.kind, ResponseKind::Text);
        assert!(response.message.contains("Campaign Summary Statistics"));
        assert_eq!(
            response.source.as_deref(),
            Some("Campaign Database (campaigns table)")
        );
    }

    #[tokio::test]
    async fn unmeaningful_results_collapse_to_fallback() {
        let docs = StubTool {
            name: "search_documents".to_string(),
            reply: ToolReply::text(
                "No relevant campaign documents found.",
                "Vector Database (no relevant documents)",
            ),
        };
        let (agent, _dir) = agent_with(
            vec![
                ScriptedModel::calling(
                    "",
                    vec![("search_documents", serde_json::json!({"query": "roi"}))],
                ),
                ScriptedModel::plain("I found nothing useful."),
            ],
            vec![Arc::new(docs)],
        )
        .await;

        let response = agent.chat("what's our roi?", "t1", "u1").await;
        assert_eq!(response.kind, ResponseKind::Text);
        assert_eq!(response.message, NO_RELEVANT_INFO_MESSAGE);
        assert!(response.source.is_none());
    }

    #[tokio::test]
    async fn tool_failure_never_escapes_the_loop() {
        let (agent, _dir) = agent_with(
            vec![
                ScriptedModel::calling("", vec![("broken", serde_json::json!({}))]),
                ScriptedModel::plain("Something went sideways."),
            ],
            vec![Arc::new(PanickyTool)],
        )
        .await;

        let response = agent.chat("break please", "t1", "u1").await;
        // The failure text contains "error", so the run collapses to the fallback
        assert_eq!(response.kind, ResponseKind::Text);
        assert_eq!(response.message, NO_RELEVANT_INFO_MESSAGE);
    }

    #[tokio::test]
    async fn unknown_tool_still_completes() {
        let (agent, _dir) = agent_with(
            vec![
                ScriptedModel::calling("", vec![("nonexistent", serde_json::json!({}))]),
                ScriptedModel::plain("Done."),
            ],
            vec![],
        )
        .await;

        let response = agent.chat("use a mystery tool", "t1", "u1").await;
        // The unknown-tool text carries no suppression markers, so the
        // model's follow-up answer survives
        assert_eq!(response.kind, ResponseKind::Text);
        assert_eq!(response.message, "Done.");
        assert!(response.source.is_none());
    }

    #[tokio::test]
    async fn last_structured_result_wins() {
        let text_tool = StubTool {
            name: "get_campaign_by_id".to_string(),
            reply: ToolReply::text("Campaign 101 details", "Campaign Database (campaigns table)"),
        };
        let table_tool = StubTool {
            name: "get_top_campaigns_by_metric".to_string(),
            reply: ToolReply::Table {
                columns: vec!["campaign_id".to_string(), "conversion_rate".to_string()],
                rows: vec![serde_json::json!({"campaign_id": 101, "conversion_rate": 4.2})],
                message: "Top 1 campaigns by conversion_rate:".to_string(),
                source: Some("Campaign Database (campaigns table)".to_string()),
            },
        };
        let (agent, _dir) = agent_with(
            vec![
                ScriptedModel::calling(
                    "",
                    vec![
                        ("get_campaign_by_id", serde_json::json!({"campaign_id": 101})),
                        (
                            "get_top_campaigns_by_metric",
                            serde_json::json!({"metric": "conversion_rate", "limit": 1}),
                        ),
                    ],
                ),
                ScriptedModel::plain("Here is what I found."),
            ],
            vec![Arc::new(text_tool), Arc::new(table_tool)],
        )
        .await;

        let response = agent.chat("top campaign?", "t1", "u1").await;
        assert_eq!(response.kind, ResponseKind::Table);
        assert_eq!(response.message, STRUCTURED_RESULT_MESSAGE);
        let data = response.data.unwrap();
        assert_eq!(data["type"], "table");
        assert_eq!(data["rows"][0]["campaign_id"], 101);
    }

    #[tokio::test]
    async fn chart_result_surfaces_chart_type() {
        let chart_tool = StubTool {
            name: "create_campaign_chart".to_string(),
            reply: ToolReply::Chart {
                chart_type: "trends".to_string(),
                message: "📊 Trends".to_string(),
                source: Some("Chart Generation Tool (Plotly + Campaign Database)".to_string()),
            },
        };
        let (agent, _dir) = agent_with(
            vec![
                ScriptedModel::calling(
                    "",
                    vec![(
                        "create_campaign_chart",
                        serde_json::json!({"chart_type": "trends"}),
                    )],
                ),
                ScriptedModel::plain("Chart created."),
            ],
            vec![Arc::new(chart_tool)],
        )
        .await;

        let response = agent.chat("show me trends", "t1", "u1").await;
        assert_eq!(response.kind, ResponseKind::Chart);
        assert_eq!(response.data.unwrap()["chart_type"], "trends");
    }

    #[tokio::test]
    async fn empty_image_result_is_not_hoisted() {
        let image_tool = StubTool {
            name: "get_campaign_images".to_string(),
            reply: ToolReply::Image {
                image_url: String::new(),
                message: "No images found for campaign 999.".to_string(),
                source: Some("Images".to_string()),
            },
        };
        let (agent, _dir) = agent_with(
            vec![
                ScriptedModel::calling(
                    "",
                    vec![("get_campaign_images", serde_json::json!({"campaign_id": 999}))],
                ),
                ScriptedModel::plain("There are no images."),
            ],
            vec![Arc::new(image_tool)],
        )
        .await;

        let response = agent.chat("images for 999", "t1", "u1").await;
        // "not found"-style message suppresses the answer, and no image
        // envelope is produced for an empty url
        assert_eq!(response.kind, ResponseKind::Text);
    }

    #[tokio::test]
    async fn iteration_cap_stops_a_looping_model() {
        let echo = StubTool {
            name: "echo".to_string(),
            reply: ToolReply::text("still here", "Echo"),
        };
        // Empty script: the stub model then requests tools forever
        let (agent, _dir) = agent_with(vec![], vec![Arc::new(echo)]).await;

        let response = agent.chat("loop forever", "t1", "u1").await;
        assert_eq!(response.kind, ResponseKind::Text);
    }

    #[tokio::test]
    async fn turns_are_persisted_and_replayed_as_text_history() {
        let (agent, _dir) = agent_with(
            vec![
                ScriptedModel::plain("First answer."),
                ScriptedModel::plain("Second answer."),
            ],
            vec![],
        )
        .await;

        agent.chat("first question", "t1", "u1").await;
        agent.chat("second question", "t1", "u1").await;

        let history = agent.db.get_chat_history("u1", "t1", 50).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "first question");
        assert_eq!(history[1].content, "First answer.");
        assert_eq!(history[3].content, "Second answer.");
    }

    #[tokio::test]
    async fn memory_stats_reflect_checkpoint() {
        let (agent, _dir) = agent_with(vec![ScriptedModel::plain("Answer.")], vec![]).await;

        let empty = agent.memory_stats("t1", "u1").unwrap();
        assert_eq!(empty.status, "empty");
        assert_eq!(empty.total_messages, 0);

        agent.chat("a question", "t1", "u1").await;

        let stats = agent.memory_stats("t1", "u1").unwrap();
        assert_eq!(stats.status, "active");
        assert_eq!(stats.user_messages, 1);
        assert_eq!(stats.assistant_messages, 1);

        agent.clear_memory("t1", "u1").unwrap();
        assert_eq!(agent.memory_stats("t1", "u1").unwrap().status, "empty");
        // Durable log survives the memory clear
        assert_eq!(agent.db.get_chat_history("u1", "t1", 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn token_usage_recorded_once_per_run() {
        let (agent, _dir) = agent_with(vec![ScriptedModel::plain("Answer.")], vec![]).await;
        agent.chat("question", "t1", "u1").await;

        let stats = agent.db.get_user_token_stats("u1").unwrap();
        assert_eq!(stats.total_queries, 1);
        assert_eq!(stats.total_input_tokens, 10);
        assert_eq!(stats.total_output_tokens, 5);
    }

    #[test]
    fn meaningful_heuristic_markers() {
        assert!(is_meaningful("Found relevant campaign information"));
        assert!(!is_meaningful("No relevant campaign documents found."));
        assert!(!is_meaningful("Campaign 999 not found: missing"));
        assert!(!is_meaningful("Error executing tool x: boom"));
        assert!(!is_meaningful(r#"{"type":"error","message":"nope"}"#));
    }

    #[test]
    fn priming_sequence_shape() {
        let priming = priming_messages();
        assert_eq!(priming.len(), 6);
        assert_eq!(priming[0].role, "system");
        assert_eq!(priming[1].role, "user");
        assert_eq!(priming[5].role, "system");
        assert!(priming[2].content_str().contains("Campaign Analytics Assistant"));
    }
}
