use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, MemoryStats};
use crate::database::{AssistantDatabase, ChatLogEntry, TokenUsageRecord, UserTokenStats};
use crate::envelope::ChatResponse;
use crate::runtime::AssistantRuntime;

#[derive(Clone)]
pub struct ServerState {
    pub agent: Arc<Agent>,
    pub db: Arc<AssistantDatabase>,
    pub auth: ApiAuthConfig,
}

#[derive(Debug, Clone)]
pub struct ApiAuthConfig {
    mode: AuthMode,
    token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMode {
    Required,
    Disabled,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    query: String,
    thread_id: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationQuery {
    user_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MemoryRequest {
    thread_id: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecentActivityQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ClearHistoryResponse {
    deleted: usize,
}

#[derive(Debug, Serialize)]
struct ClearMemoryResponse {
    status: &'static str,
    thread_id: String,
    user_id: String,
}

fn default_thread(thread_id: Option<String>) -> String {
    thread_id
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "default".to_string())
}

fn default_user(user_id: Option<String>) -> String {
    user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "anonymous".to_string())
}

pub async fn serve(runtime: AssistantRuntime) -> Result<()> {
    let bind_addr = std::env::var("ASSISTANT_BIND")
        .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
        .parse::<SocketAddr>()
        .context("Invalid ASSISTANT_BIND (expected host:port)")?;

    let auth = load_auth_config()?;

    let state = Arc::new(ServerState {
        agent: runtime.agent.clone(),
        db: runtime.db.clone(),
        auth,
    });

    let protected = Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route(
            "/conversations/:thread_id/messages",
            get(get_conversation_messages).delete(clear_conversation_messages),
        )
        .route("/memory/clear", post(clear_memory))
        .route("/memory/stats", get(memory_stats))
        .route("/tokens/:user_id/stats", get(user_token_stats))
        .route("/tokens/:user_id/recent", get(user_recent_activity))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let app = Router::new().nest("/v1", protected);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind server to {}", bind_addr))?;
    tracing::info!("Campaign assistant listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}

fn load_auth_config() -> Result<ApiAuthConfig> {
    let mode = parse_auth_mode(std::env::var("ASSISTANT_AUTH_MODE").ok())?;
    let token = std::env::var("ASSISTANT_API_TOKEN")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    if mode == AuthMode::Required && token.is_none() {
        return Err(anyhow!(
            "ASSISTANT_API_TOKEN is required when auth mode is 'required'"
        ));
    }
    if mode == AuthMode::Disabled {
        tracing::warn!("Auth mode is disabled; all API routes are unauthenticated");
    }

    Ok(ApiAuthConfig { mode, token })
}

fn parse_auth_mode(raw: Option<String>) -> Result<AuthMode> {
    let normalized = raw
        .unwrap_or_else(|| "required".to_string())
        .trim()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "" | "required" | "on" | "enabled" | "true" => Ok(AuthMode::Required),
        "disabled" | "off" | "false" => Ok(AuthMode::Disabled),
        other => Err(anyhow!(
            "Invalid ASSISTANT_AUTH_MODE '{}'. Expected 'required' or 'disabled'",
            other
        )),
    }
}

async fn auth_middleware(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Result<Response, StatusCode> {
    authorize(&headers, &state.auth)?;
    Ok(next.run(request).await)
}

fn authorize(headers: &HeaderMap, auth: &ApiAuthConfig) -> Result<(), StatusCode> {
    if auth.mode == AuthMode::Disabled {
        return Ok(());
    }
    let Some(token) = auth.token.as_deref() else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Some(raw_header) = headers.get(header::AUTHORIZATION) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let Ok(auth_value) = raw_header.to_str() else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let expected = format!("Bearer {}", token);
    if auth_value.trim() != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn chat(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let thread_id = default_thread(request.thread_id);
    let user_id = default_user(request.user_id);
    let response = state.agent.chat(&request.query, &thread_id, &user_id).await;
    Json(response)
}

async fn get_conversation_messages(
    State(state): State<Arc<ServerState>>,
    Path(thread_id): Path<String>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<ChatLogEntry>>, (StatusCode, String)> {
    let user_id = default_user(query.user_id);
    let limit = query.limit.unwrap_or(50);
    state
        .db
        .get_chat_history(&user_id, &thread_id, limit)
        .map(Json)
        .map_err(internal_error)
}

async fn clear_conversation_messages(
    State(state): State<Arc<ServerState>>,
    Path(thread_id): Path<String>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ClearHistoryResponse>, (StatusCode, String)> {
    let user_id = default_user(query.user_id);
    state
        .agent
        .clear_history(&user_id, &thread_id)
        .map(|deleted| Json(ClearHistoryResponse { deleted }))
        .map_err(internal_error)
}

async fn clear_memory(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<MemoryRequest>,
) -> Result<Json<ClearMemoryResponse>, (StatusCode, String)> {
    let thread_id = default_thread(request.thread_id);
    let user_id = default_user(request.user_id);
    state
        .agent
        .clear_memory(&thread_id, &user_id)
        .map(|_| {
            Json(ClearMemoryResponse {
                status: "success",
                thread_id,
                user_id,
            })
        })
        .map_err(internal_error)
}

async fn memory_stats(
    State(state): State<Arc<ServerState>>,
    Query(request): Query<MemoryRequest>,
) -> Result<Json<MemoryStats>, (StatusCode, String)> {
    let thread_id = default_thread(request.thread_id);
    let user_id = default_user(request.user_id);
    state
        .agent
        .memory_stats(&thread_id, &user_id)
        .map(Json)
        .map_err(internal_error)
}

async fn user_token_stats(
    State(state): State<Arc<ServerState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserTokenStats>, (StatusCode, String)> {
    state
        .db
        .get_user_token_stats(&user_id)
        .map(Json)
        .map_err(internal_error)
}

async fn user_recent_activity(
    State(state): State<Arc<ServerState>>,
    Path(user_id): Path<String>,
    Query(query): Query<RecentActivityQuery>,
) -> Result<Json<Vec<TokenUsageRecord>>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(10);
    state
        .db
        .get_user_recent_activity(&user_id, limit)
        .map(Json)
        .map_err(internal_error)
}

fn internal_error(error: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
}
