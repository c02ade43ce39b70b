//! Document retrieval tool backed by the vector search service.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolReply};
use crate::config::AssistantConfig;

const RESULT_LIMIT: usize = 3;

#[derive(Debug, Deserialize)]
struct SearchHit {
    text: String,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    documents: Vec<SearchHit>,
}

pub struct SearchDocuments {
    client: reqwest::Client,
    base_url: String,
}

impl SearchDocuments {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.docs_api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Tool for SearchDocuments {
    fn name(&self) -> &str {
        "search_documents"
    }

    fn description(&self) -> &str {
        "Search for campaign information in uploaded documents. \
         Use this for executive summaries, performance insights, and recommendations \
         from uploaded documents."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search the campaign documents for"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolReply> {
        let query = args["query"].as_str().unwrap_or("");
        tracing::info!("Searching campaign documents");

        let url = format!("{}/search", self.base_url);
        let response = match self
            .client
            .post(&url)
            .json(&json!({"query": query, "limit": RESULT_LIMIT}))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Document search failed: {}", e);
                return Ok(ToolReply::Text {
                    message: format!("Error: Document search failed - {}", e),
                    source: None,
                });
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!("Document search failed with status {}", status);
            return Ok(ToolReply::Text {
                message: format!("Error: Document search failed - status {}", status),
                source: None,
            });
        }

        let results: SearchResponse = match response.json().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Document search returned malformed body: {}", e);
                return Ok(ToolReply::Text {
                    message: format!("Error: Document search failed - {}", e),
                    source: None,
                });
            }
        };

        let hits: Vec<&SearchHit> = results
            .documents
            .iter()
            .filter(|hit| !hit.text.trim().is_empty())
            .collect();

        if hits.is_empty() {
            tracing::info!("No documents met similarity threshold");
            return Ok(ToolReply::text(
                "No relevant campaign documents found.",
                "Vector Database (no relevant documents)",
            ));
        }

        tracing::info!("Found {} relevant documents", hits.len());
        let context = hits
            .iter()
            .map(|hit| hit.text.trim())
            .collect::<Vec<_>>()
            .join("\n");

        // Deduplicate source names, keeping first-seen order
        let mut sources: Vec<String> = Vec::new();
        for hit in &hits {
            let name = hit.source.clone().unwrap_or_else(|| "Unknown document".to_string());
            if !sources.contains(&name) {
                sources.push(name);
            }
        }

        Ok(ToolReply::text(
            format!("Found relevant campaign information:\n\n{}", context),
            format!("Vector Database ({})", sources.join(", ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_query() {
        let config = AssistantConfig::default();
        let tool = SearchDocuments::new(&config);
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"][0], "query");
    }

    #[tokio::test]
    async fn unreachable_service_folds_into_error_text() {
        let mut config = AssistantConfig::default();
        config.docs_api_url = "http://127.0.0.1:9".to_string();
        let tool = SearchDocuments::new(&config);

        let reply = tool.execute(json!({"query": "roi"})).await.unwrap();
        assert!(reply.message().starts_with("Error: Document search failed"));
        assert!(reply.source().is_none());
    }
}
