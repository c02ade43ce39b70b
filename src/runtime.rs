//! Application context: everything built once at startup and passed down.
//!
//! No module-level singletons; the model client, tool registry, and database
//! connection all live here and are shared by `Arc`.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::agent::Agent;
use crate::config::AssistantConfig;
use crate::database::AssistantDatabase;
use crate::llm::OpenAiChatModel;
use crate::tools::campaigns::{
    CampaignsApi, CompareCampaignsById, GetCampaignById, GetCampaignSummaryStats,
    GetCampaignsBySegment, GetCampaignsByTopic, GetTopCampaignsByMetric,
};
use crate::tools::charts::CreateCampaignChart;
use crate::tools::documents::SearchDocuments;
use crate::tools::images::GetCampaignImages;
use crate::tools::ToolRegistry;

pub struct AssistantRuntime {
    pub config: AssistantConfig,
    pub agent: Arc<Agent>,
    pub db: Arc<AssistantDatabase>,
    pub registry: Arc<ToolRegistry>,
}

impl AssistantRuntime {
    pub async fn bootstrap(config: AssistantConfig) -> Result<Self> {
        let db = Arc::new(
            AssistantDatabase::new(&config.database_path)
                .with_context(|| format!("Failed to open database at {}", config.database_path))?,
        );

        let registry = Arc::new(ToolRegistry::new());
        register_builtin_tools(&registry, &config).await;

        let model = Arc::new(OpenAiChatModel::new(&config));

        let agent = Arc::new(Agent::new(
            model,
            registry.clone(),
            db.clone(),
            config.history_limit,
            config.max_iterations,
        ));

        tracing::info!(
            "Runtime ready - model: {}, tools: {}",
            config.llm_model,
            registry.list_names().await.len()
        );

        Ok(Self {
            config,
            agent,
            db,
            registry,
        })
    }
}

async fn register_builtin_tools(registry: &ToolRegistry, config: &AssistantConfig) {
    let api = Arc::new(CampaignsApi::new(config));

    registry.register(Arc::new(SearchDocuments::new(config))).await;
    registry.register(Arc::new(GetCampaignById::new(api.clone()))).await;
    registry
        .register(Arc::new(GetTopCampaignsByMetric::new(api.clone())))
        .await;
    registry
        .register(Arc::new(GetCampaignsByTopic::new(api.clone())))
        .await;
    registry
        .register(Arc::new(GetCampaignsBySegment::new(api.clone())))
        .await;
    registry
        .register(Arc::new(GetCampaignSummaryStats::new(api.clone())))
        .await;
    registry
        .register(Arc::new(CompareCampaignsById::new(api)))
        .await;
    registry.register(Arc::new(CreateCampaignChart)).await;
    registry
        .register(Arc::new(GetCampaignImages::new(config)))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_registers_the_full_tool_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AssistantConfig::default();
        config.database_path = dir
            .path()
            .join("runtime.db")
            .to_string_lossy()
            .into_owned();

        let runtime = AssistantRuntime::bootstrap(config).await.unwrap();
        let mut names = runtime.registry.list_names().await;
        names.sort();
        assert_eq!(
            names,
            vec![
                "compare_campaigns_by_id",
                "create_campaign_chart",
                "get_campaign_by_id",
                "get_campaign_images",
                "get_campaign_summary_stats",
                "get_campaigns_by_segment",
                "get_campaigns_by_topic",
                "get_top_campaigns_by_metric",
                "search_documents",
            ]
        );
    }
}
