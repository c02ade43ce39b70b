//! Campaign image lookup against the asset web server.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolReply};
use crate::config::AssistantConfig;

const IMAGE_SOURCE: &str = "Images";

pub struct GetCampaignImages {
    client: reqwest::Client,
    base_url: String,
    access_key: Option<String>,
}

impl GetCampaignImages {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.web_base_url.trim_end_matches('/').to_string(),
            access_key: config.web_access_key.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetCampaignImages {
    fn name(&self) -> &str {
        "get_campaign_images"
    }

    fn description(&self) -> &str {
        "Get campaign images or assets from the web server that hosts them. \
         Use this when users ask for images or assets related to a specific campaign."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "campaign_id": {
                    "type": "integer",
                    "description": "The numeric campaign ID"
                }
            },
            "required": ["campaign_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolReply> {
        let campaign_id = args["campaign_id"].as_i64().unwrap_or(0);
        tracing::info!("Fetching images for campaign ID: {}", campaign_id);

        let image_url = format!(
            "{}/images/public/campaign-{}.jpg",
            self.base_url, campaign_id
        );

        let mut req = self.client.get(&image_url);
        if let Some(ref key) = self.access_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        // Probe for existence; the UI fetches the asset itself
        let found = match req.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::error!("Image request failed: {}", e);
                false
            }
        };

        if found {
            Ok(ToolReply::Image {
                image_url,
                message: format!("Images for campaign {}.", campaign_id),
                source: Some(IMAGE_SOURCE.to_string()),
            })
        } else {
            Ok(ToolReply::Image {
                image_url: String::new(),
                message: format!("No images found for campaign {}.", campaign_id),
                source: Some(IMAGE_SOURCE.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_image_returns_empty_url() {
        let mut config = AssistantConfig::default();
        config.web_base_url = "http://127.0.0.1:9".to_string();
        let tool = GetCampaignImages::new(&config);

        let reply = tool.execute(json!({"campaign_id": 101})).await.unwrap();
        match reply {
            ToolReply::Image { image_url, message, .. } => {
                assert!(image_url.is_empty());
                assert_eq!(message, "No images found for campaign 101.");
            }
            other => panic!("expected image reply, got {:?}", other),
        }
    }
}
