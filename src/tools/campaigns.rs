//! Tools backed by the campaigns REST service.
//!
//! Every tool folds API failures into a reply with a "Campaign Database
//! (API error)" source instead of returning Err, so the model can read the
//! failure and retry or rephrase.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolReply};
use crate::config::AssistantConfig;

const DB_SOURCE: &str = "Campaign Database (campaigns table)";
const API_ERROR_SOURCE: &str = "Campaign Database (API error)";

/// Shared client for the campaigns CRUD API.
pub struct CampaignsApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CampaignsApi {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.campaigns_api_url.trim_end_matches('/').to_string(),
            api_key: config.campaigns_api_key.clone(),
        }
    }

    /// GET an endpoint, folding every failure mode into an error string.
    async fn get(&self, endpoint: &str) -> std::result::Result<Value, String> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut req = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body["detail"].as_str().map(str::to_string))
                .unwrap_or_else(|| format!("API error (status {})", status.as_u16()));
            return Err(detail);
        }

        response.json().await.map_err(|e| e.to_string())
    }
}

fn text(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or("unknown").to_string()
}

fn num(value: &Value, key: &str) -> i64 {
    value[key].as_i64().unwrap_or(0)
}

fn rate(value: &Value, key: &str) -> f64 {
    value[key].as_f64().unwrap_or(0.0)
}

/// Thousands separators for counts, matching the dashboard's display format.
fn with_commas(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

pub struct GetCampaignById {
    api: Arc<CampaignsApi>,
}

impl GetCampaignById {
    pub fn new(api: Arc<CampaignsApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetCampaignById {
    fn name(&self) -> &str {
        "get_campaign_by_id"
    }

    fn description(&self) -> &str {
        "Get structured campaign data from the database for a specific campaign ID. \
         Use this when users ask for specific metrics, numbers, or structured data \
         about a campaign (opens, clicks, conversion rates, audience size, etc.)."
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
        tracing::info!("Getting campaign details for ID: {}", campaign_id);

        match self.api.get(&format!("/campaigns/{}", campaign_id)).await {
            Ok(c) => Ok(ToolReply::text(
                format!(
                    "Campaign {} Details:\n\
                     - Topic: {}\n\
                     - Date: {}\n\
                     - Customer Segment: {}\n\
                     - Audience Size: {}\n\
                     - Sent: {}\n\
                     - Opens: {}\n\
                     - Clicks: {}\n\
                     - Conversions: {}\n\
                     - Open Rate: {}%\n\
                     - Click Rate: {}%\n\
                     - Conversion Rate: {}%",
                    campaign_id,
                    text(&c, "campaign_topic"),
                    text(&c, "campaign_date"),
                    text(&c, "customer_segment"),
                    with_commas(num(&c, "audience_size")),
                    with_commas(num(&c, "sent")),
                    with_commas(num(&c, "opens")),
                    with_commas(num(&c, "clicks")),
                    with_commas(num(&c, "conversions")),
                    rate(&c, "open_rate"),
                    rate(&c, "click_rate"),
                    rate(&c, "conversion_rate"),
                ),
                DB_SOURCE,
            )),
            Err(e) => Ok(ToolReply::text(
                format!("Campaign {} not found: {}", campaign_id, e),
                API_ERROR_SOURCE,
            )),
        }
    }
}

pub struct GetTopCampaignsByMetric {
    api: Arc<CampaignsApi>,
}

impl GetTopCampaignsByMetric {
    pub fn new(api: Arc<CampaignsApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetTopCampaignsByMetric {
    fn name(&self) -> &str {
        "get_top_campaigns_by_metric"
    }

    fn description(&self) -> &str {
        "Get top performing campaigns by a specific metric and return as a table. \
         Use this when users ask for \"top campaigns\", \"best performing\", \"rankings\", \
         \"table of campaigns\", or want to compare campaigns by a specific metric."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "metric": {
                    "type": "string",
                    "description": "Metric to rank by (opens, clicks, conversion_rate, ...)"
                },
                "limit": {
                    "type": "integer",
                    "description": "How many campaigns to return (default 5)"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolReply> {
        let metric = match args["metric"].as_str() {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => "opens".to_string(),
        };
        let limit = args["limit"].as_i64().unwrap_or(5);
        tracing::info!("Getting top {} campaigns by {}", limit, metric);

        match self
            .api
            .get(&format!("/campaigns/top/{}?limit={}", metric, limit))
            .await
        {
            Ok(data) => {
                let rows: Vec<Value> = data["campaigns"]
                    .as_array()
                    .map(|campaigns| {
                        campaigns
                            .iter()
                            .map(|c| {
                                json!({
                                    "campaign_id": c["campaign_id"],
                                    "campaign_topic": c["campaign_topic"],
                                    "customer_segment": c["customer_segment"],
                                    "conversion_rate": c["conversion_rate"],
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(ToolReply::Table {
                    columns: vec![
                        "campaign_id".to_string(),
                        "campaign_topic".to_string(),
                        "customer_segment".to_string(),
                        "conversion_rate".to_string(),
                    ],
                    rows,
                    message: format!(
                        "Top {} campaigns by {}:",
                        data["limit"].as_i64().unwrap_or(limit),
                        data["metric"].as_str().unwrap_or(&metric)
                    ),
                    source: Some(DB_SOURCE.to_string()),
                })
            }
            Err(e) => Ok(ToolReply::Error {
                message: format!("Error: {}", e),
                source: Some(API_ERROR_SOURCE.to_string()),
            }),
        }
    }
}

pub struct GetCampaignsByTopic {
    api: Arc<CampaignsApi>,
}

impl GetCampaignsByTopic {
    pub fn new(api: Arc<CampaignsApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetCampaignsByTopic {
    fn name(&self) -> &str {
        "get_campaigns_by_topic"
    }

    fn description(&self) -> &str {
        "Get all campaigns for a specific topic from the database. \
         Use this when users ask about campaigns by topic, theme, or subject."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "Campaign topic to filter by"
                }
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolReply> {
        let topic = args["topic"].as_str().unwrap_or("").to_string();
        tracing::info!("Getting campaigns for topic: {}", topic);

        match self.api.get(&format!("/campaigns/topic/{}", topic)).await {
            Ok(data) => {
                let mut message = format!(
                    "Campaigns for topic '{}' ({} found):\n\n",
                    topic,
                    data["count"].as_i64().unwrap_or(0)
                );
                if let Some(campaigns) = data["campaigns"].as_array() {
                    for c in campaigns {
                        message.push_str(&format!(
                            "Campaign {}:\n  Segment: {}\n  Conversion Rate: {}%\n  \
                             Opens: {}, Clicks: {}, Conversions: {}\n\n",
                            num(c, "campaign_id"),
                            text(c, "customer_segment"),
                            rate(c, "conversion_rate"),
                            with_commas(num(c, "opens")),
                            with_commas(num(c, "clicks")),
                            with_commas(num(c, "conversions")),
                        ));
                    }
                }
                Ok(ToolReply::text(message.trim_end(), DB_SOURCE))
            }
            Err(e) => Ok(ToolReply::text(
                format!("Error retrieving campaigns for topic '{}': {}", topic, e),
                API_ERROR_SOURCE,
            )),
        }
    }
}

pub struct GetCampaignsBySegment {
    api: Arc<CampaignsApi>,
}

impl GetCampaignsBySegment {
    pub fn new(api: Arc<CampaignsApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetCampaignsBySegment {
    fn name(&self) -> &str {
        "get_campaigns_by_segment"
    }

    fn description(&self) -> &str {
        "Get all campaigns for a specific customer segment from the database. \
         Use this when users ask about campaigns by audience, customer type, or segment."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "segment": {
                    "type": "string",
                    "description": "Customer segment to filter by"
                }
            },
            "required": ["segment"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolReply> {
        let segment = args["segment"].as_str().unwrap_or("").to_string();
        tracing::info!("Getting campaigns for segment: {}", segment);

        match self.api.get(&format!("/campaigns/segment/{}", segment)).await {
            Ok(data) => {
                let mut message = format!(
                    "Campaigns for segment '{}' ({} found):\n\n",
                    segment,
                    data["count"].as_i64().unwrap_or(0)
                );
                if let Some(campaigns) = data["campaigns"].as_array() {
                    for c in campaigns {
                        message.push_str(&format!(
                            "Campaign {} ({}):\n  Topic: {}\n  Conversion Rate: {}%\n  \
                             Opens: {}, Clicks: {}, Conversions: {}\n\n",
                            num(c, "campaign_id"),
                            text(c, "campaign_date"),
                            text(c, "campaign_topic"),
                            rate(c, "conversion_rate"),
                            with_commas(num(c, "opens")),
                            with_commas(num(c, "clicks")),
                            with_commas(num(c, "conversions")),
                        ));
                    }
                }
                Ok(ToolReply::text(message.trim_end(), DB_SOURCE))
            }
            Err(e) => Ok(ToolReply::text(
                format!("Error retrieving campaigns for segment '{}': {}", segment, e),
                API_ERROR_SOURCE,
            )),
        }
    }
}

pub struct GetCampaignSummaryStats {
    api: Arc<CampaignsApi>,
}

impl GetCampaignSummaryStats {
    pub fn new(api: Arc<CampaignsApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetCampaignSummaryStats {
    fn name(&self) -> &str {
        "get_campaign_summary_stats"
    }

    fn description(&self) -> &str {
        "Get summary statistics for all campaigns from the database. \
         Use this when users ask for overall statistics, averages, totals, or summary data."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<ToolReply> {
        tracing::info!("Getting campaign summary statistics");

        match self.api.get("/campaigns/summary").await {
            Ok(stats) => Ok(ToolReply::text(
                format!(
                    "Campaign Summary Statistics:\n\
                     - Total Campaigns: {}\n\
                     - Average Conversion Rate: {}%\n\
                     - Average Open Rate: {}%\n\
                     - Average Click Rate: {}%\n\
                     - Total Conversions: {}\n\
                     - Total Opens: {}\n\
                     - Total Clicks: {}",
                    with_commas(num(&stats, "total_campaigns")),
                    rate(&stats, "average_conversion_rate"),
                    rate(&stats, "average_open_rate"),
                    rate(&stats, "average_click_rate"),
                    with_commas(num(&stats, "total_conversions")),
                    with_commas(num(&stats, "total_opens")),
                    with_commas(num(&stats, "total_clicks")),
                ),
                DB_SOURCE,
            )),
            Err(e) => Ok(ToolReply::text(
                format!("Error retrieving summary statistics: {}", e),
                API_ERROR_SOURCE,
            )),
        }
    }
}

pub struct CompareCampaignsById {
    api: Arc<CampaignsApi>,
}

impl CompareCampaignsById {
    pub fn new(api: Arc<CampaignsApi>) -> Self {
        Self { api }
    }

    fn describe(c: &Value) -> String {
        format!(
            "Campaign {} ({}):\n  Segment: {}\n  Conversion Rate: {}%\n  \
             Open Rate: {}%\n  Click Rate: {}%\n  \
             Opens: {}, Clicks: {}, Conversions: {}\n  Audience: {}",
            num(c, "campaign_id"),
            text(c, "campaign_topic"),
            text(c, "customer_segment"),
            rate(c, "conversion_rate"),
            rate(c, "open_rate"),
            rate(c, "click_rate"),
            with_commas(num(c, "opens")),
            with_commas(num(c, "clicks")),
            with_commas(num(c, "conversions")),
            with_commas(num(c, "audience_size")),
        )
    }
}

#[async_trait]
impl Tool for CompareCampaignsById {
    fn name(&self) -> &str {
        "compare_campaigns_by_id"
    }

    fn description(&self) -> &str {
        "Compare two campaigns side by side from the database. \
         Use this when users want to compare two specific campaigns or see differences."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "campaign_id1": {
                    "type": "integer",
                    "description": "First campaign ID"
                },
                "campaign_id2": {
                    "type": "integer",
                    "description": "Second campaign ID"
                }
            },
            "required": ["campaign_id1", "campaign_id2"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolReply> {
        let id1 = args["campaign_id1"].as_i64().unwrap_or(0);
        let id2 = args["campaign_id2"].as_i64().unwrap_or(0);
        tracing::info!("Comparing campaigns {} and {}", id1, id2);

        match self.api.get(&format!("/campaigns/compare/{}/{}", id1, id2)).await {
            Ok(data) => Ok(ToolReply::text(
                format!(
                    "Campaign Comparison:\n{} vs {}\n\n{}\n\n{}",
                    id1,
                    id2,
                    Self::describe(&data["campaign_1"]),
                    Self::describe(&data["campaign_2"]),
                ),
                DB_SOURCE,
            )),
            Err(e) => Ok(ToolReply::text(
                format!("Error comparing campaigns: {}", e),
                API_ERROR_SOURCE,
            )),
        }
    }
}
