//! Chart selection tool.
//!
//! The assistant never renders charts; it only picks one of the known chart
//! types and hands the choice to the UI through a structured chart reply.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolReply};

const CHART_SOURCE: &str = "Chart Generation Tool (Plotly + Campaign Database)";

pub const AVAILABLE_CHARTS: [&str; 4] = [
    "audience_by_topic",
    "conversion_rate",
    "segment_performance",
    "trends",
];

/// "audience_by_topic" -> "Audience By Topic"
fn title_case(chart_type: &str) -> String {
    chart_type
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct CreateCampaignChart;

#[async_trait]
impl Tool for CreateCampaignChart {
    fn name(&self) -> &str {
        "create_campaign_chart"
    }

    fn description(&self) -> &str {
        "Create and display a chart for campaign data visualization. \
         Available chart types: \
         audience_by_topic (bar chart of audience volume by campaign topic), \
         conversion_rate (bar chart of top campaigns by conversion rate), \
         segment_performance (bar chart of performance by customer segment), \
         trends (line chart of performance trends over time)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chart_type": {
                    "type": "string",
                    "enum": AVAILABLE_CHARTS,
                    "description": "Which chart to display"
                }
            },
            "required": ["chart_type"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolReply> {
        let chart_type = args["chart_type"].as_str().unwrap_or("");
        tracing::info!("Creating chart: {}", chart_type);

        if !AVAILABLE_CHARTS.contains(&chart_type) {
            return Ok(ToolReply::Error {
                message: format!(
                    "Invalid chart type. Available types: {}",
                    AVAILABLE_CHARTS.join(", ")
                ),
                source: Some("Chart Generation Tool".to_string()),
            });
        }

        Ok(ToolReply::Chart {
            chart_type: chart_type.to_string(),
            message: format!("📊 {}", title_case(chart_type)),
            source: Some(CHART_SOURCE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn valid_chart_type_returns_chart_reply() {
        let reply = CreateCampaignChart
            .execute(json!({"chart_type": "trends"}))
            .await
            .unwrap();
        match reply {
            ToolReply::Chart { chart_type, message, .. } => {
                assert_eq!(chart_type, "trends");
                assert_eq!(message, "📊 Trends");
            }
            other => panic!("expected chart reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_chart_type_lists_available() {
        let reply = CreateCampaignChart
            .execute(json!({"chart_type": "pie_of_everything"}))
            .await
            .unwrap();
        assert!(matches!(reply, ToolReply::Error { .. }));
        assert!(reply.message().contains("audience_by_topic"));
        assert!(reply.message().contains("trends"));
    }

    #[test]
    fn titles_are_humanized() {
        assert_eq!(title_case("audience_by_topic"), "Audience By Topic");
        assert_eq!(title_case("trends"), "Trends");
    }
}
