//! Visualization payload schema and its empty default.
//!
//! Decoded payloads are kept as raw JSON so fields the model adds beyond the
//! schema reach the frontend untouched. The typed structs below are the
//! schema; their `Default` is the fallback object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chart types named in the prompt contract. Decoding does not validate against this list.
pub const CHART_TYPES: [&str; 6] = [
    "LineChart",
    "BarChart",
    "ScatterChart",
    "AreaChart",
    "PieChart",
    "ComposedChart",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationPayload {
    pub recommendations: Vec<ChartRecommendation>,
    pub data_quality_metrics: DataQualityMetrics,
    pub statistical_summary: StatisticalSummary,
    pub business_insights: BusinessInsights,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRecommendation {
    pub chart_type: String,
    pub title: String,
    pub description: String,
    pub x_axis: String,
    pub y_axis: String,
    pub x_axis_label: String,
    pub y_axis_label: String,
}

/// Scores are whole percentages, 0-100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityMetrics {
    pub completeness: u8,
    pub consistency: u8,
    pub accuracy: u8,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticalSummary {
    pub key_metrics: Vec<Value>,
    pub trends: Vec<String>,
    pub correlations: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessInsights {
    pub opportunities: Vec<String>,
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
}

/// The object substituted whenever the visualization block cannot be parsed.
pub fn empty_visualizations() -> Value {
    serde_json::to_value(VisualizationPayload::default()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_default_shape() {
        let expected = serde_json::json!({
            "recommendations": [],
            "dataQualityMetrics": {"completeness": 0, "consistency": 0, "accuracy": 0, "issues": []},
            "statisticalSummary": {"keyMetrics": [], "trends": [], "correlations": []},
            "businessInsights": {"opportunities": [], "risks": [], "recommendations": []}
        });
        assert_eq!(empty_visualizations(), expected);
    }

    #[test]
    fn test_empty_default_has_every_section() {
        let value = empty_visualizations();
        for key in [
            "recommendations",
            "dataQualityMetrics",
            "statisticalSummary",
            "businessInsights",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["recommendations"], serde_json::json!([]));
    }

    #[test]
    fn test_recommendation_field_names() {
        let rec = ChartRecommendation {
            chart_type: "BarChart".into(),
            x_axis: "month".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["chartType"], "BarChart");
        assert_eq!(json["xAxis"], "month");
        assert!(json.get("yAxisLabel").is_some());
    }
}
