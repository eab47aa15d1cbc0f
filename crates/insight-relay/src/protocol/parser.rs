//! Reply decoding.
//!
//! `decode_analysis` is a sequential match over the marker contract:
//! analysis marker (required) -> analysis span -> visualization marker
//! (optional) -> JSON object, optionally opened by a code fence. Only a
//! missing analysis marker is fatal; every visualization problem degrades to
//! the empty default and is reported through [`VisualizationStatus`].

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::visualization::empty_visualizations;
use super::{ANALYSIS_MARKER, VISUALIZATION_MARKER};
use crate::error::AnalysisError;
use crate::utils::TextUtils;

/// Characters of an offending reply echoed back in `FormatError` details.
pub const FORMAT_EXCERPT_CHARS: usize = 100;

lazy_static! {
    static ref LEADING_FENCE: Regex = Regex::new(r"\A\s*```[A-Za-z]*").unwrap();
}

/// Why the visualization block was replaced by the empty default.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VisualizationError {
    #[error("visualization marker not found")]
    MissingMarker,
    #[error("no JSON object found after visualization marker")]
    NoJsonObject,
    #[error("visualization JSON is invalid: {0}")]
    InvalidJson(String),
}

impl VisualizationError {
    pub fn reason(&self) -> &'static str {
        match self {
            VisualizationError::MissingMarker => "missing_marker",
            VisualizationError::NoJsonObject => "no_json_object",
            VisualizationError::InvalidJson(_) => "invalid_json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisualizationStatus {
    Parsed,
    Fallback(VisualizationError),
    /// Follow-up turns carry no visualization block.
    NotRequested,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedReply {
    pub analysis: String,
    /// Always `Some` for fresh analyses, `None` for follow-up turns.
    pub visualizations: Option<Value>,
    pub status: VisualizationStatus,
}

/// Decode a fresh-analysis reply.
pub fn decode_analysis(reply: &str) -> Result<DecodedReply, AnalysisError> {
    let body = reply.trim_start();
    let Some(after_marker) = body.strip_prefix(ANALYSIS_MARKER) else {
        warn!("Reply does not start with {}", ANALYSIS_MARKER);
        return Err(AnalysisError::Format {
            excerpt: TextUtils::first_chars(reply, FORMAT_EXCERPT_CHARS).to_string(),
        });
    };

    let (analysis, visualizations) = match after_marker.find(VISUALIZATION_MARKER) {
        Some(pos) => {
            let section = &after_marker[pos + VISUALIZATION_MARKER.len()..];
            (after_marker[..pos].trim(), parse_visualization_section(section))
        }
        None => (after_marker.trim(), Err(VisualizationError::MissingMarker)),
    };

    let (visualizations, status) = match visualizations {
        Ok(value) => (value, VisualizationStatus::Parsed),
        Err(e) => {
            warn!("Falling back to empty visualizations: {}", e);
            (empty_visualizations(), VisualizationStatus::Fallback(e))
        }
    };

    debug!(
        "Decoded analysis ({} chars), visualization status: {:?}",
        analysis.len(),
        status
    );

    Ok(DecodedReply {
        analysis: analysis.to_string(),
        visualizations: Some(visualizations),
        status,
    })
}

/// Decode a follow-up reply: the text is passed through verbatim.
pub fn decode_follow_up(reply: &str) -> DecodedReply {
    DecodedReply {
        analysis: reply.to_string(),
        visualizations: None,
        status: VisualizationStatus::NotRequested,
    }
}

fn parse_visualization_section(section: &str) -> Result<Value, VisualizationError> {
    // Only the opening fence is removed; a closing fence sits after the
    // balanced span and fence text inside string values must survive.
    let unfenced = LEADING_FENCE.replace(section, "");
    let span = first_json_object(&unfenced).ok_or(VisualizationError::NoJsonObject)?;
    serde_json::from_str(span).map_err(|e| VisualizationError::InvalidJson(e.to_string()))
}

/// The first balanced `{...}` span, skipping braces inside string literals.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn well_formed(analysis: &str, vis: &Value) -> String {
        format!("{}\n{}\n{}\n{}", ANALYSIS_MARKER, analysis, VISUALIZATION_MARKER, vis)
    }

    #[test]
    fn test_decode_well_formed_reply() {
        let vis = json!({
            "recommendations": [{"chartType": "BarChart", "xAxis": "region", "yAxis": "sales"}],
            "dataQualityMetrics": {"completeness": 98},
            "statisticalSummary": {},
            "businessInsights": {}
        });
        let decoded = decode_analysis(&well_formed("  Sales grew 12%.  ", &vis)).unwrap();
        assert_eq!(decoded.analysis, "Sales grew 12%.");
        assert_eq!(decoded.visualizations, Some(vis));
        assert_eq!(decoded.status, VisualizationStatus::Parsed);
    }

    #[test]
    fn test_decode_strips_code_fences() {
        let reply = "---ANALYSIS---\nText\n---VISUALIZATION---\n```json\n{\"recommendations\": []}\n```\n";
        let decoded = decode_analysis(reply).unwrap();
        assert_eq!(decoded.visualizations, Some(json!({"recommendations": []})));

        let bare = "---ANALYSIS---\nText\n---VISUALIZATION---\n```\n{\"a\": 1}\n```";
        assert_eq!(decode_analysis(bare).unwrap().visualizations, Some(json!({"a": 1})));
    }

    #[test]
    fn test_fence_text_inside_json_string_is_preserved() {
        let vis = json!({"recommendations": [], "note": "wrap code in ```sql blocks"});
        let decoded = decode_analysis(&well_formed("Text", &vis)).unwrap();
        assert_eq!(decoded.visualizations, Some(vis.clone()));

        let fenced = format!(
            "{}\nText\n{}\n```json\n{}\n```\n",
            ANALYSIS_MARKER, VISUALIZATION_MARKER, vis
        );
        assert_eq!(decode_analysis(&fenced).unwrap().visualizations, Some(vis));
    }

    #[test]
    fn test_decode_ignores_trailing_prose_after_json() {
        let reply = "---ANALYSIS---\nText\n---VISUALIZATION---\nHere you go: {\"a\": {\"b\": \"}\"}} hope it helps {";
        let decoded = decode_analysis(reply).unwrap();
        assert_eq!(decoded.visualizations, Some(json!({"a": {"b": "}"}})));
    }

    #[test]
    fn test_missing_visualization_marker_falls_back() {
        let decoded = decode_analysis("---ANALYSIS---\n  Only prose here.\n").unwrap();
        assert_eq!(decoded.analysis, "Only prose here.");
        assert_eq!(decoded.visualizations, Some(empty_visualizations()));
        assert_eq!(
            decoded.status,
            VisualizationStatus::Fallback(VisualizationError::MissingMarker)
        );
    }

    #[test]
    fn test_invalid_json_falls_back_without_touching_analysis() {
        let reply = "---ANALYSIS---\nRevenue is flat.\n---VISUALIZATION---\n{\"recommendations\": [,]}";
        let decoded = decode_analysis(reply).unwrap();
        assert_eq!(decoded.analysis, "Revenue is flat.");
        assert_eq!(decoded.visualizations, Some(empty_visualizations()));
        assert!(matches!(
            decoded.status,
            VisualizationStatus::Fallback(VisualizationError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_no_json_object_falls_back() {
        let decoded = decode_analysis("---ANALYSIS---\nA\n---VISUALIZATION---\nnone today").unwrap();
        assert_eq!(
            decoded.status,
            VisualizationStatus::Fallback(VisualizationError::NoJsonObject)
        );
        assert_eq!(decoded.visualizations, Some(empty_visualizations()));
    }

    #[test]
    fn test_unbalanced_json_falls_back() {
        let decoded = decode_analysis("---ANALYSIS---\nA\n---VISUALIZATION---\n{\"a\": {\"b\": 1}").unwrap();
        assert_eq!(
            decoded.status,
            VisualizationStatus::Fallback(VisualizationError::NoJsonObject)
        );
    }

    #[test]
    fn test_missing_analysis_marker_is_format_error() {
        let reply = format!("Sure! {}", "x".repeat(300));
        match decode_analysis(&reply) {
            Err(AnalysisError::Format { excerpt }) => {
                assert_eq!(excerpt.chars().count(), FORMAT_EXCERPT_CHARS);
                assert!(excerpt.starts_with("Sure! "));
            }
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_leading_whitespace_before_marker_is_tolerated() {
        let decoded = decode_analysis("\n\n---ANALYSIS---\nok").unwrap();
        assert_eq!(decoded.analysis, "ok");
    }

    #[test]
    fn test_unknown_chart_type_passes_through() {
        let vis = json!({"recommendations": [{"chartType": "RadarChart"}]});
        let decoded = decode_analysis(&well_formed("a", &vis)).unwrap();
        assert_eq!(
            decoded.visualizations.unwrap()["recommendations"][0]["chartType"],
            "RadarChart"
        );
    }

    #[test]
    fn test_follow_up_is_identity() {
        let decoded = decode_follow_up("  Anything goes ---ANALYSIS--- here ");
        assert_eq!(decoded.analysis, "  Anything goes ---ANALYSIS--- here ");
        assert_eq!(decoded.visualizations, None);
        assert_eq!(decoded.status, VisualizationStatus::NotRequested);
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            "[a-zA-Z0-9 {}\"\\\\]{0,12}".prop_map(Value::from),
        ]
    }

    fn json_object() -> impl Strategy<Value = Value> {
        let nested = json_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                prop::collection::btree_map("[a-zA-Z]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        });
        prop::collection::btree_map("[a-zA-Z]{1,10}", nested, 0..5)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn prop_well_formed_round_trip(analysis in "[a-zA-Z0-9 .,\n]{0,200}", vis in json_object()) {
            let decoded = decode_analysis(&well_formed(&analysis, &vis)).unwrap();
            prop_assert_eq!(decoded.analysis, analysis.trim());
            prop_assert_eq!(decoded.visualizations, Some(vis));
        }

        #[test]
        fn prop_missing_marker_never_fails(analysis in "[a-zA-Z0-9 .,\n{}]{0,200}") {
            let decoded = decode_analysis(&format!("{}{}", ANALYSIS_MARKER, analysis)).unwrap();
            prop_assert_eq!(decoded.analysis, analysis.trim());
            prop_assert_eq!(decoded.visualizations, Some(empty_visualizations()));
        }

        #[test]
        fn prop_invalid_json_keeps_analysis(analysis in "[a-zA-Z0-9 .,]{0,100}", junk in "[a-z:,\\[ ]{0,40}") {
            let reply = format!("{}{}{}{{{},}}", ANALYSIS_MARKER, analysis, VISUALIZATION_MARKER, junk);
            let decoded = decode_analysis(&reply).unwrap();
            prop_assert_eq!(decoded.analysis, analysis.trim());
            prop_assert_eq!(decoded.visualizations, Some(empty_visualizations()));
        }

        #[test]
        fn prop_unmarked_reply_is_format_error(reply in "[a-zA-Z0-9 .,!]{1,300}") {
            match decode_analysis(&reply) {
                Err(AnalysisError::Format { excerpt }) => {
                    prop_assert_eq!(excerpt, TextUtils::first_chars(&reply, FORMAT_EXCERPT_CHARS));
                }
                other => prop_assert!(false, "expected format error, got {:?}", other),
            }
        }
    }
}
