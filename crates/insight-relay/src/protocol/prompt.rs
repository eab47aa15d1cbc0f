//! Prompt construction for fresh analyses and follow-up turns

use tracing::debug;

use super::visualization::CHART_TYPES;
use super::{ChatTurn, FileType, Role, ANALYSIS_MARKER, VISUALIZATION_MARKER};
use crate::session_store::DataSummary;
use crate::utils::TextUtils;

/// Longest excerpt of the prior analysis restated in follow-up prompts.
pub const ANALYSIS_EXCERPT_CHARS: usize = 500;

const DEFAULT_QUESTION: &str = "Please analyze this dataset.";

/// A fully built request for the LLM client.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalysisPromptInput<'a> {
    pub messages: &'a [ChatTurn],
    pub data: &'a str,
    pub file_type: FileType,
    pub domain: Option<&'a str>,
}

/// Build the prompt for a fresh analysis. The dataset rides on the first user turn.
pub fn analysis_prompt(input: AnalysisPromptInput<'_>, temperature: f32) -> Prompt {
    let mut messages = input.messages.to_vec();
    let dataset_block = format!(
        "\n\nDataset ({}):\n{}",
        input.file_type.label(),
        input.data
    );

    match messages.first_mut() {
        Some(first) if first.role == Role::User => {
            if first.content.trim().is_empty() {
                first.content = DEFAULT_QUESTION.to_string();
            }
            first.content.push_str(&dataset_block);
        }
        _ => messages.insert(0, ChatTurn::user(format!("{}{}", DEFAULT_QUESTION, dataset_block))),
    }

    debug!(
        "Built analysis prompt: {} turns, dataset {} bytes",
        messages.len(),
        input.data.len()
    );

    Prompt {
        system: analysis_system_instruction(input.domain),
        messages,
        temperature,
    }
}

/// Build the prompt for a follow-up turn from the stored session context.
pub fn follow_up_prompt(
    messages: &[ChatTurn],
    summary: &DataSummary,
    initial_analysis: &str,
    temperature: f32,
) -> Prompt {
    let excerpt = TextUtils::truncate_with_ellipsis(initial_analysis, ANALYSIS_EXCERPT_CHARS);
    let sample_rows = if summary.sample_rows.is_empty() {
        "(none)".to_string()
    } else {
        summary.sample_rows.join("\n")
    };

    let system = format!(
        "You are a data analyst continuing a conversation about a dataset you have already analyzed.\n\n\
         Dataset summary: {}\n\
         Columns: {}\n\
         Sample rows:\n{}\n\
         Total rows: {}\n\n\
         Previous analysis (excerpt):\n{}\n\n\
         Answer the user's follow-up questions conversationally. You do not need to use any \
         section markers or JSON; reply in plain prose and refer to the dataset and the previous \
         analysis where helpful.",
        summary.summary, summary.headers, sample_rows, summary.total_rows, excerpt
    );

    Prompt {
        system,
        messages: messages.to_vec(),
        temperature,
    }
}

fn analysis_system_instruction(domain: Option<&str>) -> String {
    let domain_line = match domain.map(str::trim).filter(|d| !d.is_empty()) {
        Some(domain) => format!("The dataset comes from the {} domain; frame insights for that context.\n\n", domain),
        None => String::new(),
    };

    format!(
        "You are an expert data analyst. Analyze the dataset supplied by the user and answer their question.\n\n\
         {domain_line}\
         Your reply MUST follow this exact format:\n\
         1. Start with the line {analysis}\n\
         2. Write the analysis as prose: key findings, patterns, anomalies and caveats.\n\
         3. Then write the line {visualization}\n\
         4. Then write exactly one JSON object and nothing else, with this shape:\n\
         {{\n\
         \x20 \"recommendations\": [\n\
         \x20   {{\"chartType\": \"<one of {charts}>\", \"title\": \"...\", \"description\": \"...\",\n\
         \x20    \"xAxis\": \"<column>\", \"yAxis\": \"<column>\", \"xAxisLabel\": \"...\", \"yAxisLabel\": \"...\"}}\n\
         \x20 ],\n\
         \x20 \"dataQualityMetrics\": {{\"completeness\": 0-100, \"consistency\": 0-100, \"accuracy\": 0-100, \"issues\": [\"...\"]}},\n\
         \x20 \"statisticalSummary\": {{\"keyMetrics\": [{{\"name\": \"...\", \"value\": \"...\"}}], \"trends\": [\"...\"], \"correlations\": [{{\"variables\": [\"...\", \"...\"], \"strength\": \"...\"}}]}},\n\
         \x20 \"businessInsights\": {{\"opportunities\": [\"...\"], \"risks\": [\"...\"], \"recommendations\": [\"...\"]}}\n\
         }}\n\n\
         Use only column names that exist in the dataset for xAxis and yAxis.",
        domain_line = domain_line,
        analysis = ANALYSIS_MARKER,
        visualization = VISUALIZATION_MARKER,
        charts = CHART_TYPES.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> DataSummary {
        DataSummary::from_dataset("region,sales\nnorth,10\nsouth,20")
    }

    #[test]
    fn test_dataset_appended_to_first_user_turn() {
        let turns = vec![
            ChatTurn::user("Which region sells most?"),
            ChatTurn::assistant("Let me look."),
            ChatTurn::user("Also trends?"),
        ];
        let prompt = analysis_prompt(
            AnalysisPromptInput {
                messages: &turns,
                data: "region,sales\nnorth,10",
                file_type: FileType::Csv,
                domain: None,
            },
            0.0,
        );

        assert_eq!(prompt.messages.len(), 3);
        assert!(prompt.messages[0].content.starts_with("Which region sells most?"));
        assert!(prompt.messages[0].content.ends_with("Dataset (CSV):\nregion,sales\nnorth,10"));
        assert_eq!(prompt.messages[1], turns[1]);
        assert_eq!(prompt.messages[2], turns[2]);
        assert_eq!(prompt.temperature, 0.0);
    }

    #[test]
    fn test_user_turn_synthesized_when_missing() {
        let turns = vec![ChatTurn::assistant("Upload a file to begin.")];
        let prompt = analysis_prompt(
            AnalysisPromptInput {
                messages: &turns,
                data: "{}",
                file_type: FileType::Json,
                domain: None,
            },
            0.0,
        );
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role, Role::User);
        assert!(prompt.messages[0].content.starts_with(DEFAULT_QUESTION));
        assert!(prompt.messages[0].content.contains("Dataset (JSON)"));
    }

    #[test]
    fn test_analysis_system_instruction_states_contract() {
        let prompt = analysis_prompt(
            AnalysisPromptInput {
                messages: &[ChatTurn::user("go")],
                data: "a\n1",
                file_type: FileType::Csv,
                domain: Some("retail"),
            },
            0.0,
        );
        assert!(prompt.system.contains(ANALYSIS_MARKER));
        assert!(prompt.system.contains(VISUALIZATION_MARKER));
        assert!(prompt.system.contains("ComposedChart"));
        assert!(prompt.system.contains("retail domain"));
        assert!(prompt.system.contains("\"dataQualityMetrics\""));
    }

    #[test]
    fn test_follow_up_prompt_truncates_prior_analysis() {
        let long_analysis = "a".repeat(2000);
        let turns = vec![ChatTurn::user("What about outliers?")];
        let prompt = follow_up_prompt(&turns, &summary(), &long_analysis, 0.7);

        assert_eq!(prompt.messages, turns);
        assert_eq!(prompt.temperature, 0.7);
        assert!(prompt.system.contains("Columns: region,sales"));
        assert!(prompt.system.contains("north,10\nsouth,20"));
        assert!(prompt.system.contains("Total rows: 2"));
        assert!(!prompt.system.contains(&"a".repeat(ANALYSIS_EXCERPT_CHARS)));
        assert!(prompt.system.contains(&format!("{}...", "a".repeat(ANALYSIS_EXCERPT_CHARS - 3))));
        assert!(!prompt.system.contains(ANALYSIS_MARKER));
    }
}
