//! Dataset synopsis stored with each session

use serde::{Deserialize, Serialize};

use crate::utils::TextUtils;

/// Number of data rows kept as samples.
pub const SAMPLE_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSummary {
    /// The header line, verbatim.
    pub headers: String,
    pub sample_rows: Vec<String>,
    /// Line count minus the header, floored at zero.
    pub total_rows: usize,
    pub summary: String,
}

impl DataSummary {
    pub fn from_dataset(dataset: &str) -> Self {
        let headers = dataset.lines().next().unwrap_or_default().to_string();
        let sample_rows: Vec<String> = dataset
            .lines()
            .skip(1)
            .take(SAMPLE_ROWS)
            .map(str::to_string)
            .collect();
        let total_rows = dataset.lines().count().saturating_sub(1);
        let columns = TextUtils::count_columns(&headers);

        Self {
            summary: format!("Dataset with {} rows and {} columns", total_rows, columns),
            headers,
            sample_rows,
            total_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_small_csv() {
        let summary = DataSummary::from_dataset("a,b\n1,2\n3,4\n5,6\n7,8");
        assert_eq!(summary.headers, "a,b");
        assert_eq!(summary.total_rows, 4);
        assert_eq!(summary.sample_rows, vec!["1,2", "3,4", "5,6"]);
        assert_eq!(summary.summary, "Dataset with 4 rows and 2 columns");
    }

    #[test]
    fn test_summary_of_header_only_and_empty() {
        let header_only = DataSummary::from_dataset("id,name");
        assert_eq!(header_only.total_rows, 0);
        assert!(header_only.sample_rows.is_empty());

        let empty = DataSummary::from_dataset("");
        assert_eq!(empty.headers, "");
        assert_eq!(empty.total_rows, 0);
    }

    #[test]
    fn test_summary_handles_crlf() {
        let summary = DataSummary::from_dataset("x,y\r\n1,2\r\n3,4\r\n");
        assert_eq!(summary.headers, "x,y");
        assert_eq!(summary.sample_rows, vec!["1,2", "3,4"]);
        assert_eq!(summary.total_rows, 2);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let json = serde_json::to_value(DataSummary::from_dataset("a\n1")).unwrap();
        assert_eq!(json["totalRows"], 1);
        assert_eq!(json["sampleRows"], serde_json::json!(["1"]));
    }
}
