//! Typed view of a completed dataset audit.
//!
//! The audit task completes with `{"results": {...}}`. A completed task can
//! still carry a failed audit (`error: true`, an `exception`, or a bare
//! `warning`); [`AuditReport::from_result`] turns those into errors.

use crate::error::{value_text, ErrorDetails, Result, TaskError};
use crate::report::format_bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub column_count: Option<u64>,
    /// Bytes.
    #[serde(default)]
    pub memory_usage: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub std: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub median: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    #[serde(default)]
    pub unique_count: Option<u64>,
    /// Most frequent values with their counts.
    #[serde(default)]
    pub top_values: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    #[serde(default)]
    pub basic_info: Option<BasicInfo>,
    #[serde(default)]
    pub missing_values: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    pub descriptive_stats: Option<BTreeMap<String, ColumnStats>>,
    #[serde(default)]
    pub categorical_stats: Option<BTreeMap<String, CategoricalStats>>,
    #[serde(default)]
    pub warning: Option<String>,
}

impl AuditReport {
    /// Read the `results` of a completed audit task.
    pub fn from_result(result: &Value) -> Result<Self> {
        let results = match result.get("results") {
            Some(results @ Value::Object(_)) => results,
            _ => return Err(TaskError::task_failed("No audit results available")),
        };

        let flag = |key: &str| results.get(key).filter(|v| !v.is_null());
        let failed = results.get("error") == Some(&Value::Bool(true))
            || flag("exception").and_then(value_text).is_some()
            || (flag("warning").and_then(value_text).is_some() && flag("basic_info").is_none());

        if failed {
            let message = ["error", "exception", "warning"]
                .iter()
                .filter_map(|key| results.get(*key).and_then(Value::as_str))
                .find(|text| !text.trim().is_empty())
                .unwrap_or("Audit results report an error")
                .to_string();

            let mut err = TaskError::task_failed(message);
            if let Some(details) = ErrorDetails::from_value(results.clone()) {
                err = err.with_details(details);
            }
            return Err(err);
        }

        serde_json::from_value(results.clone()).map_err(|e| {
            TaskError::invalid_envelope(format!("Unreadable audit results: {}", e))
        })
    }

    /// Sections present in the report, in display order.
    pub fn sections(&self) -> Vec<&'static str> {
        let mut sections = Vec::new();
        if self.basic_info.is_some() {
            sections.push("basic_info");
        }
        if self.missing_values.is_some() {
            sections.push("missing_values");
        }
        if self.descriptive_stats.is_some() {
            sections.push("descriptive_stats");
        }
        if self.categorical_stats.is_some() {
            sections.push("categorical_stats");
        }
        sections
    }

    pub fn total_missing(&self) -> u64 {
        self.missing_values
            .as_ref()
            .map(|m| m.values().sum())
            .unwrap_or(0)
    }

    /// Plain-text rendering for terminals.
    pub fn render(&self) -> String {
        let mut out = String::from("Audit completed");
        let dash = || "-".to_string();
        let num = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_else(dash);

        if let Some(warning) = &self.warning {
            let _ = write!(out, "\nWarning: {}", warning);
        }

        if let Some(info) = &self.basic_info {
            out.push_str("\n\nBasic info:");
            let count = |v: Option<u64>| v.map(|v| v.to_string()).unwrap_or_else(dash);
            let _ = write!(out, "\n  Rows: {}", count(info.row_count));
            let _ = write!(out, "\n  Columns: {}", count(info.column_count));
            let _ = write!(
                out,
                "\n  Memory: {}",
                info.memory_usage.map(format_bytes).unwrap_or_else(dash)
            );
        }

        if let Some(missing) = &self.missing_values {
            out.push_str("\n\nMissing values:");
            for (column, count) in missing {
                let _ = write!(out, "\n  {}: {}", column, count);
            }
        }

        if let Some(stats) = &self.descriptive_stats {
            out.push_str("\n\nDescriptive statistics (mean / std / min / max / median):");
            for (column, s) in stats {
                let _ = write!(
                    out,
                    "\n  {}: {} / {} / {} / {} / {}",
                    column,
                    num(s.mean),
                    num(s.std),
                    num(s.min),
                    num(s.max),
                    num(s.median)
                );
            }
        }

        if let Some(categorical) = &self.categorical_stats {
            out.push_str("\n\nCategorical statistics:");
            for (column, s) in categorical {
                let unique = s.unique_count.map(|v| v.to_string()).unwrap_or_else(dash);
                let _ = write!(out, "\n  {} ({} unique)", column, unique);
                for (value, count) in &s.top_values {
                    let _ = write!(out, "\n    {}: {}", value, count);
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "results": {
                "basic_info": {"row_count": 100, "column_count": 3, "memory_usage": 2048},
                "missing_values": {"age": 4, "city": 0},
                "descriptive_stats": {
                    "age": {"mean": 41.5, "std": 12.25, "min": 18, "max": 90, "median": 40}
                },
                "categorical_stats": {
                    "city": {"unique_count": 2, "top_values": {"Lyon": 60, "Paris": 40}}
                }
            }
        })
    }

    #[test]
    fn test_parses_all_sections() {
        let report = AuditReport::from_result(&sample()).unwrap();

        assert_eq!(report.basic_info.as_ref().unwrap().row_count, Some(100));
        assert_eq!(report.total_missing(), 4);
        assert_eq!(
            report.sections(),
            vec!["basic_info", "missing_values", "descriptive_stats", "categorical_stats"]
        );
        let city = &report.categorical_stats.as_ref().unwrap()["city"];
        assert_eq!(city.top_values.get("Lyon"), Some(&60));
    }

    #[test]
    fn test_render() {
        let text = AuditReport::from_result(&sample()).unwrap().render();
        assert!(text.contains("  Rows: 100"));
        assert!(text.contains("  Memory: 2.00 KB"));
        assert!(text.contains("  age: 41.50 / 12.25 / 18.00 / 90.00 / 40.00"));
        assert!(text.contains("  city (2 unique)\n    Lyon: 60\n    Paris: 40"));
    }

    #[test]
    fn test_missing_results_is_error() {
        let err = AuditReport::from_result(&json!({"row_count": 100})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TaskFailed);
        assert!(AuditReport::from_result(&Value::Null).is_err());
    }

    #[test]
    fn test_error_flag_becomes_task_failed() {
        let err = AuditReport::from_result(&json!({
            "results": {"error": true, "exception": "MemoryError", "traceback": "..."}
        }))
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TaskFailed);
        assert_eq!(err.message, "MemoryError");
        assert_eq!(err.details.unwrap().text("traceback").as_deref(), Some("..."));
    }

    #[test]
    fn test_warning_without_basic_info_is_error() {
        let err = AuditReport::from_result(&json!({"results": {"warning": "Dataset vide"}}))
            .unwrap_err();
        assert_eq!(err.message, "Dataset vide");
    }

    #[test]
    fn test_warning_with_basic_info_is_kept() {
        let report = AuditReport::from_result(&json!({
            "results": {
                "warning": "Échantillon partiel",
                "basic_info": {"row_count": 10}
            }
        }))
        .unwrap();

        assert_eq!(report.warning.as_deref(), Some("Échantillon partiel"));
        assert!(report.render().contains("Warning: Échantillon partiel"));
    }
}
