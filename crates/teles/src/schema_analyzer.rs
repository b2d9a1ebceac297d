// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::dataset::Row;
use crate::error::SchemaError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

static NON_NUMERIC_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9.\-]").expect("numeric filter pattern is valid"));

/// Largest absolute epoch-millisecond value a date may hold.
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Datetime,
    Text,
    Unknown,
}
impl ColumnType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    #[default]
    Medium,
    Low,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    pub std_dev: f64,
}
impl NumericStats {
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    pub data_type: ColumnType,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub unique_values: usize,
    #[serde(default)]
    pub missing_values: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<NumericStats>,
}
impl ColumnProfile {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
            importance: Importance::default(),
            unique_values: 0,
            missing_values: 0,
            stats: None,
        }
    }
    #[must_use]
    pub fn with_unique_values(mut self, unique_values: usize) -> Self {
        self.unique_values = unique_values;
        self
    }
    #[must_use]
    pub fn with_missing_values(mut self, missing_values: usize) -> Self {
        self.missing_values = missing_values;
        self
    }
    #[must_use]
    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }
    #[must_use]
    pub fn with_stats(mut self, stats: NumericStats) -> Self {
        self.stats = Some(stats);
        self
    }
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
    }
}
impl std::fmt::Display for ColumnProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {:?}, unique: {}, missing: {})",
            self.name,
            self.data_type.as_str(),
            self.importance,
            self.unique_values,
            self.missing_values
        )
    }
}
/// Dataset-level figures consumed by the constraint engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub numeric_feature_count: usize,
    pub missing_percent: f64,
    pub has_time_column: bool,
    pub column_count: usize,
    pub row_count: usize,
}
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub categorical_ratio_threshold: f64,
    pub categorical_distinct_limit: usize,
    pub text_length_threshold: f64,
    pub low_importance_missing_ratio: f64,
    pub high_importance_keywords: Vec<String>,
    pub temporal_formats: Vec<String>,
    pub accept_epoch_numbers: bool,
}
impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            categorical_ratio_threshold: 0.1,
            categorical_distinct_limit: 15,
            text_length_threshold: 50.0,
            low_importance_missing_ratio: 0.5,
            high_importance_keywords: ["id", "name", "title", "category", "label", "target", "class"]
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            temporal_formats: vec![
                "%Y-%m-%d".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S%.f".to_string(),
                "%Y/%m/%d".to_string(),
                "%m/%d/%Y".to_string(),
                "%m/%d/%Y %H:%M:%S".to_string(),
                "%B %d, %Y".to_string(),
                "%b %d, %Y".to_string(),
                "%d %B %Y".to_string(),
            ],
            accept_epoch_numbers: true,
        }
    }
}
impl AnalyzerConfig {
    /// ISO dates only; bare numbers never count as timestamps.
    pub fn for_strict_typing() -> Self {
        Self {
            temporal_formats: vec!["%Y-%m-%d".to_string(), "%Y-%m-%dT%H:%M:%S".to_string()],
            accept_epoch_numbers: false,
            ..Default::default()
        }
    }
    pub fn for_fast_profiling() -> Self {
        Self {
            temporal_formats: vec!["%Y-%m-%d".to_string(), "%Y-%m-%d %H:%M:%S".to_string()],
            ..Default::default()
        }
    }
}
pub struct SchemaAnalyzer {
    config: AnalyzerConfig,
}
impl SchemaAnalyzer {
    pub fn new() -> Self {
        Self {
            config: AnalyzerConfig::default(),
        }
    }
    pub const fn with_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
    /// Profiles every column named by the first row. Never fails; an empty dataset
    /// yields an empty schema.
    pub fn analyze(&self, rows: &[Row]) -> Vec<ColumnProfile> {
        let Some(first) = rows.first() else {
            return Vec::new();
        };
        let names: Vec<&str> = first.keys().map(String::as_str).collect();
        let profiles: Vec<ColumnProfile> = names
            .par_iter()
            .map(|name| self.profile_column(name, rows))
            .collect();
        debug!(
            columns = profiles.len(),
            rows = rows.len(),
            "schema analysed"
        );
        profiles
    }
    fn profile_column(&self, name: &str, rows: &[Row]) -> ColumnProfile {
        let total_rows = rows.len();
        let values: Vec<&Value> = rows
            .iter()
            .filter_map(|row| row.get(name))
            .filter(|v| !is_missing(v))
            .collect();
        let missing_values = total_rows - values.len();
        let unique_values = distinct_count(&values);
        let data_type = self.infer_type(&values, unique_values);
        let importance = self.importance(name, missing_values, total_rows, unique_values);
        let stats = if data_type == ColumnType::Numeric {
            numeric_stats(&values)
        } else {
            None
        };
        ColumnProfile {
            name: name.to_string(),
            data_type,
            importance,
            unique_values,
            missing_values,
            stats,
        }
    }
    fn infer_type(&self, values: &[&Value], distinct: usize) -> ColumnType {
        if values.is_empty() {
            return ColumnType::Unknown;
        }
        if values.iter().all(|v| parse_numeric(v).is_some()) {
            return ColumnType::Numeric;
        }
        if values.iter().all(|v| self.is_date(v)) {
            return ColumnType::Datetime;
        }
        let unique_ratio = distinct as f64 / values.len() as f64;
        if unique_ratio < self.config.categorical_ratio_threshold
            || distinct < self.config.categorical_distinct_limit
        {
            return ColumnType::Categorical;
        }
        let total_len: usize = values.iter().map(|v| display_len(v)).sum();
        if total_len as f64 / values.len() as f64 > self.config.text_length_threshold {
            return ColumnType::Text;
        }
        ColumnType::Categorical
    }
    fn importance(
        &self,
        name: &str,
        missing: usize,
        total_rows: usize,
        unique: usize,
    ) -> Importance {
        let lower = name.to_lowercase();
        if self
            .config
            .high_importance_keywords
            .iter()
            .any(|k| lower.contains(k.as_str()))
        {
            return Importance::High;
        }
        if missing as f64 / total_rows as f64 > self.config.low_importance_missing_ratio {
            return Importance::Low;
        }
        if unique == total_rows {
            return if lower.contains("id") {
                Importance::High
            } else {
                Importance::Low
            };
        }
        Importance::Medium
    }
    pub fn is_date(&self, value: &Value) -> bool {
        match value {
            Value::Number(n) => {
                self.config.accept_epoch_numbers
                    && n.as_f64().is_some_and(|f| f.abs() <= MAX_EPOCH_MILLIS)
            }
            Value::String(s) => self.parse_datetime(s).is_some(),
            _ => false,
        }
    }
    pub fn parse_datetime(&self, raw: &str) -> Option<DateTime<chrono::Utc>> {
        let value = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.to_utc());
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
            return Some(dt.to_utc());
        }
        self.config.temporal_formats.iter().find_map(|format| {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
                return Some(dt.and_utc());
            }
            NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
    }
    /// Missing cells are counted over `row_count * columns`, expressed in percent.
    pub fn summarize(profiles: &[ColumnProfile], row_count: usize) -> SchemaSummary {
        let numeric_feature_count = profiles
            .iter()
            .filter(|p| p.data_type == ColumnType::Numeric)
            .count();
        let total_cells = row_count * profiles.len();
        let missing_cells: usize = profiles.iter().map(|p| p.missing_values).sum();
        let missing_percent = if total_cells > 0 {
            missing_cells as f64 / total_cells as f64 * 100.0
        } else {
            0.0
        };
        let has_time_column = profiles.iter().any(|p| {
            p.data_type == ColumnType::Datetime || p.name_contains("date") || p.name_contains("time")
        });
        SchemaSummary {
            numeric_feature_count,
            missing_percent,
            has_time_column,
            column_count: profiles.len(),
            row_count,
        }
    }
}
impl Default for SchemaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
pub fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
/// JSON numbers as-is; strings after stripping everything outside `[0-9.-]`, provided
/// the remainder is a complete numeric literal.
pub fn parse_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = NON_NUMERIC_CHARS.replace_all(s, "");
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}
fn distinct_key(value: &Value) -> String {
    match value {
        Value::Number(n) => format!("n:{}", n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => format!("s:{s}"),
        other => format!("o:{other}"),
    }
}
fn distinct_count(values: &[&Value]) -> usize {
    values
        .iter()
        .map(|v| distinct_key(v))
        .collect::<HashSet<_>>()
        .len()
}
fn display_len(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        other => other.to_string().chars().count(),
    }
}
fn numeric_stats(values: &[&Value]) -> Option<NumericStats> {
    let mut sorted: Vec<f64> = values.iter().filter_map(|v| parse_numeric(v)).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let min = sorted[0];
    let max = sorted[n - 1];
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let mid = n / 2;
    let median = if n % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let mut mode = sorted[0];
    let mut best = 0;
    for run in sorted.chunk_by(|a, b| a.total_cmp(b).is_eq()) {
        if run.len() > best {
            best = run.len();
            mode = run[0];
        }
    }
    Some(NumericStats {
        min,
        max,
        mean,
        median,
        mode,
        std_dev: variance.sqrt(),
    })
}
pub fn load_schema_json(content: &str) -> Result<Vec<ColumnProfile>, SchemaError> {
    serde_json::from_str(content).map_err(|e| SchemaError::Corruption {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        crate::dataset::rows_from_value(value).unwrap()
    }

    #[test]
    fn dirty_numeric_strings_are_cleaned_for_stats() {
        let data = rows(json!([
            {"weight": 10},
            {"weight": "20"},
            {"weight": "30kg"},
            {"weight": null}
        ]));
        let profiles = SchemaAnalyzer::new().analyze(&data);
        let weight = &profiles[0];
        assert_eq!(weight.data_type, ColumnType::Numeric);
        assert_eq!(weight.missing_values, 1);
        assert_eq!(weight.unique_values, 3);
        let stats = weight.stats.as_ref().unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.median, 20.0);
    }

    #[test]
    fn empty_dataset_has_no_profiles() {
        assert!(SchemaAnalyzer::new().analyze(&[]).is_empty());
    }

    #[test]
    fn all_missing_column_is_unknown_without_stats() {
        let data = rows(json!([{"a": null, "b": 1}, {"a": "", "b": 2}]));
        let profiles = SchemaAnalyzer::new().analyze(&data);
        assert_eq!(profiles[0].data_type, ColumnType::Unknown);
        assert!(profiles[0].stats.is_none());
        assert_eq!(profiles[0].missing_values, 2);
    }

    #[test]
    fn columns_missing_from_later_rows_count_as_missing() {
        let data = rows(json!([{"a": 1, "b": "x"}, {"a": 2}]));
        let profiles = SchemaAnalyzer::new().analyze(&data);
        assert_eq!(profiles[1].name, "b");
        assert_eq!(profiles[1].missing_values, 1);
    }

    #[test]
    fn iso_dates_are_datetime_not_numeric() {
        let data = rows(json!([
            {"when": "2024-01-01"},
            {"when": "2024-02-01T10:00:00Z"},
            {"when": "2024-03-05 08:30:00"}
        ]));
        let profiles = SchemaAnalyzer::new().analyze(&data);
        assert_eq!(profiles[0].data_type, ColumnType::Datetime);
    }

    #[test]
    fn unparseable_remainder_is_not_numeric() {
        assert_eq!(parse_numeric(&json!("--")), None);
        assert_eq!(parse_numeric(&json!("abc")), None);
        assert_eq!(parse_numeric(&json!("$1,200.50")), Some(1200.5));
        assert_eq!(parse_numeric(&json!(true)), None);
    }

    #[test]
    fn categorical_text_and_fallback_classification() {
        let few: Vec<Value> = (0..40).map(|i| json!({"c": format!("g{}", i % 3)})).collect();
        let profiles = SchemaAnalyzer::new().analyze(&rows(Value::Array(few)));
        assert_eq!(profiles[0].data_type, ColumnType::Categorical);

        let long: Vec<Value> = (0..20)
            .map(|i| json!({"c": format!("{i} {}", "a fairly long free-form sentence about things".repeat(2))}))
            .collect();
        let profiles = SchemaAnalyzer::new().analyze(&rows(Value::Array(long)));
        assert_eq!(profiles[0].data_type, ColumnType::Text);

        let short: Vec<Value> = (0..20).map(|i| json!({"c": format!("code-{i}")})).collect();
        let profiles = SchemaAnalyzer::new().analyze(&rows(Value::Array(short)));
        assert_eq!(profiles[0].data_type, ColumnType::Categorical);
    }

    #[test]
    fn importance_heuristics() {
        let data = rows(json!([
            {"user_id": 1, "score": 1, "sparse": null, "group": "a"},
            {"user_id": 2, "score": 2, "sparse": null, "group": "a"},
            {"user_id": 3, "score": 3, "sparse": 1, "group": "b"}
        ]));
        let profiles = SchemaAnalyzer::new().analyze(&data);
        assert_eq!(profiles[0].importance, Importance::High);
        assert_eq!(profiles[1].importance, Importance::Low);
        assert_eq!(profiles[2].importance, Importance::Low);
        assert_eq!(profiles[3].importance, Importance::Medium);
    }

    #[test]
    fn mode_prefers_smallest_value_on_ties() {
        let data = rows(json!([{"v": 5}, {"v": 2}, {"v": 5}, {"v": 2}, {"v": 9}]));
        let profiles = SchemaAnalyzer::new().analyze(&data);
        let stats = profiles[0].stats.as_ref().unwrap();
        assert_eq!(stats.mode, 2.0);
        assert_eq!(stats.median, 5.0);
    }

    #[test]
    fn summary_counts_missing_cells_in_percent() {
        let data = rows(json!([
            {"amount": 1, "order_date": "2024-01-01"},
            {"amount": null, "order_date": "2024-01-02"}
        ]));
        let profiles = SchemaAnalyzer::new().analyze(&data);
        let summary = SchemaAnalyzer::summarize(&profiles, data.len());
        assert_eq!(summary.numeric_feature_count, 1);
        assert!((summary.missing_percent - 25.0).abs() < 1e-9);
        assert!(summary.has_time_column);
    }

    #[test]
    fn corrupt_schema_json_is_reported() {
        assert!(matches!(
            load_schema_json("{not json"),
            Err(SchemaError::Corruption { .. })
        ));
        let parsed = load_schema_json(r#"[{"name":"age","dataType":"numeric"}]"#).unwrap();
        assert_eq!(parsed[0].importance, Importance::Medium);
    }
}
