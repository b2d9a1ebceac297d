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

//! Splits a runtime result into typed output records and keeps the running,
//! per-session aggregate of everything produced so far.

use crate::runner::RawResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::debug;

const TEXT_KEYS: [&str; 3] = ["explanation", "interpretation", "text"];
const STATS_KEYS: [&str; 3] = ["stats", "metrics", "performance"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Chart,
    Table,
    Text,
    Stats,
}
impl OutputType {
    pub const ALL: [Self; 4] = [Self::Chart, Self::Table, Self::Text, Self::Stats];
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chart => "chart",
            Self::Table => "table",
            Self::Text => "text",
            Self::Stats => "stats",
        }
    }
}
impl FromStr for OutputType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chart" => Ok(Self::Chart),
            "table" => Ok(Self::Table),
            "text" => Ok(Self::Text),
            "stats" => Ok(Self::Stats),
            other => Err(format!("unknown output type '{other}'")),
        }
    }
}
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputResult {
    pub technique: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub output_type: OutputType,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartMeta>,
}
/// Identifies the run a result came from.
#[derive(Debug, Clone, Default)]
pub struct TechniqueMeta {
    pub name: String,
    pub target: Option<String>,
    pub output_types: Vec<OutputType>,
}
impl TechniqueMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
    #[must_use]
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target.filter(|t| !t.is_empty());
        self
    }
    #[must_use]
    pub fn with_output_types(mut self, output_types: Vec<OutputType>) -> Self {
        self.output_types = output_types;
        self
    }
}
/// Produces at most one record per output family, always in chart, table, text,
/// stats order.
pub fn normalize(raw: &RawResult, meta: &TechniqueMeta) -> Vec<OutputResult> {
    let fields = raw.as_map();
    let mut outputs = Vec::with_capacity(4);
    let record = |output_type: OutputType, data: Value, chart: Option<ChartMeta>| OutputResult {
        technique: meta.name.clone(),
        target: meta.target.clone(),
        output_type,
        data,
        chart,
    };
    if let Some(charts) = fields.get("charts").filter(|v| is_non_empty_container(v)) {
        let chart_type = string_field(raw, &["chartType", "chart_type"]).unwrap_or("bar");
        let data = json!({
            "chartType": chart_type,
            "xKey": string_field(raw, &["xKey", "x_key"]).unwrap_or("x"),
            "yKey": string_field(raw, &["yKey", "y_key"]).unwrap_or("y"),
            "chartData": charts,
        });
        let chart = ChartMeta {
            title: Some(string_field(raw, &["title"]).map_or_else(|| meta.name.clone(), str::to_string)),
            description: string_field(raw, &["description"]).map(str::to_string),
            chart_type: Some(chart_type.to_string()),
        };
        outputs.push(record(OutputType::Chart, data, Some(chart)));
    }
    if let Some(tables) = fields.get("tables").filter(|v| is_non_empty_container(v)) {
        outputs.push(record(OutputType::Table, tables.clone(), None));
    }
    if let Some(text) = string_field(raw, &TEXT_KEYS) {
        outputs.push(record(OutputType::Text, Value::String(text.to_string()), None));
    }
    if let Some(stats) = STATS_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|v| v.as_object().is_some_and(|m| !m.is_empty()))
    {
        outputs.push(record(OutputType::Stats, stats.clone(), None));
    }
    for output in &outputs {
        if !meta.output_types.is_empty() && !meta.output_types.contains(&output.output_type) {
            debug!(
                technique = %meta.name,
                output_type = output.output_type.as_str(),
                "result produced an undeclared output family"
            );
        }
    }
    outputs
}
fn is_non_empty_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}
fn string_field<'a>(raw: &'a RawResult, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| raw.as_map().get(*key))
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
}
/// Running, append-only log of outputs across technique runs, keyed by family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputAggregate {
    pub chart: Vec<OutputResult>,
    pub table: Vec<OutputResult>,
    pub text: Vec<OutputResult>,
    pub stats: Vec<OutputResult>,
}
impl OutputAggregate {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, result: OutputResult) {
        self.bucket_mut(result.output_type).push(result);
    }
    pub fn extend<I: IntoIterator<Item = OutputResult>>(&mut self, results: I) {
        for result in results {
            self.push(result);
        }
    }
    pub fn get(&self, output_type: OutputType) -> &[OutputResult] {
        match output_type {
            OutputType::Chart => &self.chart,
            OutputType::Table => &self.table,
            OutputType::Text => &self.text,
            OutputType::Stats => &self.stats,
        }
    }
    fn bucket_mut(&mut self, output_type: OutputType) -> &mut Vec<OutputResult> {
        match output_type {
            OutputType::Chart => &mut self.chart,
            OutputType::Table => &mut self.table,
            OutputType::Text => &mut self.text,
            OutputType::Stats => &mut self.stats,
        }
    }
    pub fn clear(&mut self) {
        for output_type in OutputType::ALL {
            self.bucket_mut(output_type).clear();
        }
    }
    pub fn clear_type(&mut self, output_type: OutputType) {
        self.bucket_mut(output_type).clear();
    }
    pub fn clear_technique(&mut self, technique: &str) {
        for output_type in OutputType::ALL {
            self.bucket_mut(output_type)
                .retain(|result| result.technique != technique);
        }
    }
    pub fn len(&self) -> usize {
        OutputType::ALL.iter().map(|t| self.get(*t).len()).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: Value) -> RawResult {
        RawResult::from_value(value).unwrap()
    }

    #[test]
    fn explanation_only_yields_single_text_output() {
        let outputs = normalize(&raw(json!({"explanation": "x"})), &TechniqueMeta::new("kmeans"));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].output_type, OutputType::Text);
        assert_eq!(outputs[0].data, json!("x"));
    }

    #[test]
    fn families_come_out_in_fixed_order() {
        let result = raw(json!({
            "stats": {"r2": 0.9},
            "interpretation": "good fit",
            "tables": [{"a": 1}],
            "charts": [{"x": 1, "y": 2}]
        }));
        let meta = TechniqueMeta::new("linear_regression").with_target(Some("price".to_string()));
        let outputs = normalize(&result, &meta);
        let types: Vec<OutputType> = outputs.iter().map(|o| o.output_type).collect();
        assert_eq!(types, OutputType::ALL.to_vec());
        assert!(outputs.iter().all(|o| o.target.as_deref() == Some("price")));
    }

    #[test]
    fn chart_defaults_fill_missing_keys() {
        let outputs = normalize(
            &raw(json!({"charts": [{"x": 1, "y": 2}], "xKey": "age"})),
            &TechniqueMeta::new("kmeans"),
        );
        let data = &outputs[0].data;
        assert_eq!(data["chartType"], json!("bar"));
        assert_eq!(data["xKey"], json!("age"));
        assert_eq!(data["yKey"], json!("y"));
        assert_eq!(data["chartData"], json!([{"x": 1, "y": 2}]));
        assert_eq!(outputs[0].chart.as_ref().unwrap().title.as_deref(), Some("kmeans"));
    }

    #[test]
    fn empty_containers_and_blank_text_produce_nothing() {
        let outputs = normalize(
            &raw(json!({"charts": [], "tables": {}, "explanation": "  ", "stats": {}, "metrics": 3})),
            &TechniqueMeta::new("svc"),
        );
        assert!(outputs.is_empty());
    }

    #[test]
    fn stats_fall_back_to_metrics_and_performance() {
        let outputs = normalize(&raw(json!({"performance": {"accuracy": 0.8}})), &TechniqueMeta::new("svc"));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].output_type, OutputType::Stats);
        assert_eq!(outputs[0].data, json!({"accuracy": 0.8}));
    }

    #[test]
    fn aggregate_appends_and_clears_by_type_and_technique() {
        let mut aggregate = OutputAggregate::new();
        let both = raw(json!({"charts": [1], "stats": {"k": 1}}));
        aggregate.extend(normalize(&both, &TechniqueMeta::new("kmeans")));
        aggregate.extend(normalize(&both, &TechniqueMeta::new("dbscan")));
        assert_eq!(aggregate.get(OutputType::Chart).len(), 2);
        assert_eq!(aggregate.len(), 4);
        aggregate.clear_technique("kmeans");
        assert_eq!(aggregate.len(), 2);
        assert!(aggregate.chart.iter().all(|o| o.technique == "dbscan"));
        aggregate.clear_type(OutputType::Stats);
        assert_eq!(aggregate.len(), 1);
        aggregate.clear();
        assert!(aggregate.is_empty());
    }

    #[test]
    fn output_result_serialises_camel_case() {
        let result = OutputResult {
            technique: "svc".to_string(),
            target: None,
            output_type: OutputType::Stats,
            data: json!({}),
            chart: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({"technique": "svc", "outputType": "stats", "data": {}}));
        assert_eq!("Chart".parse::<OutputType>().unwrap(), OutputType::Chart);
    }
}
