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
use crate::schema_analyzer::{ColumnProfile, ColumnType};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::cmp::Ordering;

pub const DEFAULT_VARIATION_LIMIT: usize = 5;
const TEXT_AS_CATEGORY_LIMIT: usize = 20;
const PIE_CARDINALITY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Scatter,
    Line,
    Bar,
    Box,
    Heatmap,
    Pie,
    Area,
    Radar,
}
impl ChartType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scatter => "scatter",
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Box => "box",
            Self::Heatmap => "heatmap",
            Self::Pie => "pie",
            Self::Area => "area",
            Self::Radar => "radar",
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationFilter {
    pub column: String,
    pub operator: FilterOperator,
    pub value: Value,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationConfig {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub x: String,
    pub y: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_by: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<VariationFilter>,
}
impl VariationConfig {
    pub fn new(title: impl Into<String>, chart_type: ChartType, x: &str, y: &str) -> Self {
        Self {
            title: title.into(),
            description: None,
            chart_type,
            x: x.to_string(),
            y: y.to_string(),
            group_by: None,
            aggregate: None,
            limit: None,
            sort_by: None,
            sort_direction: None,
            color_by: None,
            filters: Vec::new(),
        }
    }
    #[must_use]
    pub fn describe(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }
}
/// Chart suggestions derived from column types alone, in rule priority order.
pub fn generate_variations(schema: &[ColumnProfile], limit: usize) -> Vec<VariationConfig> {
    let numeric: Vec<&ColumnProfile> = schema
        .iter()
        .filter(|c| c.data_type == ColumnType::Numeric)
        .collect();
    let categorical: Vec<&ColumnProfile> = schema
        .iter()
        .filter(|c| {
            c.data_type == ColumnType::Categorical
                || (c.data_type == ColumnType::Text && c.unique_values < TEXT_AS_CATEGORY_LIMIT)
        })
        .collect();
    let dates: Vec<&ColumnProfile> = schema
        .iter()
        .filter(|c| c.data_type == ColumnType::Datetime)
        .collect();
    let mut variations = Vec::new();
    if let Some(first_num) = numeric.first() {
        for cat in categorical.iter().take(limit) {
            let mut v = VariationConfig::new(
                format!("{} vs {}", cat.name, first_num.name),
                ChartType::Bar,
                &cat.name,
                &first_num.name,
            )
            .describe(format!("Bar chart showing {} by {}", first_num.name, cat.name));
            v.aggregate = Some(Aggregate::Sum);
            v.limit = Some(10);
            v.sort_by = Some(first_num.name.clone());
            v.sort_direction = Some(SortDirection::Desc);
            variations.push(v);
        }
    }
    if let Some(date) = dates.first() {
        for num in numeric.iter().take(limit) {
            let mut v = VariationConfig::new(
                format!("{} Over Time", num.name),
                ChartType::Line,
                &date.name,
                &num.name,
            )
            .describe(format!("Line chart showing {} trends over time", num.name));
            v.aggregate = Some(Aggregate::Avg);
            v.sort_by = Some(date.name.clone());
            v.sort_direction = Some(SortDirection::Asc);
            variations.push(v);
        }
    }
    let scatter_room = limit.saturating_mul(3).saturating_sub(variations.len());
    for (a, b) in numeric.iter().tuple_combinations().take(scatter_room) {
        variations.push(
            VariationConfig::new(format!("{} vs {}", a.name, b.name), ChartType::Scatter, &a.name, &b.name)
                .describe(format!("Scatter plot comparing {} and {}", a.name, b.name)),
        );
    }
    if let Some(first_num) = numeric.first() {
        for cat in categorical
            .iter()
            .filter(|c| c.unique_values <= PIE_CARDINALITY_LIMIT)
            .take(limit)
        {
            let mut v = VariationConfig::new(
                format!("Distribution of {}", cat.name),
                ChartType::Pie,
                &cat.name,
                &first_num.name,
            )
            .describe(format!("Pie chart showing the distribution of {}", cat.name));
            v.aggregate = Some(Aggregate::Count);
            variations.push(v);
        }
        if let [first_cat, second_cat, ..] = categorical.as_slice() {
            let mut v = VariationConfig::new(
                format!("{} by {} and {}", first_num.name, first_cat.name, second_cat.name),
                ChartType::Bar,
                &first_cat.name,
                &first_num.name,
            )
            .describe(format!(
                "Grouped bar chart showing {} by {} and {}",
                first_num.name, first_cat.name, second_cat.name
            ));
            v.group_by = Some(second_cat.name.clone());
            v.aggregate = Some(Aggregate::Avg);
            v.limit = Some(10);
            variations.push(v);
        }
    }
    variations.truncate(limit);
    variations
}
/// Applies filters, then groups by `x` and aggregates `y`, then sorts and limits.
/// Non-numeric `y` values count as zero in sums and extremes.
pub fn apply_variation(rows: &[Row], config: &VariationConfig) -> Vec<Row> {
    let mut result: Vec<Row> = rows
        .iter()
        .filter(|row| config.filters.iter().all(|f| filter_matches(row, f)))
        .cloned()
        .collect();
    if let Some(aggregate) = config.aggregate {
        let mut groups: IndexMap<String, (Value, Vec<f64>)> = IndexMap::new();
        for row in &result {
            let x = row.get(&config.x).cloned().unwrap_or(Value::Null);
            let y = row.get(&config.y).map_or(0.0, coerce_number);
            groups
                .entry(group_key(&x))
                .or_insert_with(|| (x, Vec::new()))
                .1
                .push(y);
        }
        result = groups
            .into_values()
            .map(|(x, ys)| {
                let mut row = Row::new();
                row.insert(config.x.clone(), x);
                row.insert(config.y.clone(), aggregate_values(aggregate, &ys));
                row
            })
            .collect();
    }
    if let Some(sort_by) = &config.sort_by {
        let descending = config.sort_direction == Some(SortDirection::Desc);
        result.sort_by(|a, b| {
            let ord = compare_values(
                a.get(sort_by).unwrap_or(&Value::Null),
                b.get(sort_by).unwrap_or(&Value::Null),
            );
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }
    if let Some(limit) = config.limit.filter(|l| *l > 0) {
        result.truncate(limit);
    }
    result
}
fn aggregate_values(aggregate: Aggregate, ys: &[f64]) -> Value {
    let number = |v: f64| Number::from_f64(v).map_or(Value::Null, Value::Number);
    match aggregate {
        Aggregate::Count => Value::from(ys.len()),
        Aggregate::Sum => number(ys.iter().sum()),
        Aggregate::Avg => number(ys.iter().sum::<f64>() / ys.len() as f64),
        Aggregate::Min => number(ys.iter().copied().fold(f64::INFINITY, f64::min)),
        Aggregate::Max => number(ys.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
    }
}
fn group_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
/// Numbers compare numerically, everything else by its text form; null sorts first.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => group_key(a).cmp(&group_key(b)),
        },
    }
}
fn filter_matches(row: &Row, filter: &VariationFilter) -> bool {
    let value = row.get(&filter.column).unwrap_or(&Value::Null);
    let ordered = |accept: fn(Ordering) -> bool| {
        !value.is_null() && !filter.value.is_null() && accept(compare_values(value, &filter.value))
    };
    match filter.operator {
        FilterOperator::Eq => *value == filter.value,
        FilterOperator::Neq => *value != filter.value,
        FilterOperator::Gt => ordered(Ordering::is_gt),
        FilterOperator::Gte => ordered(Ordering::is_ge),
        FilterOperator::Lt => ordered(Ordering::is_lt),
        FilterOperator::Lte => ordered(Ordering::is_le),
        FilterOperator::In => filter.value.as_array().is_some_and(|items| items.contains(value)),
        FilterOperator::Contains => group_key(value).contains(&group_key(&filter.value)),
    }
}
