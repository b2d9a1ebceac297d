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

use crate::schema_analyzer::{ColumnProfile, ColumnType, Importance};
use serde::{Deserialize, Serialize};
use tracing::debug;

const BASE_CONFIDENCE: f64 = 70.0;
const MAX_MISSING_RATIO: f64 = 0.2;
const CATEGORY_KEYWORDS: [&str; 7] = ["category", "type", "class", "group", "label", "status", "result"];
const SERIES_KEYWORDS: [&str; 6] = ["sales", "revenue", "count", "price", "volume", "rate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Regression,
    Classification,
    Forecasting,
    Clustering,
}
impl TaskType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regression => "regression",
            Self::Classification => "classification",
            Self::Forecasting => "forecasting",
            Self::Clustering => "clustering",
        }
    }
}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSuggestion {
    /// Empty for clustering, which has no target column.
    pub column: String,
    pub task_type: TaskType,
    pub confidence: u8,
    pub description: String,
}
pub struct TargetPlanner;
impl TargetPlanner {
    pub fn suggest(schema: &[ColumnProfile]) -> Vec<TargetSuggestion> {
        let candidates: Vec<&ColumnProfile> = schema.iter().filter(|c| is_candidate(c)).collect();
        let numeric: Vec<&ColumnProfile> = candidates
            .iter()
            .copied()
            .filter(|c| c.data_type == ColumnType::Numeric)
            .collect();
        let mut suggestions = Vec::new();
        for column in &numeric {
            suggestions.push(TargetSuggestion {
                column: column.name.clone(),
                task_type: TaskType::Regression,
                confidence: finalize(regression_score(column)),
                description: format!("Predict the value of {}", column.name),
            });
        }
        for column in candidates.iter().filter(|c| {
            c.data_type == ColumnType::Categorical && (2..=15).contains(&c.unique_values)
        }) {
            suggestions.push(TargetSuggestion {
                column: column.name.clone(),
                task_type: TaskType::Classification,
                confidence: finalize(classification_score(column)),
                description: format!(
                    "Classify data into {} categories of {}",
                    column.unique_values, column.name
                ),
            });
        }
        let time_columns: Vec<&ColumnProfile> = candidates
            .iter()
            .copied()
            .filter(|c| c.data_type == ColumnType::Datetime)
            .collect();
        for metric in numeric.iter().filter(|c| !c.name_contains("id")) {
            for time_column in &time_columns {
                suggestions.push(TargetSuggestion {
                    column: metric.name.clone(),
                    task_type: TaskType::Forecasting,
                    confidence: finalize(forecasting_score(metric, Some(time_column))),
                    description: format!("Forecast {} over time ({})", metric.name, time_column.name),
                });
            }
        }
        if numeric.len() >= 2 {
            suggestions.push(TargetSuggestion {
                column: String::new(),
                task_type: TaskType::Clustering,
                confidence: 70,
                description: format!("Cluster data based on {} numeric features", numeric.len()),
            });
        }
        suggestions.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        debug!(
            candidates = candidates.len(),
            suggestions = suggestions.len(),
            "target suggestions planned"
        );
        suggestions
    }
}
/// Ratio of missing to distinct values; `None` when it is not a finite number.
fn missing_ratio(column: &ColumnProfile) -> Option<f64> {
    let ratio = column.missing_values as f64 / column.unique_values as f64;
    ratio.is_finite().then_some(ratio)
}
fn is_candidate(column: &ColumnProfile) -> bool {
    column.importance != Importance::Low
        && missing_ratio(column).is_some_and(|r| r < MAX_MISSING_RATIO)
}
fn base_score(column: &ColumnProfile) -> f64 {
    let mut score = BASE_CONFIDENCE - missing_ratio(column).unwrap_or(0.0) * 20.0;
    match column.importance {
        Importance::High => score += 15.0,
        Importance::Medium => score += 5.0,
        Importance::Low => {}
    }
    score
}
fn regression_score(column: &ColumnProfile) -> f64 {
    let mut score = base_score(column);
    if column.stats.as_ref().is_some_and(|s| s.range() > 100.0) {
        score += 10.0;
    }
    if column.name_contains("id") {
        score -= 30.0;
    }
    score
}
fn classification_score(column: &ColumnProfile) -> f64 {
    let mut score = base_score(column);
    if (2..=10).contains(&column.unique_values) {
        score += 10.0;
    } else {
        score -= 5.0 * column.unique_values.saturating_sub(10) as f64;
    }
    if CATEGORY_KEYWORDS.iter().any(|k| column.name_contains(k)) {
        score += 15.0;
    }
    score
}
fn forecasting_score(column: &ColumnProfile, time_column: Option<&ColumnProfile>) -> f64 {
    let mut score = base_score(column);
    match time_column {
        Some(t) if t.data_type == ColumnType::Datetime => {
            if SERIES_KEYWORDS.iter().any(|k| column.name_contains(k)) {
                score += 15.0;
            }
        }
        _ => score -= 20.0,
    }
    score
}
fn finalize(score: f64) -> u8 {
    score.clamp(0.0, 100.0).round() as u8
}
