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
use crate::schema_analyzer::{parse_numeric, ColumnProfile, ColumnType, Importance, SchemaAnalyzer};
use chrono::{DateTime, SecondsFormat};
use rayon::prelude::*;
use serde_json::{Number, Value};
use tracing::debug;

pub fn preprocess_dataset(rows: &[Row], schema: &[ColumnProfile]) -> Vec<Row> {
    preprocess_dataset_with(rows, schema, &SchemaAnalyzer::new())
}
/// Coerces cells to their profiled type and drops rows missing any high-importance
/// column. Text and unknown columns pass through unchanged.
pub fn preprocess_dataset_with(
    rows: &[Row],
    schema: &[ColumnProfile],
    analyzer: &SchemaAnalyzer,
) -> Vec<Row> {
    if schema.is_empty() {
        return rows.to_vec();
    }
    let critical: Vec<&str> = schema
        .iter()
        .filter(|c| c.importance == Importance::High)
        .map(|c| c.name.as_str())
        .collect();
    let cleaned: Vec<Row> = rows
        .par_iter()
        .map(|row| clean_row(row, schema, analyzer))
        .filter(|row| {
            critical
                .iter()
                .all(|name| row.get(*name).is_some_and(|v| !v.is_null()))
        })
        .collect();
    debug!(
        input_rows = rows.len(),
        kept_rows = cleaned.len(),
        "dataset preprocessed"
    );
    cleaned
}
fn clean_row(row: &Row, schema: &[ColumnProfile], analyzer: &SchemaAnalyzer) -> Row {
    let mut out = row.clone();
    for column in schema {
        let Some(value) = out.get_mut(&column.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let cleaned = match column.data_type {
            ColumnType::Numeric => clean_numeric(value),
            ColumnType::Categorical => clean_categorical(value),
            ColumnType::Datetime => clean_datetime(value, analyzer),
            ColumnType::Text | ColumnType::Unknown => continue,
        };
        *value = cleaned;
    }
    out
}
fn clean_numeric(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(_) => parse_numeric(value)
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        _ => Value::Null,
    }
}
fn clean_categorical(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => Value::String(other.to_string().trim().to_string()),
    }
}
fn clean_datetime(value: &Value, analyzer: &SchemaAnalyzer) -> Value {
    let parsed = match value {
        Value::String(s) => analyzer.parse_datetime(s),
        Value::Number(n) if analyzer.config().accept_epoch_numbers => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed.map_or(Value::Null, |dt| {
        Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    })
}
