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

//! Row-level dataset I/O. Rows are flat, schema-less JSON objects whose key order
//! follows the source (header order for CSV, document order for JSON).

use crate::error::{Result, ValidationError};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

pub type Row = Map<String, Value>;

/// Reads a CSV file into rows. Every cell is kept as a string, empty cells as `""`,
/// leaving type decisions to the schema analyzer.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Row>> {
    let file = File::open(path.as_ref())?;
    let rows = read_csv(file)?;
    debug!(path = %path.as_ref().display(), rows = rows.len(), "loaded csv dataset");
    Ok(rows)
}
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (idx, header) in headers.iter().enumerate() {
            let cell = record.get(idx).unwrap_or_default();
            row.insert(header.to_string(), Value::String(cell.to_string()));
        }
        rows.push(row);
    }
    Ok(rows)
}
pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Vec<Row>> {
    let mut content = String::new();
    File::open(path.as_ref())?.read_to_string(&mut content)?;
    let rows = rows_from_json_str(&content)?;
    debug!(path = %path.as_ref().display(), rows = rows.len(), "loaded json dataset");
    Ok(rows)
}
/// Parses a JSON array of objects. Non-object entries are rejected with their index.
pub fn rows_from_json_str(content: &str) -> Result<Vec<Row>> {
    let value: Value = serde_json::from_str(content)?;
    rows_from_value(value)
}
pub fn rows_from_value(value: Value) -> Result<Vec<Row>> {
    let Value::Array(items) = value else {
        return Err(ValidationError::NonObjectRow { index: 0 }.into());
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(ValidationError::NonObjectRow { index }.into()),
        })
        .collect()
}
/// Loads by extension: `.json` as a JSON array, anything else as CSV.
pub fn load_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Row>> {
    let is_json = path
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        load_json(path)
    } else {
        load_csv(path)
    }
}
