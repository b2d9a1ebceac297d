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

//! Runtime stdout contract: optional diagnostic noise, then one JSON object. Parsing
//! starts at the first `{`; anything after the object is ignored.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Empty response from {technique}")]
    Empty { technique: String },
    #[error("Failed to parse {technique} result: {reason}")]
    Parse { technique: String, reason: String },
}
/// Untyped object produced by a technique run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResult(Map<String, Value>);
impl RawResult {
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }
    /// `None` unless the value is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }
    /// Well-formed stand-in for a run whose output could not be used.
    pub fn failure(err: &PayloadError) -> Self {
        let value = match err {
            PayloadError::Empty { technique } => json!({
                "error": err.to_string(),
                "charts": {},
                "stats": { "error": format!("The {technique} algorithm returned an empty response") },
                "tables": {},
                "explanation": "The requested analysis could not be completed due to an empty response.",
            }),
            PayloadError::Parse { technique, reason } => json!({
                "error": format!("Failed to parse {technique} result"),
                "details": reason,
                "charts": {},
                "stats": { "error": format!("Error parsing the {technique} algorithm result") },
                "tables": {},
                "explanation": "The requested analysis could not be completed due to a data formatting error.",
            }),
        };
        Self::from_value(value).unwrap_or_default()
    }
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
    /// HTTP-facing shape: `charts`, `stats`, `tables` and `explanation` are always
    /// present; `error`/`details` pass through when the run reported them.
    pub fn to_response(&self, technique: &str) -> Value {
        let field = |key: &str| {
            self.0
                .get(key)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| json!({}))
        };
        let explanation = self
            .0
            .get("explanation")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map_or_else(|| format!("Analysis completed with {technique}."), str::to_string);
        let mut response = json!({
            "charts": field("charts"),
            "stats": field("stats"),
            "tables": field("tables"),
            "explanation": explanation,
        });
        if let Some(obj) = response.as_object_mut() {
            for key in ["error", "details"] {
                if let Some(v) = self.0.get(key) {
                    obj.insert(key.to_string(), v.clone());
                }
            }
        }
        response
    }
}
pub fn parse_runtime_output(technique: &str, stdout: &str) -> Result<RawResult, PayloadError> {
    if stdout.trim().is_empty() {
        return Err(PayloadError::Empty {
            technique: technique.to_string(),
        });
    }
    let parse_err = |reason: String| PayloadError::Parse {
        technique: technique.to_string(),
        reason,
    };
    let start = stdout
        .find('{')
        .ok_or_else(|| parse_err("no JSON object in runtime output".to_string()))?;
    let mut stream = serde_json::Deserializer::from_str(&stdout[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Object(map))) => Ok(RawResult(map)),
        Some(Ok(_)) => Err(parse_err("runtime output is not a JSON object".to_string())),
        Some(Err(e)) => Err(parse_err(e.to_string())),
        None => Err(parse_err("no JSON object in runtime output".to_string())),
    }
}
