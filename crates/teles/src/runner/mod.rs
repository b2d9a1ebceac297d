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

pub mod executor;
pub mod payload;
pub mod technique;
pub use executor::{Invocation, SubprocessExecutor, TechniqueExecutor};
pub use payload::{parse_runtime_output, PayloadError, RawResult};
pub use technique::{Technique, TechniqueFamily};

use crate::config::RunnerConfig;
use crate::dataset::Row;
use crate::error::RunnerResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Parameter under which the runtime reads the selected target column.
pub const TARGET_PARAM: &str = "target_column";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub technique: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub params: IndexMap<String, String>,
}
impl RunRequest {
    pub fn new(technique: impl Into<String>) -> Self {
        Self {
            technique: technique.into(),
            ..Default::default()
        }
    }
    #[must_use]
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target.filter(|t| !t.trim().is_empty());
        self
    }
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
    /// Scalar JSON parameters become `key=value` strings; strings are passed unquoted.
    #[must_use]
    pub fn with_json_params(mut self, params: &serde_json::Map<String, Value>) -> Self {
        for (key, value) in params {
            let rendered = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            self.params.insert(key.clone(), rendered);
        }
        self
    }
}
/// Validates the technique, marshals rows and turns runtime output into a
/// `RawResult`. Unusable output degrades to a failure envelope.
#[derive(Clone)]
pub struct TechniqueRunner {
    executor: Arc<dyn TechniqueExecutor>,
}
impl TechniqueRunner {
    pub fn new(executor: Arc<dyn TechniqueExecutor>) -> Self {
        Self { executor }
    }
    pub fn subprocess(config: RunnerConfig) -> Self {
        Self::new(Arc::new(SubprocessExecutor::new(config)))
    }
    pub fn executor_name(&self) -> &str {
        self.executor.name()
    }
    pub fn invocation(request: &RunRequest, rows: &[Row]) -> RunnerResult<Invocation> {
        let technique: Technique = request.technique.parse()?;
        let mut params: IndexMap<String, String> = technique
            .default_params()
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        for (key, value) in &request.params {
            params.insert(key.clone(), value.clone());
        }
        if let Some(target) = &request.target {
            params
                .entry(TARGET_PARAM.to_string())
                .or_insert_with(|| target.clone());
        }
        Ok(Invocation {
            technique,
            rows: technique.prepare_rows(rows),
            params,
        })
    }
    pub async fn run(&self, request: &RunRequest, rows: &[Row]) -> RunnerResult<RawResult> {
        let invocation = Self::invocation(request, rows)?;
        let code = invocation.technique.code();
        info!(
            technique = code,
            executor = self.executor.name(),
            rows = invocation.rows.len(),
            target = request.target.as_deref().unwrap_or(""),
            "running technique"
        );
        let stdout = self.executor.execute(&invocation).await?;
        match parse_runtime_output(code, &stdout) {
            Ok(raw) => Ok(raw),
            Err(err) => {
                warn!(technique = code, error = %err, "runtime output unusable");
                Ok(RawResult::failure(&err))
            }
        }
    }
}
