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

use super::technique::Technique;
use crate::config::RunnerConfig;
use crate::dataset::Row;
use crate::error::{RunnerError, RunnerResult};
use crate::logging::log_runner_event;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::json;
use std::io::{BufWriter, Write};
use std::process::Stdio;
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// One technique run: prepared rows plus the final `key=value` parameters.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub technique: Technique,
    pub rows: Vec<Row>,
    pub params: IndexMap<String, String>,
}
impl Invocation {
    pub fn param_args(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }
}
/// Runs a technique and hands back the runtime's raw stdout.
#[async_trait]
pub trait TechniqueExecutor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> RunnerResult<String>;
    fn name(&self) -> &str;
}
/// Spawns `<program> <entry_script> <code> <data_path> key=value...` per run.
pub struct SubprocessExecutor {
    config: RunnerConfig,
}
impl SubprocessExecutor {
    pub const fn new(config: RunnerConfig) -> Self {
        Self { config }
    }
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }
    fn write_rows(invocation: &Invocation) -> RunnerResult<NamedTempFile> {
        let code = invocation.technique.code();
        let marshal_err = |reason: String| RunnerError::Marshal {
            technique: code.to_string(),
            reason,
        };
        let mut file = tempfile::Builder::new()
            .prefix(&format!("teles_{code}_"))
            .suffix(".json")
            .tempfile()
            .map_err(|e| marshal_err(e.to_string()))?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer(&mut writer, &invocation.rows).map_err(|e| marshal_err(e.to_string()))?;
            writer.flush().map_err(|e| marshal_err(e.to_string()))?;
        }
        Ok(file)
    }
}
#[async_trait]
impl TechniqueExecutor for SubprocessExecutor {
    async fn execute(&self, invocation: &Invocation) -> RunnerResult<String> {
        let code = invocation.technique.code();
        // Removed when dropped, on every exit path below.
        let data_file = Self::write_rows(invocation)?;
        let mut cmd = Command::new(&self.config.program);
        cmd.arg(&self.config.entry_script)
            .arg(code)
            .arg(data_file.path())
            .args(invocation.param_args())
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        log_runner_event(
            code,
            "spawn",
            json!({
                "program": self.config.program,
                "rows": invocation.rows.len(),
                "params": invocation.params,
            }),
        );
        let started = Instant::now();
        let child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            technique: code.to_string(),
            source,
        })?;
        let output = match self.config.timeout {
            Some(limit) => timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    warn!(technique = code, seconds = limit.as_secs(), "technique run timed out");
                    RunnerError::Timeout {
                        technique: code.to_string(),
                        seconds: limit.as_secs(),
                    }
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| RunnerError::Spawn {
            technique: code.to_string(),
            source,
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        debug!(
            technique = code,
            exit_code = ?output.status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            stderr_bytes = stderr.len(),
            "technique process exited"
        );
        if !output.status.success() {
            return Err(RunnerError::RuntimeExecution {
                technique: code.to_string(),
                stderr,
                exit_code: output.status.code(),
            });
        }
        if !stderr.trim().is_empty() {
            debug!(technique = code, stderr = %stderr.trim(), "runtime diagnostics");
        }
        Ok(stdout)
    }
    fn name(&self) -> &str {
        "subprocess"
    }
}
