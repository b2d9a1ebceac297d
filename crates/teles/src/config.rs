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

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_RULES_PATH: &str = "config/constraints.json";
pub const DEFAULT_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// How technique runs are launched.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub program: String,
    pub entry_script: PathBuf,
    /// `None` lets a run go until the runtime exits.
    pub timeout: Option<Duration>,
    pub working_dir: Option<PathBuf>,
}
impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: if cfg!(target_os = "windows") {
                "python".to_string()
            } else {
                "python3".to_string()
            },
            entry_script: PathBuf::from("runtime/run_model.py"),
            timeout: Some(Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS)),
            working_dir: None,
        }
    }
}
impl RunnerConfig {
    /// `TELES_RUN_TIMEOUT_SECS=0` disables the timeout.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout = match env_parse::<u64>("TELES_RUN_TIMEOUT_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.timeout,
        };
        Self {
            program: env_string("TELES_PYTHON").unwrap_or(defaults.program),
            entry_script: env_string("TELES_RUN_MODEL").map_or(defaults.entry_script, PathBuf::from),
            timeout,
            working_dir: env_string("TELES_WORKDIR").map(PathBuf::from),
        }
    }
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
    #[must_use]
    pub fn with_entry_script(mut self, entry_script: impl Into<PathBuf>) -> Self {
        self.entry_script = entry_script.into();
        self
    }
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub rules_path: PathBuf,
    pub http_addr: String,
    pub body_limit: usize,
}
impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}
impl ServiceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rules_path: env_string("TELES_RULES_PATH").map_or(defaults.rules_path, PathBuf::from),
            http_addr: env_string("TELES_HTTP_ADDR").unwrap_or(defaults.http_addr),
            body_limit: env_parse::<usize>("TELES_BODY_LIMIT")
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.body_limit),
        }
    }
}
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse::<T>().ok())
}
