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

use thiserror::Error;
#[derive(Error, Debug)]
pub enum TelesError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Rule catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Technique runner error: {0}")]
    Runner(#[from] RunnerError),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] SerialisationError),
}
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Dataset contains no rows")]
    EmptyDataset,
    #[error("Dataset rows must be JSON objects (row {index} is not)")]
    NonObjectRow { index: usize },
    #[error("Schema contains no columns")]
    EmptySchema,
    #[error("Column '{column}' not found in dataset")]
    UnknownColumn { column: String },
    #[error("Dataset '{id}' not found")]
    DatasetNotFound { id: String },
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter { name: String, value: String },
}
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read rule catalog '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse JSON rule catalog: {source}")]
    JsonParse {
        #[from]
        source: serde_json::Error,
    },
    #[error("Failed to parse YAML rule catalog: {source}")]
    YamlParse {
        #[from]
        source: serde_yaml::Error,
    },
    #[error("Rule #{index} has an empty '{field}'")]
    EmptyField { index: usize, field: String },
    #[error("Duplicate internal code in rule catalog: '{code}'")]
    DuplicateCode { code: String },
    #[error("Rule '{technique}' has a negative max_missing ({value})")]
    InvalidMaxMissing { technique: String, value: f64 },
}
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Unsupported technique: {code}")]
    UnsupportedTechnique { code: String },
    #[error("Failed to start runtime for '{technique}': {source}")]
    Spawn {
        technique: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to prepare input for '{technique}': {reason}")]
    Marshal { technique: String, reason: String },
    #[error("Error running {technique} algorithm (exit code {}): {stderr}", describe_exit(.exit_code))]
    RuntimeExecution {
        technique: String,
        stderr: String,
        exit_code: Option<i32>,
    },
    #[error("Runtime for '{technique}' timed out after {seconds} seconds")]
    Timeout { technique: String, seconds: u64 },
}
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema information corrupted: {reason}. Try re-uploading the file.")]
    Corruption { reason: String },
}
#[derive(Error, Debug)]
pub enum SerialisationError {
    #[error("JSON serialisation failed: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("CSV parsing failed: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
}
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}
pub type Result<T> = std::result::Result<T, TelesError>;
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
pub type RunnerResult<T> = std::result::Result<T, RunnerError>;
impl From<serde_json::Error> for TelesError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialisation(SerialisationError::Json { source: err })
    }
}
impl From<csv::Error> for TelesError {
    fn from(err: csv::Error) -> Self {
        Self::Serialisation(SerialisationError::Csv { source: err })
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}
impl ErrorSeverity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}
impl TelesError {
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation",
            Self::Catalog(_) => "Catalog",
            Self::Runner(_) => "Runner",
            Self::Schema(_) => "Schema",
            Self::Io(_) => "I/O",
            Self::Serialisation(_) => "Serialisation",
        }
    }
    /// Validation problems are recovered locally with empty results; everything else
    /// ends the request.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Validation(_) | Self::Runner(RunnerError::UnsupportedTechnique { .. }) => {
                ErrorSeverity::Warning
            }
            Self::Schema(SchemaError::Corruption { .. }) | Self::Catalog(_) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::Error,
        }
    }
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::EmptyDataset) => {
                "The dataset appears to be empty. Please provide data with at least one row."
                    .to_string()
            }
            Self::Schema(SchemaError::Corruption { .. }) => {
                "Could not parse schema data. Try re-uploading the file.".to_string()
            }
            Self::Catalog(_) => {
                "Unable to load the technique catalog. Please check the rules file.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
