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

pub mod auto_runner;
pub mod config;
pub mod constraint_engine;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod normalizer;
pub mod preprocess;
pub mod rule_catalog;
pub mod runner;
pub mod schema_analyzer;
pub mod session;
pub mod target_planner;
pub mod variation;

pub use auto_runner::{AutoRunReport, AutoRunner};
pub use config::{RunnerConfig, ServiceConfig};
pub use constraint_engine::{ConstraintEngine, ConstraintInput, EligibleTechnique};
pub use dataset::Row;
pub use error::{CatalogError, ErrorSeverity, Result, RunnerError, SchemaError, TelesError, ValidationError};
pub use normalizer::{normalize, OutputAggregate, OutputResult, OutputType, TechniqueMeta};
pub use rule_catalog::{RuleCatalog, TechniqueRule};
pub use runner::{RawResult, RunRequest, Technique, TechniqueExecutor, TechniqueRunner};
pub use schema_analyzer::{AnalyzerConfig, ColumnProfile, ColumnType, Importance, SchemaAnalyzer, SchemaSummary};
pub use session::DatasetRegistry;
pub use target_planner::{TargetPlanner, TargetSuggestion, TaskType};
pub use variation::{apply_variation, generate_variations, VariationConfig};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Everything derivable from rows without running a technique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetAnalysis {
    pub schema: Vec<ColumnProfile>,
    pub summary: SchemaSummary,
    pub targets: Vec<TargetSuggestion>,
    pub variations: Vec<VariationConfig>,
}
/// One technique run, raw and normalized.
#[derive(Debug, Clone)]
pub struct TechniqueRun {
    pub raw: RawResult,
    pub outputs: Vec<OutputResult>,
}
pub struct TechniqueAdvisor {
    analyzer: SchemaAnalyzer,
    runner: TechniqueRunner,
    rules_path: PathBuf,
    variation_limit: usize,
}
impl TechniqueAdvisor {
    pub fn new(service: &ServiceConfig, runner: RunnerConfig) -> Self {
        Self::with_parts(
            SchemaAnalyzer::new(),
            TechniqueRunner::subprocess(runner),
            service.rules_path.clone(),
        )
    }
    pub fn with_parts(analyzer: SchemaAnalyzer, runner: TechniqueRunner, rules_path: impl Into<PathBuf>) -> Self {
        Self {
            analyzer,
            runner,
            rules_path: rules_path.into(),
            variation_limit: variation::DEFAULT_VARIATION_LIMIT,
        }
    }
    #[must_use]
    pub fn with_variation_limit(mut self, limit: usize) -> Self {
        self.variation_limit = limit;
        self
    }
    pub const fn analyzer(&self) -> &SchemaAnalyzer {
        &self.analyzer
    }
    pub const fn runner(&self) -> &TechniqueRunner {
        &self.runner
    }
    pub fn rules_path(&self) -> &Path {
        &self.rules_path
    }
    pub fn analyze(&self, rows: &[Row]) -> DatasetAnalysis {
        let started = Instant::now();
        let schema = self.analyzer.analyze(rows);
        let summary = SchemaAnalyzer::summarize(&schema, rows.len());
        let targets = TargetPlanner::suggest(&schema);
        let variations = generate_variations(&schema, self.variation_limit);
        logging::log_performance_metric("analysis_duration", started.elapsed().as_secs_f64() * 1000.0, "ms");
        DatasetAnalysis {
            schema,
            summary,
            targets,
            variations,
        }
    }
    /// Loads the catalog fresh so edits to the rules file apply to the next call.
    pub fn load_catalog(&self) -> Result<RuleCatalog> {
        Ok(RuleCatalog::from_file(&self.rules_path)?)
    }
    pub fn eligible_techniques(&self, input: &ConstraintInput, target: Option<&str>) -> Result<Vec<EligibleTechnique>> {
        let catalog = self.load_catalog()?;
        Ok(ConstraintEngine::evaluate(input, target, &catalog))
    }
    /// Runs a technique and normalizes its result; declared output types come from
    /// the catalog when it lists the technique.
    pub async fn run_technique(&self, request: &RunRequest, rows: &[Row]) -> Result<TechniqueRun> {
        if let Some(target) = request.target.as_deref().filter(|t| !t.trim().is_empty()) {
            if !rows.is_empty() && !rows.iter().any(|row| row.contains_key(target)) {
                return Err(ValidationError::UnknownColumn {
                    column: target.to_string(),
                }
                .into());
            }
        }
        let raw = self.runner.run(request, rows).await?;
        let output_types = self
            .load_catalog()
            .ok()
            .and_then(|catalog| catalog.get(&request.technique).map(|rule| rule.output_types.clone()))
            .unwrap_or_default();
        let meta = TechniqueMeta::new(request.technique.clone())
            .with_target(request.target.clone())
            .with_output_types(output_types);
        let outputs = normalize(&raw, &meta);
        Ok(TechniqueRun { raw, outputs })
    }
    pub fn auto_runner(&self) -> AutoRunner {
        AutoRunner::new(self.runner.clone())
    }
    /// Analyzes the rows, then runs every suggested technique and renders every
    /// chart variation into `aggregate`.
    pub async fn auto_run(&self, rows: &[Row], aggregate: &mut OutputAggregate) -> Result<AutoRunReport> {
        if rows.is_empty() {
            return Err(ValidationError::EmptyDataset.into());
        }
        let analysis = self.analyze(rows);
        if analysis.schema.is_empty() {
            return Err(ValidationError::EmptySchema.into());
        }
        Ok(self
            .auto_runner()
            .run(rows, &analysis.schema, &analysis.targets, &analysis.variations, aggregate)
            .await)
    }
}
