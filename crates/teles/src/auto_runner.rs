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
use crate::logging::{log_performance_metric, log_pipeline_event};
use crate::normalizer::{normalize, ChartMeta, OutputAggregate, OutputResult, OutputType, TechniqueMeta};
use crate::preprocess::preprocess_dataset;
use crate::runner::{RunRequest, Technique, TechniqueRunner};
use crate::schema_analyzer::ColumnProfile;
use crate::target_planner::{TargetSuggestion, TaskType};
use crate::variation::{apply_variation, VariationConfig};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::warn;

/// Technique name recorded on outputs rendered from chart variations.
pub const VARIATION_TECHNIQUE: &str = "chart";

pub const fn techniques_for_task(task: TaskType) -> &'static [Technique] {
    match task {
        TaskType::Regression => &[
            Technique::LinearRegression,
            Technique::RidgeRegression,
            Technique::LassoRegression,
            Technique::Svr,
            Technique::GradientBoostingRegressor,
        ],
        TaskType::Classification => &[
            Technique::RandomForestClassifier,
            Technique::Svc,
            Technique::GaussianNb,
            Technique::GradientBoostingClassifier,
        ],
        TaskType::Forecasting => &[Technique::ProphetForecasting],
        TaskType::Clustering => &[Technique::Kmeans],
    }
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub technique: String,
    pub target: Option<String>,
    pub error: String,
}
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutoRunReport {
    pub outputs: Vec<OutputResult>,
    pub failures: Vec<RunFailure>,
}
/// Runs every technique suggested for a dataset, then renders chart variations.
/// Individual failures are logged and recorded; the batch always completes.
pub struct AutoRunner {
    runner: TechniqueRunner,
}
impl AutoRunner {
    pub const fn new(runner: TechniqueRunner) -> Self {
        Self { runner }
    }
    pub async fn run(
        &self,
        rows: &[Row],
        schema: &[ColumnProfile],
        targets: &[TargetSuggestion],
        variations: &[VariationConfig],
        aggregate: &mut OutputAggregate,
    ) -> AutoRunReport {
        let started = Instant::now();
        let cleaned = preprocess_dataset(rows, schema);
        log_pipeline_event(
            "auto_run_started",
            json!({
                "rows": rows.len(),
                "cleaned_rows": cleaned.len(),
                "targets": targets.len(),
                "variations": variations.len(),
            }),
        );
        let mut report = AutoRunReport::default();
        for suggestion in targets {
            let target = Some(suggestion.column.clone()).filter(|c| !c.is_empty());
            for technique in techniques_for_task(suggestion.task_type) {
                let request = RunRequest::new(technique.code()).with_target(target.clone());
                let result = match self.runner.run(&request, &cleaned).await {
                    Ok(raw) => match raw.error().map(str::to_string) {
                        Some(error) => Err(error),
                        None => Ok(raw),
                    },
                    Err(err) => Err(err.to_string()),
                };
                match result {
                    Ok(raw) => {
                        let meta = TechniqueMeta::new(technique.code()).with_target(target.clone());
                        let outputs = normalize(&raw, &meta);
                        aggregate.extend(outputs.iter().cloned());
                        report.outputs.extend(outputs);
                    }
                    Err(error) => {
                        warn!(
                            technique = technique.code(),
                            target = target.as_deref().unwrap_or(""),
                            error = %error,
                            "auto-run technique failed"
                        );
                        report.failures.push(RunFailure {
                            technique: technique.code().to_string(),
                            target: target.clone(),
                            error,
                        });
                    }
                }
            }
        }
        for variation in variations {
            let output = render_variation(&cleaned, variation);
            aggregate.push(output.clone());
            report.outputs.push(output);
        }
        log_performance_metric(
            "auto_run_duration",
            started.elapsed().as_secs_f64() * 1000.0,
            "ms",
        );
        log_pipeline_event(
            "auto_run_finished",
            json!({"outputs": report.outputs.len(), "failures": report.failures.len()}),
        );
        report
    }
}
pub fn render_variation(rows: &[Row], variation: &VariationConfig) -> OutputResult {
    let chart_data: Vec<Value> = apply_variation(rows, variation)
        .into_iter()
        .map(Value::Object)
        .collect();
    OutputResult {
        technique: VARIATION_TECHNIQUE.to_string(),
        target: None,
        output_type: OutputType::Chart,
        data: json!({
            "chartType": variation.chart_type.as_str(),
            "xKey": variation.x,
            "yKey": variation.y,
            "chartData": chart_data,
        }),
        chart: Some(ChartMeta {
            title: Some(variation.title.clone()),
            description: variation.description.clone(),
            chart_type: Some(variation.chart_type.as_str().to_string()),
        }),
    }
}
