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


use async_trait::async_trait;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};
use teles::error::{RunnerError, RunnerResult};
use teles::runner::Invocation;
use teles::{
    ColumnProfile, ColumnType, ConstraintEngine, ConstraintInput, OutputAggregate, OutputType, RuleCatalog,
    RunRequest, SchemaAnalyzer, TechniqueAdvisor, TechniqueExecutor, TechniqueRunner, TelesError,
    ValidationError,
};

struct StubRuntime {
    stdout: String,
    calls: Mutex<Vec<String>>,
}

impl StubRuntime {
    fn new(stdout: &str) -> Arc<Self> {
        Arc::new(Self {
            stdout: stdout.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TechniqueExecutor for StubRuntime {
    async fn execute(&self, invocation: &Invocation) -> RunnerResult<String> {
        self.calls.lock().unwrap().push(invocation.technique.code().to_string());
        Ok(self.stdout.clone())
    }
    fn name(&self) -> &str {
        "stub"
    }
}

struct FailingRuntime;

#[async_trait]
impl TechniqueExecutor for FailingRuntime {
    async fn execute(&self, invocation: &Invocation) -> RunnerResult<String> {
        Err(RunnerError::RuntimeExecution {
            technique: invocation.technique.code().to_string(),
            stderr: "boom".to_string(),
            exit_code: Some(1),
        })
    }
    fn name(&self) -> &str {
        "failing"
    }
}

const KMEANS_RULE: &str = r#"[{
    "technique": "KMeans",
    "internal_code": "kmeans",
    "category": "clustering",
    "min_numeric_features": 1,
    "max_missing": 100,
    "time_series_required": false,
    "requires_target": false,
    "output_types": ["chart", "stats"]
}]"#;

fn rules_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(KMEANS_RULE.as_bytes()).unwrap();
    file
}

fn rows(value: Value) -> Vec<teles::Row> {
    teles::dataset::rows_from_value(value).unwrap()
}

#[tokio::test]
async fn kmeans_end_to_end_with_stubbed_runtime() {
    let schema = vec![
        ColumnProfile::new("age", ColumnType::Numeric),
        ColumnProfile::new("city", ColumnType::Categorical).with_unique_values(4),
    ];
    let catalog = RuleCatalog::from_json_str(KMEANS_RULE).unwrap();
    let summary = SchemaAnalyzer::summarize(&schema, 2);
    let eligible = ConstraintEngine::evaluate(&ConstraintInput::Schema(summary), None, &catalog);
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].name, "KMeans");

    let rules = rules_file();
    let runtime = StubRuntime::new(r#"{"stats":{"inertia":1.2},"charts":[{"x":1,"y":2}]}"#);
    let advisor = TechniqueAdvisor::with_parts(
        SchemaAnalyzer::new(),
        TechniqueRunner::new(runtime.clone()),
        rules.path(),
    );
    let data = rows(json!([{"age": 20, "city": "A"}, {"age": 30, "city": "B"}]));
    let run = advisor
        .run_technique(&RunRequest::new("kmeans"), &data)
        .await
        .unwrap();

    let mut aggregate = OutputAggregate::new();
    aggregate.extend(run.outputs);
    assert_eq!(aggregate.get(OutputType::Stats).len(), 1);
    assert_eq!(aggregate.get(OutputType::Chart).len(), 1);
    assert!(aggregate.get(OutputType::Text).is_empty());
    assert!(aggregate.get(OutputType::Table).is_empty());
    assert_eq!(aggregate.get(OutputType::Stats)[0].data, json!({"inertia": 1.2}));
    assert_eq!(
        aggregate.get(OutputType::Chart)[0].data["chartData"],
        json!([{"x": 1, "y": 2}])
    );
    assert_eq!(runtime.calls.lock().unwrap().as_slice(), ["kmeans"]);
}

#[tokio::test]
async fn analysis_feeds_constraints_and_targets() {
    let rules = rules_file();
    let advisor = TechniqueAdvisor::with_parts(
        SchemaAnalyzer::new(),
        TechniqueRunner::new(StubRuntime::new("{}")),
        rules.path(),
    );
    let data = rows(json!([
        {"price": 10, "label": "cheap"},
        {"price": 20, "label": "cheap"},
        {"price": 300, "label": "dear"},
    ]));
    let analysis = advisor.analyze(&data);
    assert_eq!(analysis.schema.len(), 2);
    assert_eq!(analysis.summary.numeric_feature_count, 1);
    assert_eq!(analysis.summary.row_count, 3);
    assert!(analysis.targets.iter().all(|t| t.confidence <= 100));
    let eligible = advisor
        .eligible_techniques(&ConstraintInput::Schema(analysis.summary), None)
        .unwrap();
    assert_eq!(eligible.len(), 1);
}

#[tokio::test]
async fn auto_run_collects_failures_and_still_renders_variations() {
    let rules = rules_file();
    let advisor = TechniqueAdvisor::with_parts(
        SchemaAnalyzer::new(),
        TechniqueRunner::new(Arc::new(FailingRuntime)),
        rules.path(),
    );
    let data = rows(json!([
        {"region": "north", "sales": 10},
        {"region": "south", "sales": 20},
        {"region": "north", "sales": 5},
    ]));
    let analysis = advisor.analyze(&data);
    let mut aggregate = OutputAggregate::new();
    let report = advisor
        .auto_runner()
        .run(&data, &analysis.schema, &analysis.targets, &analysis.variations, &mut aggregate)
        .await;
    assert!(report.outputs.len() >= analysis.variations.len());
    assert_eq!(aggregate.get(OutputType::Chart).len(), analysis.variations.len());
    assert!(report.failures.iter().all(|f| f.error.contains("boom")));
}

#[tokio::test]
async fn unparseable_runtime_output_becomes_failure_envelope() {
    let rules = rules_file();
    let advisor = TechniqueAdvisor::with_parts(
        SchemaAnalyzer::new(),
        TechniqueRunner::new(StubRuntime::new("Traceback: nothing useful")),
        rules.path(),
    );
    let data = rows(json!([{"age": 20}]));
    let run = advisor
        .run_technique(&RunRequest::new("kmeans"), &data)
        .await
        .unwrap();
    assert_eq!(run.raw.error(), Some("Failed to parse kmeans result"));
    let response = run.raw.to_response("kmeans");
    assert_eq!(response["charts"], json!({}));
}

#[tokio::test]
async fn target_missing_from_rows_is_rejected_before_the_runtime() {
    let rules = rules_file();
    let runtime = StubRuntime::new("{}");
    let advisor = TechniqueAdvisor::with_parts(SchemaAnalyzer::new(), TechniqueRunner::new(runtime.clone()), rules.path());
    let data = rows(json!([{"age": 20}, {"age": 30}]));
    let request = RunRequest::new("linear_regression").with_target(Some("price".to_string()));
    let err = advisor.run_technique(&request, &data).await.unwrap_err();
    assert!(matches!(
        err,
        TelesError::Validation(ValidationError::UnknownColumn { ref column }) if column == "price"
    ));
    assert!(runtime.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn auto_run_rejects_empty_rows_and_columnless_rows() {
    let rules = rules_file();
    let advisor = TechniqueAdvisor::with_parts(
        SchemaAnalyzer::new(),
        TechniqueRunner::new(StubRuntime::new("{}")),
        rules.path(),
    );
    let mut aggregate = OutputAggregate::new();
    let err = advisor.auto_run(&[], &mut aggregate).await.unwrap_err();
    assert!(matches!(err, TelesError::Validation(ValidationError::EmptyDataset)));
    let err = advisor
        .auto_run(&rows(json!([{}, {}])), &mut aggregate)
        .await
        .unwrap_err();
    assert!(matches!(err, TelesError::Validation(ValidationError::EmptySchema)));
    assert!(aggregate.is_empty());
}

#[tokio::test]
async fn auto_run_analyzes_and_fills_the_aggregate() {
    let rules = rules_file();
    let runtime = StubRuntime::new(r#"{"stats": {"score": 0.5}}"#);
    let advisor = TechniqueAdvisor::with_parts(SchemaAnalyzer::new(), TechniqueRunner::new(runtime.clone()), rules.path());
    let data = rows(json!([
        {"region": "north", "sales": 10},
        {"region": "south", "sales": 20},
        {"region": "north", "sales": 5},
    ]));
    let analysis = advisor.analyze(&data);
    let mut aggregate = OutputAggregate::new();
    let report = advisor.auto_run(&data, &mut aggregate).await.unwrap();
    assert_eq!(aggregate.len(), report.outputs.len());
    assert_eq!(aggregate.get(OutputType::Chart).len(), analysis.variations.len());
    assert_eq!(runtime.calls.lock().unwrap().len(), aggregate.get(OutputType::Stats).len());
}
