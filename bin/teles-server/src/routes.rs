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

use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use teles::dataset::rows_from_value;
use teles::logging::log_teles_error;
use teles::{
    generate_variations, AutoRunReport, ConstraintInput, OutputAggregate, OutputType, RunRequest, RunnerError,
    SchemaAnalyzer, TargetPlanner, Technique, TelesError, ValidationError,
};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip)]
    status: StatusCode,
}
impl ApiError {
    fn new(status: StatusCode, code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            details: None,
            status,
        }
    }
}
impl From<TelesError> for ApiError {
    fn from(e: TelesError) -> Self {
        log_teles_error("http", &e);
        let message = e.user_message();
        match e {
            TelesError::Validation(ValidationError::DatasetNotFound { .. }) => {
                Self::new(StatusCode::NOT_FOUND, "DATASET_NOT_FOUND", message)
            }
            TelesError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),
            TelesError::Runner(RunnerError::UnsupportedTechnique { .. }) => {
                Self::new(StatusCode::BAD_REQUEST, "UNSUPPORTED_TECHNIQUE", message)
            }
            TelesError::Runner(RunnerError::RuntimeExecution {
                technique,
                stderr,
                exit_code,
            }) => Self {
                details: Some(json!({ "stderr": stderr, "exit_code": exit_code })),
                ..Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "RUNTIME_EXECUTION_ERROR",
                    format!("Error running {technique} algorithm"),
                )
            },
            TelesError::Runner(RunnerError::Timeout { .. }) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, "RUNTIME_TIMEOUT", message)
            }
            TelesError::Runner(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "RUNNER_ERROR", message),
            TelesError::Schema(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "SCHEMA_CORRUPTION", message),
            TelesError::Catalog(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "CATALOG_ERROR", message),
            TelesError::Io(_) | TelesError::Serialisation(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            }
        }
    }
}
impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        TelesError::from(e).into()
    }
}
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(self);
        (status, body).into_response()
    }
}
type ApiResult<T> = Result<T, ApiError>;

pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/datasets", post(upload_dataset))
        .route("/schema/{id}", get(get_schema))
        .route("/targets/{id}", get(get_targets))
        .route("/variations/{id}", get(get_variations))
        .route("/constraints/{id}", get(get_constraints))
        .route("/run/{technique}/{id}", post(run_technique))
        .route("/auto/{id}", post(auto_run))
        .route("/outputs/{id}", get(get_outputs).delete(clear_outputs))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
/// Accepts a bare array of row objects or `{"rows": [...]}`.
async fn upload_dataset(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Json<Value>> {
    let rows_value = match body {
        Value::Object(mut obj) if obj.contains_key("rows") => obj.remove("rows").unwrap_or(Value::Null),
        other => other,
    };
    let rows = rows_from_value(rows_value)?;
    let schema = state.advisor.analyzer().analyze(&rows);
    let row_count = rows.len();
    let id = state.registry.register(rows, &schema).await?;
    info!(dataset = %id, rows = row_count, columns = schema.len(), "dataset uploaded");
    Ok(Json(json!({
        "id": id,
        "rows": row_count,
        "columns": schema.len(),
        "schema": schema,
    })))
}
async fn get_schema(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let schema = state.registry.schema(&id).await?;
    Ok(Json(json!({ "columns": schema })))
}
async fn get_targets(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let schema = state.registry.schema(&id).await?;
    Ok(Json(json!({ "targets": TargetPlanner::suggest(&schema) })))
}
#[derive(Debug, Deserialize)]
struct VariationQuery {
    limit: Option<usize>,
}
async fn get_variations(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VariationQuery>,
) -> ApiResult<Json<Value>> {
    let schema = state.registry.schema(&id).await?;
    let limit = query.limit.unwrap_or(teles::variation::DEFAULT_VARIATION_LIMIT);
    Ok(Json(json!({ "variations": generate_variations(&schema, limit) })))
}
#[derive(Debug, Deserialize)]
struct ConstraintQuery {
    target: Option<String>,
}
async fn get_constraints(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ConstraintQuery>,
) -> ApiResult<Json<Value>> {
    let entry = state.registry.get(&id).await?;
    let schema = entry.schema().map_err(TelesError::from)?;
    let summary = SchemaAnalyzer::summarize(&schema, entry.rows.len());
    let techniques = state
        .advisor
        .eligible_techniques(&ConstraintInput::Schema(summary), query.target.as_deref())?;
    Ok(Json(json!({ "valid_techniques": techniques })))
}
#[derive(Debug, Default, Deserialize)]
struct RunBody {
    #[serde(default)]
    target_column: Option<String>,
    #[serde(default)]
    params: Map<String, Value>,
}
/// A run whose output could not be parsed still answers with the full envelope,
/// under a 500 status.
async fn run_technique(
    State(state): State<AppState>,
    Path((technique, id)): Path<(String, String)>,
    Json(body): Json<RunBody>,
) -> ApiResult<Response> {
    technique.parse::<Technique>().map_err(TelesError::from)?;
    let rows = state.registry.rows(&id).await?;
    let request = RunRequest::new(technique.clone())
        .with_target(body.target_column)
        .with_json_params(&body.params);
    let run = state.advisor.run_technique(&request, &rows).await?;
    let stored = state
        .registry
        .record_run(&id, request.target.clone(), run.outputs)
        .await?;
    info!(dataset = %id, technique = %technique, stored, "technique run completed");
    let status = if run.raw.error().is_some() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok((status, Json(run.raw.to_response(&technique))).into_response())
}
/// Runs every suggested technique plus the chart variations. Per-technique
/// failures are reported in the body; the request itself still succeeds.
async fn auto_run(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<AutoRunReport>> {
    let rows = state.registry.rows(&id).await?;
    let mut produced = OutputAggregate::new();
    let report = state.advisor.auto_run(&rows, &mut produced).await?;
    let stored = state.registry.append_outputs(&id, report.outputs.clone()).await?;
    info!(
        dataset = %id,
        outputs = report.outputs.len(),
        failures = report.failures.len(),
        stored,
        "auto-run completed"
    );
    Ok(Json(report))
}
async fn get_outputs(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let outputs = state.registry.outputs(&id).await?;
    Ok(Json(json!(outputs)))
}
#[derive(Debug, Deserialize)]
struct ClearQuery {
    #[serde(rename = "type")]
    output_type: Option<String>,
    technique: Option<String>,
}
async fn clear_outputs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ClearQuery>,
) -> ApiResult<Json<Value>> {
    let output_type = query
        .output_type
        .as_deref()
        .map(str::parse::<OutputType>)
        .transpose()
        .map_err(|reason| ValidationError::InvalidParameter {
            name: "type".to_string(),
            value: reason,
        })?;
    let remaining = state
        .registry
        .with_outputs(&id, |aggregate| {
            match (output_type, query.technique.as_deref()) {
                (Some(t), _) => aggregate.clear_type(t),
                (None, Some(technique)) => aggregate.clear_technique(technique),
                (None, None) => aggregate.clear(),
            }
            aggregate.len()
        })
        .await?;
    Ok(Json(json!({ "remaining": remaining })))
}
