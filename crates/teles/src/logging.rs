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

use crate::error::TelesError;
use serde_json::Value;
use tracing::{debug, error, info, warn};
pub fn log_pipeline_event(event: &str, payload: Value) {
    debug!(
        event = event,
        payload = %serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string()),
        "Pipeline event"
    );
}
pub fn log_runner_event(technique: &str, event: &str, payload: Value) {
    debug!(
        technique = technique,
        event = event,
        payload = %serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string()),
        "Runner event"
    );
}
pub fn log_error(context: &str, error: &dyn std::error::Error) {
    error!(
        context = context,
        error = %error,
        "Execution error"
    );
}
/// Recoverable problems log at warn, everything else at error.
pub fn log_teles_error(context: &str, err: &TelesError) {
    if err.is_recoverable() {
        warn!(
            context = context,
            category = err.category(),
            severity = err.severity().as_str(),
            error = %err,
            "Recoverable error"
        );
    } else {
        log_error(context, err);
    }
}
pub fn log_performance_metric(metric_name: &str, value: f64, unit: &str) {
    info!(
        metric = metric_name,
        value = value,
        unit = unit,
        "Performance metric"
    );
}
