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


#![cfg(unix)]

use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use teles::error::RunnerError;
use teles::{RunRequest, RunnerConfig, TechniqueRunner};

fn script(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
    writeln!(file, "{body}").unwrap();
    file
}

fn runner(script: &tempfile::NamedTempFile, timeout: Option<Duration>) -> TechniqueRunner {
    let config = RunnerConfig::default()
        .with_program("sh")
        .with_entry_script(script.path())
        .with_timeout(timeout);
    TechniqueRunner::subprocess(config)
}

fn rows() -> Vec<teles::Row> {
    teles::dataset::rows_from_value(json!([{"age": 20}, {"age": "30"}])).unwrap()
}

#[tokio::test]
async fn runtime_receives_code_data_file_and_params() {
    let stub = script(
        r#"rows=$(cat "$2")
echo "loading model..."
printf '{"technique":"%s","path":"%s","param":"%s","rows":%s}\n' "$1" "$2" "$3" "$rows""#,
    );
    let raw = runner(&stub, Some(Duration::from_secs(30)))
        .run(&RunRequest::new("kmeans"), &rows())
        .await
        .unwrap();
    assert_eq!(raw.get("technique"), Some(&json!("kmeans")));
    assert_eq!(raw.get("param"), Some(&json!("n_clusters=3")));
    assert_eq!(raw.get("rows"), Some(&json!([{"age": 20}, {"age": 30.0}])));
    let path = raw.get("path").and_then(|v| v.as_str()).unwrap();
    assert!(path.contains("teles_kmeans_"));
    assert!(!Path::new(path).exists());
}

#[tokio::test]
async fn runtime_receives_selected_target_as_target_column() {
    let stub = script(r#"printf '{"args":"%s"}\n' "$*""#);
    let raw = runner(&stub, Some(Duration::from_secs(30)))
        .run(
            &RunRequest::new("linear_regression").with_target(Some("age".to_string())),
            &rows(),
        )
        .await
        .unwrap();
    let args = raw.get("args").and_then(|v| v.as_str()).unwrap();
    assert!(args.starts_with("linear_regression "));
    assert!(args.ends_with(" target_column=age"));
}

#[tokio::test]
async fn non_zero_exit_carries_stderr() {
    let stub = script("echo 'model exploded' >&2\nexit 3");
    let err = runner(&stub, None)
        .run(&RunRequest::new("svc").with_target(Some("age".to_string())), &rows())
        .await
        .unwrap_err();
    match err {
        RunnerError::RuntimeExecution {
            technique,
            stderr,
            exit_code,
        } => {
            assert_eq!(technique, "svc");
            assert!(stderr.contains("model exploded"));
            assert_eq!(exit_code, Some(3));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn slow_runtime_times_out() {
    let stub = script("sleep 5\necho '{}'");
    let err = runner(&stub, Some(Duration::from_millis(200)))
        .run(&RunRequest::new("dbscan"), &rows())
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Timeout { .. }));
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let stub = script("echo '{}'");
    let config = RunnerConfig::default()
        .with_program("teles-no-such-interpreter")
        .with_entry_script(stub.path());
    let err = TechniqueRunner::subprocess(config)
        .run(&RunRequest::new("kmeans"), &rows())
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Spawn { .. }));
}
