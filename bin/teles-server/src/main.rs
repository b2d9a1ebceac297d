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

// Minimal bootstrap; analysis logic lives in the teles crate.
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use teles::dataset::load_rows;
use teles::{ConstraintInput, OutputAggregate, RunRequest, RunnerConfig, SchemaAnalyzer, ServiceConfig, TechniqueAdvisor};
use tracing::{info, warn};

mod routes;
mod state;

use routes::build_router;
use state::AppState;

#[derive(Parser, Debug, Clone)]
#[command(name = "teles-server", about = "Schema-driven analysis technique advisor")]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    Serve {
        #[arg(long)]
        addr: Option<String>,
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Profile a CSV or JSON file and print schema, targets and chart variations.
    Analyze { file: PathBuf },
    /// List techniques whose constraints the file satisfies.
    Constraints {
        file: PathBuf,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Run every suggested technique and chart variation, printing the report.
    Auto {
        file: PathBuf,
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    Run {
        technique: String,
        file: PathBuf,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();
    let cli = Cli::parse();
    match cli.cmd.unwrap_or(Command::Serve { addr: None, rules: None }) {
        Command::Serve { addr, rules } => run_server(addr, rules).await,
        Command::Analyze { file } => analyze(file),
        Command::Constraints { file, target, rules } => constraints(file, target, rules),
        Command::Auto { file, rules } => auto(file, rules).await,
        Command::Run {
            technique,
            file,
            target,
            rules,
        } => run_once(technique, file, target, rules).await,
    }
}

fn build_advisor(rules: Option<PathBuf>) -> (ServiceConfig, TechniqueAdvisor) {
    let mut service = ServiceConfig::from_env();
    if let Some(path) = rules {
        service.rules_path = path;
    }
    let advisor = TechniqueAdvisor::new(&service, RunnerConfig::from_env());
    (service, advisor)
}

fn analyze(file: PathBuf) -> Result<()> {
    let rows = load_rows(&file)?;
    let (_, advisor) = build_advisor(None);
    let analysis = advisor.analyze(&rows);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn constraints(file: PathBuf, target: Option<String>, rules: Option<PathBuf>) -> Result<()> {
    let rows = load_rows(&file)?;
    let (_, advisor) = build_advisor(rules);
    let schema = advisor.analyzer().analyze(&rows);
    let summary = SchemaAnalyzer::summarize(&schema, rows.len());
    let techniques = advisor.eligible_techniques(&ConstraintInput::Schema(summary), target.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "valid_techniques": techniques }))?);
    Ok(())
}

async fn auto(file: PathBuf, rules: Option<PathBuf>) -> Result<()> {
    let rows = load_rows(&file)?;
    let (_, advisor) = build_advisor(rules);
    let mut aggregate = OutputAggregate::new();
    let report = advisor.auto_run(&rows, &mut aggregate).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.failures.is_empty() {
        warn!(failures = report.failures.len(), "some techniques failed");
    }
    Ok(())
}

async fn run_once(technique: String, file: PathBuf, target: Option<String>, rules: Option<PathBuf>) -> Result<()> {
    let rows = load_rows(&file)?;
    let (_, advisor) = build_advisor(rules);
    let request = RunRequest::new(technique.clone()).with_target(target);
    let run = advisor.run_technique(&request, &rows).await?;
    println!("{}", serde_json::to_string_pretty(&run.raw.to_response(&technique))?);
    if let Some(err) = run.raw.error() {
        anyhow::bail!("{technique} failed: {err}");
    }
    Ok(())
}

async fn run_server(addr: Option<String>, rules: Option<PathBuf>) -> Result<()> {
    info!("teles-server starting");
    let (mut service, advisor) = build_advisor(rules);
    if let Some(addr) = addr {
        service.http_addr = addr;
    }
    match advisor.load_catalog() {
        Ok(catalog) => info!(rules = catalog.len(), path = %service.rules_path.display(), "rule catalog loaded"),
        Err(e) => warn!(error = %e, path = %service.rules_path.display(), "rule catalog unavailable at startup"),
    }
    let app = build_router(AppState::new(advisor), service.body_limit);
    let addr: SocketAddr = service.http_addr.parse()?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!(error=%e, %addr, "bind failed, using ephemeral");
            tokio::net::TcpListener::bind("127.0.0.1:0").await?
        }
    };
    let local = listener.local_addr()?;
    info!(%local, "teles-server listening");

    tokio::select! { _ = axum::serve(listener, app) => {} _ = tokio::signal::ctrl_c() => {} }

    info!("teles-server shutting down");
    Ok(())
}
