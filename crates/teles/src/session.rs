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

//! Per-dataset state shared by request handlers: rows, persisted schema text, the
//! selected target and the running output aggregate.

use crate::dataset::Row;
use crate::error::{Result, SchemaError, ValidationError};
use crate::normalizer::{OutputAggregate, OutputResult};
use crate::schema_analyzer::{load_schema_json, ColumnProfile};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DatasetEntry {
    pub id: String,
    pub rows: Arc<Vec<Row>>,
    schema_json: String,
    pub target: Option<String>,
    pub outputs: OutputAggregate,
    pub created_at: DateTime<Utc>,
}
impl DatasetEntry {
    pub fn schema(&self) -> std::result::Result<Vec<ColumnProfile>, SchemaError> {
        load_schema_json(&self.schema_json)
    }
    fn retarget(&mut self, target: Option<String>) {
        let target = target.filter(|t| !t.trim().is_empty());
        if self.target != target {
            self.outputs.clear();
            debug!(dataset = %self.id, target = ?target, "target changed, outputs cleared");
            self.target = target;
        }
    }
}
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    entries: Arc<RwLock<HashMap<String, DatasetEntry>>>,
}
impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub async fn register(&self, rows: Vec<Row>, schema: &[ColumnProfile]) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.insert(id.clone(), rows, schema).await?;
        Ok(id)
    }
    /// Stores under a caller-chosen id, superseding any previous dataset there.
    pub async fn insert(&self, id: String, rows: Vec<Row>, schema: &[ColumnProfile]) -> Result<()> {
        let schema_json = serde_json::to_string(schema)?;
        let entry = DatasetEntry {
            id: id.clone(),
            rows: Arc::new(rows),
            schema_json,
            target: None,
            outputs: OutputAggregate::new(),
            created_at: Utc::now(),
        };
        let replaced = self.entries.write().await.insert(id.clone(), entry).is_some();
        info!(dataset = %id, replaced, "dataset registered");
        Ok(())
    }
    pub async fn get(&self, id: &str) -> Result<DatasetEntry> {
        self.entries
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }
    pub async fn rows(&self, id: &str) -> Result<Arc<Vec<Row>>> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|e| Arc::clone(&e.rows))
            .ok_or_else(|| not_found(id))
    }
    pub async fn schema(&self, id: &str) -> Result<Vec<ColumnProfile>> {
        let guard = self.entries.read().await;
        let entry = guard.get(id).ok_or_else(|| not_found(id))?;
        Ok(entry.schema()?)
    }
    /// Changing the target clears outputs produced for the previous one.
    pub async fn select_target(&self, id: &str, target: Option<String>) -> Result<()> {
        let mut guard = self.entries.write().await;
        let entry = guard.get_mut(id).ok_or_else(|| not_found(id))?;
        entry.retarget(target);
        Ok(())
    }
    /// Selects `target` and appends the run's outputs under a single write lock.
    /// Returns the number of outputs held afterwards.
    pub async fn record_run(&self, id: &str, target: Option<String>, outputs: Vec<OutputResult>) -> Result<usize> {
        let mut guard = self.entries.write().await;
        let entry = guard.get_mut(id).ok_or_else(|| not_found(id))?;
        entry.retarget(target);
        entry.outputs.extend(outputs);
        Ok(entry.outputs.len())
    }
    pub async fn with_outputs<F, T>(&self, id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut OutputAggregate) -> T,
    {
        let mut guard = self.entries.write().await;
        let entry = guard.get_mut(id).ok_or_else(|| not_found(id))?;
        Ok(f(&mut entry.outputs))
    }
    pub async fn append_outputs(&self, id: &str, outputs: Vec<OutputResult>) -> Result<usize> {
        self.with_outputs(id, |aggregate| {
            aggregate.extend(outputs);
            aggregate.len()
        })
        .await
    }
    pub async fn outputs(&self, id: &str) -> Result<OutputAggregate> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|e| e.outputs.clone())
            .ok_or_else(|| not_found(id))
    }
    pub async fn remove(&self, id: &str) -> bool {
        self.entries.write().await.remove(id).is_some()
    }
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
    #[cfg(test)]
    async fn corrupt_schema(&self, id: &str) {
        if let Some(entry) = self.entries.write().await.get_mut(id) {
            entry.schema_json = "{truncated".to_string();
        }
    }
}
fn not_found(id: &str) -> crate::error::TelesError {
    ValidationError::DatasetNotFound { id: id.to_string() }.into()
}
