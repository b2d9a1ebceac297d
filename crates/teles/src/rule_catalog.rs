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

use crate::error::{CatalogError, CatalogResult};
use crate::normalizer::OutputType;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueRule {
    pub technique: String,
    pub internal_code: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub min_numeric_features: usize,
    #[serde(default = "default_max_missing")]
    pub max_missing: f64,
    #[serde(default)]
    pub time_series_required: bool,
    #[serde(default)]
    pub requires_target: bool,
    #[serde(default)]
    pub output_types: Vec<OutputType>,
}
const fn default_max_missing() -> f64 {
    100.0
}
impl TechniqueRule {
    pub fn new(technique: impl Into<String>, internal_code: impl Into<String>) -> Self {
        Self {
            technique: technique.into(),
            internal_code: internal_code.into(),
            category: String::new(),
            min_numeric_features: 0,
            max_missing: default_max_missing(),
            time_series_required: false,
            requires_target: false,
            output_types: Vec::new(),
        }
    }
}
/// Declarative technique rules in catalog order, with a lookup by internal code.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: Vec<TechniqueRule>,
    by_code: HashMap<String, usize>,
    by_category: HashMap<String, Vec<usize>>,
}
impl RuleCatalog {
    pub fn new(rules: Vec<TechniqueRule>) -> CatalogResult<Self> {
        let mut by_code = HashMap::new();
        let mut by_category: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, rule) in rules.iter().enumerate() {
            if rule.technique.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    index: idx,
                    field: "technique".to_string(),
                });
            }
            if rule.internal_code.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    index: idx,
                    field: "internal_code".to_string(),
                });
            }
            if rule.max_missing.is_nan() || rule.max_missing < 0.0 {
                return Err(CatalogError::InvalidMaxMissing {
                    technique: rule.technique.clone(),
                    value: rule.max_missing,
                });
            }
            if by_code.insert(rule.internal_code.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateCode {
                    code: rule.internal_code.clone(),
                });
            }
            by_category
                .entry(rule.category.clone())
                .or_default()
                .push(idx);
        }
        debug!(rules = rules.len(), categories = by_category.len(), "rule catalog indexed");
        Ok(Self {
            rules,
            by_code,
            by_category,
        })
    }
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let content = read_catalog(path.as_ref())?;
        let catalog = Self::from_json_str(&content)?;
        info!(path = %path.as_ref().display(), rules = catalog.len(), "loaded rule catalog");
        Ok(catalog)
    }
    pub fn from_json_str(content: &str) -> CatalogResult<Self> {
        let rules: Vec<TechniqueRule> = serde_json::from_str(content)?;
        Self::new(rules)
    }
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let content = read_catalog(path.as_ref())?;
        let catalog = Self::from_yaml_str(&content)?;
        info!(path = %path.as_ref().display(), rules = catalog.len(), "loaded rule catalog");
        Ok(catalog)
    }
    pub fn from_yaml_str(content: &str) -> CatalogResult<Self> {
        let rules: Vec<TechniqueRule> = serde_yaml::from_str(content)?;
        Self::new(rules)
    }
    /// Picks the parser from the file extension; `.yaml`/`.yml` are YAML, anything else JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let is_yaml = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml"));
        if is_yaml {
            Self::from_yaml_file(path)
        } else {
            Self::from_json_file(path)
        }
    }
    pub fn rules(&self) -> &[TechniqueRule] {
        &self.rules
    }
    pub fn get(&self, internal_code: &str) -> Option<&TechniqueRule> {
        self.by_code.get(internal_code).map(|&idx| &self.rules[idx])
    }
    pub fn by_category(&self, category: &str) -> Vec<&TechniqueRule> {
        self.by_category
            .get(category)
            .map(|ids| ids.iter().map(|&idx| &self.rules[idx]).collect())
            .unwrap_or_default()
    }
    pub fn categories(&self) -> HashSet<&str> {
        self.by_category.keys().map(String::as_str).collect()
    }
    pub fn len(&self) -> usize {
        self.rules.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
fn read_catalog(path: &Path) -> CatalogResult<String> {
    fs::read_to_string(path).map_err(|source| CatalogError::ReadFailed {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"technique": "KMeans", "internal_code": "kmeans", "category": "clustering",
         "min_numeric_features": 2, "max_missing": 10, "output_types": ["chart", "stats"]},
        {"technique": "Linear Regression", "internal_code": "linear_regression",
         "category": "regression", "min_numeric_features": 1, "max_missing": 5,
         "requires_target": true, "output_types": ["chart", "stats", "text"]}
    ]"#;

    #[test]
    fn parses_rules_with_defaults() {
        let catalog = RuleCatalog::from_json_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        let kmeans = catalog.get("kmeans").unwrap();
        assert!(!kmeans.requires_target);
        assert!(!kmeans.time_series_required);
        assert_eq!(kmeans.output_types, vec![OutputType::Chart, OutputType::Stats]);
        assert_eq!(catalog.by_category("regression").len(), 1);
        assert!(catalog.categories().contains("clustering"));
    }

    #[test]
    fn rejects_duplicate_codes() {
        let rules = vec![TechniqueRule::new("A", "svc"), TechniqueRule::new("B", "svc")];
        assert!(matches!(
            RuleCatalog::new(rules),
            Err(CatalogError::DuplicateCode { code }) if code == "svc"
        ));
    }

    #[test]
    fn rejects_empty_fields_and_negative_missing() {
        let rules = vec![TechniqueRule::new("A", "svc"), TechniqueRule::new("  ", "svr")];
        assert!(matches!(
            RuleCatalog::new(rules),
            Err(CatalogError::EmptyField { index: 1, .. })
        ));
        let mut rule = TechniqueRule::new("A", "svc");
        rule.max_missing = -1.0;
        assert!(matches!(
            RuleCatalog::new(vec![rule]),
            Err(CatalogError::InvalidMaxMissing { .. })
        ));
    }

    #[test]
    fn parses_yaml_catalog() {
        let yaml = "- technique: DBSCAN\n  internal_code: dbscan\n  category: clustering\n  output_types: [chart]\n";
        let catalog = RuleCatalog::from_yaml_str(yaml).unwrap();
        assert_eq!(catalog.rules()[0].max_missing, 100.0);
        assert_eq!(catalog.rules()[0].output_types, vec![OutputType::Chart]);
    }
}
