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

use crate::normalizer::OutputType;
use crate::rule_catalog::{RuleCatalog, TechniqueRule};
use crate::schema_analyzer::SchemaSummary;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the caller knows about the dataset. The column-count form is a coarse
/// fallback that checks only `min_numeric_features`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintInput {
    Schema(SchemaSummary),
    ColumnCount(usize),
}
impl From<SchemaSummary> for ConstraintInput {
    fn from(summary: SchemaSummary) -> Self {
        Self::Schema(summary)
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleTechnique {
    pub name: String,
    pub code: String,
    pub tags: Vec<String>,
    pub output_types: Vec<OutputType>,
}
impl From<&TechniqueRule> for EligibleTechnique {
    fn from(rule: &TechniqueRule) -> Self {
        Self {
            name: rule.technique.clone(),
            code: rule.internal_code.clone(),
            tags: vec![rule.category.clone()],
            output_types: rule.output_types.clone(),
        }
    }
}
pub struct ConstraintEngine;
impl ConstraintEngine {
    pub fn evaluate(
        input: &ConstraintInput,
        target: Option<&str>,
        catalog: &RuleCatalog,
    ) -> Vec<EligibleTechnique> {
        let has_target = target.is_some_and(|t| !t.trim().is_empty());
        let eligible: Vec<EligibleTechnique> = catalog
            .rules()
            .iter()
            .filter(|rule| Self::is_eligible(input, has_target, rule))
            .map(EligibleTechnique::from)
            .collect();
        debug!(
            rules = catalog.len(),
            eligible = eligible.len(),
            has_target,
            "constraints evaluated"
        );
        eligible
    }
    pub fn is_eligible(input: &ConstraintInput, has_target: bool, rule: &TechniqueRule) -> bool {
        match input {
            ConstraintInput::ColumnCount(count) => *count >= rule.min_numeric_features,
            ConstraintInput::Schema(summary) => {
                summary.numeric_feature_count >= rule.min_numeric_features
                    && summary.missing_percent <= rule.max_missing
                    && (!rule.time_series_required || summary.has_time_column)
                    && (!rule.requires_target || has_target)
            }
        }
    }
}
