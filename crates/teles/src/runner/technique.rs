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
use crate::error::RunnerError;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechniqueFamily {
    NumericClustering,
    Regression,
    Classification,
    Forecasting,
    AnomalyDetection,
    DimensionalityReduction,
}
impl TechniqueFamily {
    /// Families whose runtime only accepts numeric feature rows.
    pub const fn numeric_only(self) -> bool {
        matches!(self, Self::NumericClustering)
    }
}
/// The techniques the runtime is allowed to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    Kmeans,
    IsolationForest,
    LinearRegression,
    RandomForestClassifier,
    Dbscan,
    RidgeRegression,
    LassoRegression,
    Svc,
    Svr,
    HierarchicalClustering,
    GaussianNb,
    GradientBoostingClassifier,
    GradientBoostingRegressor,
    ProphetForecasting,
    KernelPca,
}
impl Technique {
    pub const ALL: [Self; 15] = [
        Self::Kmeans,
        Self::IsolationForest,
        Self::LinearRegression,
        Self::RandomForestClassifier,
        Self::Dbscan,
        Self::RidgeRegression,
        Self::LassoRegression,
        Self::Svc,
        Self::Svr,
        Self::HierarchicalClustering,
        Self::GaussianNb,
        Self::GradientBoostingClassifier,
        Self::GradientBoostingRegressor,
        Self::ProphetForecasting,
        Self::KernelPca,
    ];
    pub const fn code(self) -> &'static str {
        match self {
            Self::Kmeans => "kmeans",
            Self::IsolationForest => "isolation_forest",
            Self::LinearRegression => "linear_regression",
            Self::RandomForestClassifier => "random_forest_classifier",
            Self::Dbscan => "dbscan",
            Self::RidgeRegression => "ridge_regression",
            Self::LassoRegression => "lasso_regression",
            Self::Svc => "svc",
            Self::Svr => "svr",
            Self::HierarchicalClustering => "hierarchical_clustering",
            Self::GaussianNb => "gaussian_nb",
            Self::GradientBoostingClassifier => "gradient_boosting_classifier",
            Self::GradientBoostingRegressor => "gradient_boosting_regressor",
            Self::ProphetForecasting => "prophet_forecasting",
            Self::KernelPca => "kernel_pca",
        }
    }
    pub const fn family(self) -> TechniqueFamily {
        match self {
            Self::Kmeans | Self::Dbscan | Self::HierarchicalClustering => {
                TechniqueFamily::NumericClustering
            }
            Self::LinearRegression
            | Self::RidgeRegression
            | Self::LassoRegression
            | Self::Svr
            | Self::GradientBoostingRegressor => TechniqueFamily::Regression,
            Self::RandomForestClassifier
            | Self::Svc
            | Self::GaussianNb
            | Self::GradientBoostingClassifier => TechniqueFamily::Classification,
            Self::ProphetForecasting => TechniqueFamily::Forecasting,
            Self::IsolationForest => TechniqueFamily::AnomalyDetection,
            Self::KernelPca => TechniqueFamily::DimensionalityReduction,
        }
    }
    /// Parameters applied when the caller does not supply them.
    pub const fn default_params(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Kmeans | Self::HierarchicalClustering => &[("n_clusters", "3")],
            _ => &[],
        }
    }
    /// Shapes rows into what the runtime expects for this technique. Numeric
    /// clustering keeps only fields holding a number (native, or a string that
    /// parses as one, converted).
    pub fn prepare_rows(self, rows: &[Row]) -> Vec<Row> {
        if !self.family().numeric_only() {
            return rows.to_vec();
        }
        rows.iter()
            .map(|row| {
                row.iter()
                    .filter_map(|(key, value)| numeric_cell(value).map(|n| (key.clone(), n)))
                    .collect()
            })
            .collect()
    }
}
fn numeric_cell(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.as_f64().is_some_and(f64::is_finite) => Some(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}
impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
impl FromStr for Technique {
    type Err = RunnerError;
    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| RunnerError::UnsupportedTechnique {
                code: code.to_string(),
            })
    }
}
