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


use proptest::prelude::*;
use serde_json::{json, Map, Value};
use teles::constraint_engine::ConstraintEngine;
use teles::{
    generate_variations, normalize, ColumnProfile, ColumnType, ConstraintInput, OutputType, RawResult,
    SchemaAnalyzer, SchemaSummary, TargetPlanner, TechniqueMeta, TechniqueRule,
};

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i32>().prop_map(|n| json!(n)),
        (-1000.0f64..1000.0).prop_map(|f| json!(f)),
        "[a-z0-9]{0,4}".prop_map(Value::String),
        any::<bool>().prop_map(Value::Bool),
    ]
}

fn dataset() -> impl Strategy<Value = Vec<Map<String, Value>>> {
    prop::collection::vec(prop::collection::vec(cell(), 3), 0..25).prop_map(|rows| {
        rows.into_iter()
            .map(|cells| {
                ["alpha", "beta", "gamma"]
                    .iter()
                    .zip(cells)
                    .map(|(k, v)| ((*k).to_string(), v))
                    .collect()
            })
            .collect()
    })
}

fn column_type() -> impl Strategy<Value = ColumnType> {
    prop_oneof![
        Just(ColumnType::Numeric),
        Just(ColumnType::Categorical),
        Just(ColumnType::Datetime),
        Just(ColumnType::Text),
        Just(ColumnType::Unknown),
    ]
}

fn schema() -> impl Strategy<Value = Vec<ColumnProfile>> {
    prop::collection::vec(
        ("[a-z_]{1,10}", column_type(), 0usize..200, 0usize..200),
        0..8,
    )
    .prop_map(|cols| {
        cols.into_iter()
            .map(|(name, data_type, unique, missing)| {
                ColumnProfile::new(name, data_type)
                    .with_unique_values(unique)
                    .with_missing_values(missing)
            })
            .collect()
    })
}

fn summary() -> impl Strategy<Value = SchemaSummary> {
    (0usize..50, 0.0f64..=100.0, any::<bool>(), 0usize..50, 0usize..10_000).prop_map(
        |(numeric_feature_count, missing_percent, has_time_column, column_count, row_count)| SchemaSummary {
            numeric_feature_count,
            missing_percent,
            has_time_column,
            column_count,
            row_count,
        },
    )
}

proptest! {
    #[test]
    fn column_counts_stay_within_row_count(rows in dataset()) {
        let schema = SchemaAnalyzer::new().analyze(&rows);
        for profile in &schema {
            prop_assert!(profile.missing_values <= rows.len());
            prop_assert!(profile.unique_values <= rows.len() - profile.missing_values);
        }
    }

    #[test]
    fn analysis_is_repeatable(rows in dataset()) {
        let analyzer = SchemaAnalyzer::new();
        prop_assert_eq!(analyzer.analyze(&rows), analyzer.analyze(&rows));
    }

    #[test]
    fn target_confidence_is_bounded_and_sorted(schema in schema()) {
        let suggestions = TargetPlanner::suggest(&schema);
        prop_assert!(suggestions.iter().all(|s| s.confidence <= 100));
        prop_assert!(suggestions.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn permissive_rule_is_always_eligible(summary in summary(), with_target in any::<bool>()) {
        let rule = TechniqueRule::new("Anything", "kmeans");
        let input = ConstraintInput::Schema(summary);
        prop_assert!(ConstraintEngine::is_eligible(&input, with_target, &rule));
    }

    #[test]
    fn target_requirement_follows_target_presence(summary in summary(), target in prop::option::of("[a-z ]{0,6}")) {
        let mut rule = TechniqueRule::new("Classifier", "svc");
        rule.requires_target = true;
        let catalog = teles::RuleCatalog::new(vec![rule]).unwrap();
        let eligible = ConstraintEngine::evaluate(&ConstraintInput::Schema(summary), target.as_deref(), &catalog);
        let has_target = target.as_deref().is_some_and(|t| !t.trim().is_empty());
        prop_assert_eq!(eligible.len(), usize::from(has_target));
    }

    #[test]
    fn variations_are_deterministic_and_capped(schema in schema(), limit in 0usize..10) {
        let first = generate_variations(&schema, limit);
        prop_assert_eq!(&first, &generate_variations(&schema, limit));
        prop_assert!(first.len() <= limit);
    }

    #[test]
    fn explanation_alone_yields_one_text_output(text in "[a-z]{1,12}") {
        let raw = RawResult::from_value(json!({ "explanation": text })).unwrap();
        let outputs = normalize(&raw, &TechniqueMeta::new("svc"));
        prop_assert_eq!(outputs.len(), 1);
        prop_assert_eq!(outputs[0].output_type, OutputType::Text);
    }
}
