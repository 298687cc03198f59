//! JSON Schema generation for detector result types.
//!
//! Hosts that persist or forward detector output can validate it against
//! these schemas.

use schemars::schema_for;
use serde_json::Value;
use std::collections::BTreeMap;

pub use crate::detect::{
    BurstResult, BurstSummary, BurstWindowTests, DirectionRunSummary, DirectionRuns,
    NullDistribution, SwingProfiles, SwingResult, SwingSummary, SwingWindowTests,
};
pub use crate::significance::PolicyResolution;
pub use sa_common::{CalibrationMode, Direction, FdrScope, MinuteBucket, SignificancePolicy};

/// Available schema types with their descriptions.
pub fn available_schemas() -> Vec<(&'static str, &'static str)> {
    vec![
        // Input and shared enums
        ("MinuteBucket", "One minute of submission counts"),
        ("CalibrationMode", "Null simulation stratification"),
        ("SignificancePolicy", "Rule deciding window significance"),
        ("FdrScope", "Grouping of tests for FDR correction"),
        ("Direction", "Sign of a compositional deviation"),
        (
            "PolicyResolution",
            "Requested and effective significance policy",
        ),
        // Burst types
        ("BurstWindowTests", "Per-window burst tests"),
        ("BurstSummary", "Burst run summary"),
        ("BurstResult", "Complete burst detector output"),
        // Swing types
        ("SwingWindowTests", "Per-window swing tests"),
        ("SwingProfiles", "Bucketed subgroup-share profiles"),
        ("DirectionRuns", "Consecutive same-direction bucket runs"),
        ("DirectionRunSummary", "Direction runs aggregated by direction"),
        ("SwingSummary", "Swing run summary"),
        ("SwingResult", "Complete swing detector output"),
        // Calibration
        ("NullDistribution", "Simulated null maxima per window size"),
    ]
}

/// Generate JSON Schema for a type by name.
///
/// Returns `None` if the type is unknown.
pub fn generate_schema(type_name: &str) -> Option<Value> {
    let schema = match type_name {
        "MinuteBucket" => schema_for!(MinuteBucket),
        "CalibrationMode" => schema_for!(CalibrationMode),
        "SignificancePolicy" => schema_for!(SignificancePolicy),
        "FdrScope" => schema_for!(FdrScope),
        "Direction" => schema_for!(Direction),
        "PolicyResolution" => schema_for!(PolicyResolution),
        "BurstWindowTests" => schema_for!(BurstWindowTests),
        "BurstSummary" => schema_for!(BurstSummary),
        "BurstResult" => schema_for!(BurstResult),
        "SwingWindowTests" => schema_for!(SwingWindowTests),
        "SwingProfiles" => schema_for!(SwingProfiles),
        "DirectionRuns" => schema_for!(DirectionRuns),
        "DirectionRunSummary" => schema_for!(DirectionRunSummary),
        "SwingSummary" => schema_for!(SwingSummary),
        "SwingResult" => schema_for!(SwingResult),
        "NullDistribution" => schema_for!(NullDistribution),
        _ => return None,
    };
    serde_json::to_value(schema).ok()
}

/// Generate all schemas as a map from type name to schema.
pub fn generate_all_schemas() -> BTreeMap<String, Value> {
    available_schemas()
        .into_iter()
        .filter_map(|(name, _)| generate_schema(name).map(|schema| (name.to_string(), schema)))
        .collect()
}
