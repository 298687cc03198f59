//! Configuration loading from files on disk.

use sa_common::{CalibrationMode, FdrScope, SignificancePolicy};
use sa_config::{AuditConfig, ValidationError};
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("audit.json");
    fs::write(&path, body).expect("write config");
    path
}

#[test]
fn loads_full_document_from_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        r#"{
            "schema_version": "1.0.0",
            "bursts": {
                "window_minutes": [5, 15],
                "fdr_alpha": 0.05,
                "fdr_scope": "per_window",
                "calibration": {
                    "enabled": true,
                    "mode": "day_of_week_hour",
                    "significance_policy": "either_fdr",
                    "iterations": 200,
                    "seed": 7
                }
            },
            "swings": {
                "window_minutes": [30],
                "min_window_total": 150,
                "profiles": {"direction_bucket_minutes": 30, "min_run_length": 4}
            }
        }"#,
    );

    let config = AuditConfig::from_file(&path).expect("load config");
    assert_eq!(config.bursts.window_minutes, vec![5, 15]);
    assert_eq!(config.bursts.fdr_scope, FdrScope::PerWindow);
    assert_eq!(config.bursts.calibration.mode, CalibrationMode::DayOfWeekHour);
    assert_eq!(
        config.bursts.calibration.significance_policy,
        SignificancePolicy::EitherFdr
    );
    assert_eq!(config.bursts.calibration.iterations, 200);
    assert_eq!(config.swings.min_window_total, 150);
    assert_eq!(config.swings.profiles.direction_bucket_minutes, 30);
    assert_eq!(config.swings.profiles.min_run_length, 4);
    // Untouched sections keep defaults.
    assert_eq!(config.swings.calibration.seed, 42);
}

#[test]
fn missing_file_is_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = AuditConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ValidationError::IoError(_)));
    assert_eq!(err.code(), 60);
}

#[test]
fn malformed_json_is_parse_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "{ not json");
    let err = AuditConfig::from_file(&path).unwrap_err();
    assert_eq!(err.code(), 61);
}

#[test]
fn unknown_policy_name_is_parse_error() {
    let err = AuditConfig::parse_json(
        r#"{"bursts": {"calibration": {"significance_policy": "bonferroni"}}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::ParseError(_)));
}

#[test]
fn semantic_errors_surface_after_parse() {
    let err = AuditConfig::parse_json(r#"{"swings": {"fdr_alpha": 0.0}}"#).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidValue { .. }));
}

#[test]
fn shared_calibration_applies_to_both_detectors() {
    let calibration = sa_config::CalibrationConfig::default()
        .with_mode(CalibrationMode::Global)
        .with_iterations(10);
    let config = AuditConfig::default().with_calibration(calibration.clone());
    assert_eq!(config.bursts.calibration, calibration);
    assert_eq!(config.swings.calibration, calibration);
}
