//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::detectors::{AuditConfig, BurstConfig, CalibrationConfig, ProfileConfig, SwingConfig};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_open_unit(field: &str, value: f64) -> ValidationResult<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(invalid(field, format!("Must be in (0, 1), got {}", value)));
    }
    Ok(())
}

fn validate_minutes(field: &str, values: &[usize]) -> ValidationResult<()> {
    if values.is_empty() {
        return Err(invalid(field, "Must list at least one length"));
    }
    if let Some(bad) = values.iter().find(|&&w| w == 0) {
        return Err(invalid(field, format!("Lengths must be >= 1, got {}", bad)));
    }
    Ok(())
}

/// Validate the whole configuration document.
pub fn validate_audit_config(config: &AuditConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }
    validate_burst_config(&config.bursts)?;
    validate_swing_config(&config.swings)?;
    Ok(())
}

/// Validate calibration settings under `prefix`.
///
/// Zero iterations is valid: it deactivates calibration and the detectors
/// fall back to parametric FDR.
pub fn validate_calibration(prefix: &str, calibration: &CalibrationConfig) -> ValidationResult<()> {
    validate_open_unit(&format!("{}.support_alpha", prefix), calibration.support_alpha)?;
    if calibration.max_wall_time_ms == Some(0) {
        return Err(invalid(
            format!("{}.max_wall_time_ms", prefix),
            "Must be positive when set",
        ));
    }
    Ok(())
}

pub fn validate_burst_config(config: &BurstConfig) -> ValidationResult<()> {
    validate_minutes("bursts.window_minutes", &config.window_minutes)?;
    validate_open_unit("bursts.fdr_alpha", config.fdr_alpha)?;
    validate_calibration("bursts.calibration", &config.calibration)?;
    Ok(())
}

pub fn validate_swing_config(config: &SwingConfig) -> ValidationResult<()> {
    validate_minutes("swings.window_minutes", &config.window_minutes)?;
    validate_open_unit("swings.fdr_alpha", config.fdr_alpha)?;
    if config.min_window_total == 0 {
        return Err(invalid("swings.min_window_total", "Must be >= 1"));
    }
    validate_calibration("swings.calibration", &config.calibration)?;
    validate_profiles(&config.profiles)?;
    Ok(())
}

pub fn validate_profiles(profiles: &ProfileConfig) -> ValidationResult<()> {
    validate_minutes("swings.profiles.bucket_minutes", &profiles.bucket_minutes)?;
    if profiles.direction_bucket_minutes == 0 {
        return Err(invalid("swings.profiles.direction_bucket_minutes", "Must be >= 1"));
    }
    if profiles.min_run_length == 0 {
        return Err(invalid("swings.profiles.min_run_length", "Must be >= 1"));
    }
    if !(profiles.stable_band_k > 0.0 && profiles.stable_band_k.is_finite()) {
        return Err(invalid(
            "swings.profiles.stable_band_k",
            format!("Must be positive, got {}", profiles.stable_band_k),
        ));
    }
    if !(profiles.stable_band_min_half_width >= 0.0 && profiles.stable_band_min_half_width < 1.0) {
        return Err(invalid(
            "swings.profiles.stable_band_min_half_width",
            format!("Must be in [0, 1), got {}", profiles.stable_band_min_half_width),
        ));
    }
    if !(profiles.neutral_tolerance >= 0.0 && profiles.neutral_tolerance.is_finite()) {
        return Err(ValidationError::SemanticError(format!(
            "swings.profiles.neutral_tolerance must be a finite non-negative number, got {}",
            profiles.neutral_tolerance
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        validate_audit_config(&AuditConfig::default()).unwrap();
    }

    #[test]
    fn rejects_out_of_range_alpha() {
        let config = BurstConfig {
            fdr_alpha: 1.5,
            ..BurstConfig::default()
        };
        let err = validate_burst_config(&config).unwrap_err();
        assert_eq!(err.code(), 65);
        assert!(err.to_string().contains("bursts.fdr_alpha"));
    }

    #[test]
    fn rejects_zero_window() {
        let config = SwingConfig {
            window_minutes: vec![15, 0],
            ..SwingConfig::default()
        };
        assert!(validate_swing_config(&config).is_err());
    }

    #[test]
    fn zero_iterations_is_allowed() {
        let config = BurstConfig {
            calibration: CalibrationConfig {
                iterations: 0,
                ..CalibrationConfig::default()
            },
            ..BurstConfig::default()
        };
        validate_burst_config(&config).unwrap();
    }

    #[test]
    fn rejects_bad_profile_settings() {
        let profiles = ProfileConfig {
            min_run_length: 0,
            ..ProfileConfig::default()
        };
        assert!(validate_profiles(&profiles).is_err());

        let profiles = ProfileConfig {
            neutral_tolerance: f64::NAN,
            ..ProfileConfig::default()
        };
        assert_eq!(validate_profiles(&profiles).unwrap_err().code(), 63);
    }

    #[test]
    fn version_mismatch_is_reported() {
        let config = AuditConfig {
            schema_version: "0.9.0".to_string(),
            ..AuditConfig::default()
        };
        let err = validate_audit_config(&config).unwrap_err();
        assert!(matches!(err, ValidationError::VersionMismatch { .. }));
    }
}
