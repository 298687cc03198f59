//! Stance Audit configuration loading and validation.
//!
//! This crate provides:
//! - Typed detector configuration ([`BurstConfig`], [`SwingConfig`])
//! - Shared calibration settings ([`CalibrationConfig`])
//! - Bucketed-profile and direction-run settings ([`ProfileConfig`])
//! - JSON loading and semantic validation with stable error codes

pub mod detectors;
pub mod validate;

pub use detectors::{
    AuditConfig, BurstConfig, CalibrationConfig, ProfileConfig, SwingConfig,
    STANDARD_WINDOW_MINUTES,
};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
