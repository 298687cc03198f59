//! Detector configuration types.
//!
//! Every struct uses `#[serde(default)]`, so a JSON document only needs the
//! fields it overrides.

use sa_common::{CalibrationMode, FdrScope, SignificancePolicy};
use sa_math::DEFAULT_LOW_POWER_MIN_TOTAL;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::validate::{validate_audit_config, ValidationError, ValidationResult};

/// Window lengths (minutes) scanned by default; also the default profile
/// bucket granularities.
pub const STANDARD_WINDOW_MINUTES: [usize; 7] = [1, 5, 15, 30, 60, 120, 240];

fn normalize_minutes(values: &[usize]) -> Vec<usize> {
    let mut out: Vec<usize> = values.iter().copied().filter(|&w| w >= 1).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Monte Carlo calibration settings shared by both detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub enabled: bool,
    pub mode: CalibrationMode,
    pub significance_policy: SignificancePolicy,
    pub iterations: usize,
    pub seed: u64,
    /// Empirical p-value threshold for `is_calibration_supported`
    /// (floored at the FDR alpha and at 1/(iterations+1)).
    pub support_alpha: f64,
    /// Optional wall-clock budget per detector run; simulation stops early
    /// when exceeded.
    pub max_wall_time_ms: Option<u64>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: CalibrationMode::HourOfDay,
            significance_policy: SignificancePolicy::ParametricFdr,
            iterations: 50,
            seed: 42,
            support_alpha: 0.1,
            max_wall_time_ms: None,
        }
    }
}

impl CalibrationConfig {
    /// Calibration switched off; detectors use parametric FDR only.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            iterations: 0,
            ..Self::default()
        }
    }

    /// Calibration runs only when enabled with a positive iteration count.
    pub fn is_active(&self) -> bool {
        self.enabled && self.iterations > 0
    }

    pub fn with_mode(mut self, mode: CalibrationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_policy(mut self, policy: SignificancePolicy) -> Self {
        self.significance_policy = policy;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_support_alpha(mut self, support_alpha: f64) -> Self {
        self.support_alpha = support_alpha;
        self
    }
}

/// Volume-burst detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    pub window_minutes: Vec<usize>,
    pub fdr_alpha: f64,
    pub fdr_scope: FdrScope,
    pub low_power_min_total: u64,
    pub calibration: CalibrationConfig,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            window_minutes: STANDARD_WINDOW_MINUTES.to_vec(),
            fdr_alpha: 0.01,
            fdr_scope: FdrScope::Combined,
            low_power_min_total: DEFAULT_LOW_POWER_MIN_TOTAL,
            calibration: CalibrationConfig::default(),
        }
    }
}

impl BurstConfig {
    /// Burst config with calibration disabled.
    pub fn new(window_minutes: Vec<usize>, fdr_alpha: f64) -> Self {
        Self {
            window_minutes,
            fdr_alpha,
            calibration: CalibrationConfig::disabled(),
            ..Self::default()
        }
    }

    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    /// Sorted, de-duplicated window lengths (zero lengths dropped).
    pub fn normalized_windows(&self) -> Vec<usize> {
        normalize_minutes(&self.window_minutes)
    }
}

/// Bucketed profile and direction-run settings for the swing detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub bucket_minutes: Vec<usize>,
    /// Multiplier applied to the normal-consistent MAD.
    pub stable_band_k: f64,
    pub stable_band_min_half_width: f64,
    /// Granularity of the chronological profile scanned for direction runs.
    pub direction_bucket_minutes: usize,
    /// Runs at least this long are flagged `is_long_run`.
    pub min_run_length: usize,
    /// Bucket deltas with magnitude below this are neutral.
    pub neutral_tolerance: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: STANDARD_WINDOW_MINUTES.to_vec(),
            stable_band_k: 2.5,
            stable_band_min_half_width: 0.03,
            direction_bucket_minutes: 15,
            min_run_length: 3,
            neutral_tolerance: 1e-9,
        }
    }
}

impl ProfileConfig {
    pub fn normalized_buckets(&self) -> Vec<usize> {
        normalize_minutes(&self.bucket_minutes)
    }
}

/// Compositional-swing detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingConfig {
    pub window_minutes: Vec<usize>,
    pub fdr_alpha: f64,
    pub fdr_scope: FdrScope,
    /// Windows with fewer total submissions are not tested.
    pub min_window_total: u64,
    pub low_power_min_total: u64,
    pub calibration: CalibrationConfig,
    pub profiles: ProfileConfig,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            window_minutes: STANDARD_WINDOW_MINUTES.to_vec(),
            fdr_alpha: 0.01,
            fdr_scope: FdrScope::Combined,
            min_window_total: 25,
            low_power_min_total: DEFAULT_LOW_POWER_MIN_TOTAL,
            calibration: CalibrationConfig::default(),
            profiles: ProfileConfig::default(),
        }
    }
}

impl SwingConfig {
    /// Swing config with calibration disabled.
    pub fn new(window_minutes: Vec<usize>, fdr_alpha: f64, min_window_total: u64) -> Self {
        Self {
            window_minutes,
            fdr_alpha,
            min_window_total,
            calibration: CalibrationConfig::disabled(),
            ..Self::default()
        }
    }

    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn normalized_windows(&self) -> Vec<usize> {
        normalize_minutes(&self.window_minutes)
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub schema_version: String,
    pub bursts: BurstConfig,
    pub swings: SwingConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            bursts: BurstConfig::default(),
            swings: SwingConfig::default(),
        }
    }
}

impl AuditConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse_json(&content)
    }

    /// Parse and validate a JSON configuration document.
    pub fn parse_json(json: &str) -> ValidationResult<Self> {
        let config: AuditConfig = serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))?;
        validate_audit_config(&config)?;
        Ok(config)
    }

    /// Apply one calibration block to both detectors.
    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.bursts.calibration = calibration.clone();
        self.swings.calibration = calibration;
        self
    }
}
