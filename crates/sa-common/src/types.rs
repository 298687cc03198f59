//! Policy and label enums shared across crates.
//!
//! All enums serialize as snake_case strings matching their `Display` form.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How null-distribution simulations stratify the baseline rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    /// One rate for every simulated minute.
    Global,
    /// 24 per-hour rates.
    #[default]
    HourOfDay,
    /// 168 per-(weekday, hour) rates.
    DayOfWeekHour,
}

impl CalibrationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationMode::Global => "global",
            CalibrationMode::HourOfDay => "hour_of_day",
            CalibrationMode::DayOfWeekHour => "day_of_week_hour",
        }
    }
}

impl fmt::Display for CalibrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalibrationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(CalibrationMode::Global),
            "hour_of_day" | "hourly" => Ok(CalibrationMode::HourOfDay),
            "day_of_week_hour" | "weekday_hour" => Ok(CalibrationMode::DayOfWeekHour),
            _ => Err(format!("unknown calibration mode: {}", s)),
        }
    }
}

/// Which FDR-controlled verdict decides final significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignificancePolicy {
    /// BH over the closed-form p-values.
    #[default]
    ParametricFdr,
    /// BH over the empirical (simulated) p-values.
    PermutationFdr,
    /// Logical OR of the two corrected decision sets.
    EitherFdr,
}

impl SignificancePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignificancePolicy::ParametricFdr => "parametric_fdr",
            SignificancePolicy::PermutationFdr => "permutation_fdr",
            SignificancePolicy::EitherFdr => "either_fdr",
        }
    }
}

impl fmt::Display for SignificancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignificancePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parametric_fdr" | "parametric" => Ok(SignificancePolicy::ParametricFdr),
            "permutation_fdr" | "permutation" => Ok(SignificancePolicy::PermutationFdr),
            "either_fdr" | "either" => Ok(SignificancePolicy::EitherFdr),
            _ => Err(format!("unknown significance policy: {}", s)),
        }
    }
}

/// Grouping used when applying Benjamini-Hochberg to a detector's tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FdrScope {
    /// One correction across every window length.
    #[default]
    Combined,
    /// An independent correction per window-length group.
    PerWindow,
}

impl fmt::Display for FdrScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FdrScope::Combined => write!(f, "combined"),
            FdrScope::PerWindow => write!(f, "per_window"),
        }
    }
}

/// Sign of a compositional deviation from baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    SubgroupAHeavy,
    SubgroupBHeavy,
    Neutral,
}

impl Direction {
    /// Classify a window or bucket delta. Window tests use `tolerance = 0.0`,
    /// so a zero delta counts as subgroup-a heavy.
    pub fn from_delta(delta: f64, tolerance: f64) -> Direction {
        if delta.is_nan() || (tolerance > 0.0 && delta.abs() < tolerance) {
            Direction::Neutral
        } else if delta >= 0.0 {
            Direction::SubgroupAHeavy
        } else {
            Direction::SubgroupBHeavy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::SubgroupAHeavy => "subgroup_a_heavy",
            Direction::SubgroupBHeavy => "subgroup_b_heavy",
            Direction::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_mode_round_trips_through_display() {
        for mode in [
            CalibrationMode::Global,
            CalibrationMode::HourOfDay,
            CalibrationMode::DayOfWeekHour,
        ] {
            assert_eq!(mode.to_string().parse::<CalibrationMode>().unwrap(), mode);
        }
        assert!("weekly".parse::<CalibrationMode>().is_err());
    }

    #[test]
    fn policy_serializes_snake_case() {
        let json = serde_json::to_string(&SignificancePolicy::EitherFdr).unwrap();
        assert_eq!(json, "\"either_fdr\"");
        let parsed: SignificancePolicy = serde_json::from_str("\"permutation_fdr\"").unwrap();
        assert_eq!(parsed, SignificancePolicy::PermutationFdr);
    }

    #[test]
    fn direction_from_delta() {
        assert_eq!(Direction::from_delta(0.2, 0.0), Direction::SubgroupAHeavy);
        assert_eq!(Direction::from_delta(0.0, 0.0), Direction::SubgroupAHeavy);
        assert_eq!(Direction::from_delta(-0.1, 0.0), Direction::SubgroupBHeavy);
        assert_eq!(Direction::from_delta(1e-12, 1e-9), Direction::Neutral);
        assert_eq!(Direction::from_delta(f64::NAN, 0.0), Direction::Neutral);
    }
}
