//! Monte Carlo null calibration.
//!
//! [`strata`] estimates per-stratum baseline rates from the observed series;
//! [`simulator`] draws synthetic series from them and records the maximum
//! window statistic of each draw.

pub mod simulator;
pub mod strata;

pub use simulator::{
    CountNullModel, IterationBudget, NullModel, NullSample, NullSimulator, ProportionNullModel,
    SimulationScratch,
};
pub use strata::{StratumTable, N_DAY_HOUR_STRATA, N_HOUR_STRATA};

use thiserror::Error;

/// Errors building a null model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("invalid Poisson rate {rate} at minute {index}")]
    InvalidRate { index: usize, rate: f64 },

    #[error("invalid Binomial probability {probability} at minute {index}")]
    InvalidProbability { index: usize, probability: f64 },

    #[error("null model has {expected} minutes but {actual} were supplied")]
    LengthMismatch { expected: usize, actual: usize },
}

impl CalibrationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            CalibrationError::InvalidRate { .. } => 70,
            CalibrationError::InvalidProbability { .. } => 71,
            CalibrationError::LengthMismatch { .. } => 72,
        }
    }
}

/// Threshold for `is_calibration_supported`.
///
/// Never below the FDR alpha, the configured support alpha, or the smallest
/// attainable empirical p-value `1 / (iterations + 1)`.
pub fn calibration_alpha(fdr_alpha: f64, support_alpha: f64, iterations: usize) -> f64 {
    fdr_alpha
        .max(support_alpha)
        .max(1.0 / (iterations as f64 + 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_alpha_floors() {
        assert_eq!(calibration_alpha(0.01, 0.1, 50), 0.1);
        assert_eq!(calibration_alpha(0.2, 0.1, 50), 0.2);
        assert_eq!(calibration_alpha(0.01, 0.05, 4), 0.2);
    }

    #[test]
    fn error_codes_are_distinct() {
        let codes = [
            CalibrationError::InvalidRate { index: 0, rate: f64::NAN }.code(),
            CalibrationError::InvalidProbability { index: 0, probability: 2.0 }.code(),
            CalibrationError::LengthMismatch { expected: 1, actual: 2 }.code(),
        ];
        assert_eq!(codes, [70, 71, 72]);
    }
}
