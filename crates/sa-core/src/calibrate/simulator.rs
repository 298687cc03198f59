//! Null-distribution simulator for the maximum window statistic.
//!
//! Each iteration draws one synthetic per-minute series from a [`NullModel`],
//! applies the rolling window and keeps the largest statistic. The random
//! generator is always passed in by the caller; nothing here holds RNG state.

use rand::Rng;
use rand_distr::{Binomial, Distribution, Poisson};
use sa_math::rolling_sum_into;
use std::time::{Duration, Instant};

use super::CalibrationError;

/// Probabilities fed to the Binomial sampler are kept inside
/// `[floor, 1 - floor]`.
const PROBABILITY_FLOOR: f64 = 1e-9;

/// Reusable buffers for one simulation sweep.
#[derive(Debug, Default)]
pub struct SimulationScratch {
    series: Vec<f64>,
    rolling: Vec<f64>,
}

impl SimulationScratch {
    pub fn with_capacity(n_minutes: usize) -> Self {
        SimulationScratch {
            series: Vec::with_capacity(n_minutes),
            rolling: Vec::with_capacity(n_minutes),
        }
    }
}

/// A per-minute generative null model.
pub trait NullModel {
    /// Precomputed per-window state (observed rolling totals, expected rates).
    type Frame;

    fn n_minutes(&self) -> usize;

    /// Per-window state, or `None` when no window of this length is
    /// testable (the null sample is then empty).
    fn frame(&self, window: usize) -> Option<Self::Frame>;

    /// Draw one synthetic series and return its maximum window statistic.
    fn draw_max<R: Rng + ?Sized>(
        &self,
        frame: &Self::Frame,
        rng: &mut R,
        scratch: &mut SimulationScratch,
    ) -> f64;
}

fn max_or_zero(values: impl Iterator<Item = f64>) -> f64 {
    values
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        .unwrap_or(0.0)
}

/// Poisson counts per minute; statistic is the maximum rolling total.
#[derive(Debug, Clone)]
pub struct CountNullModel {
    /// `None` for zero-rate minutes, which always draw 0.
    samplers: Vec<Option<Poisson<f64>>>,
}

impl CountNullModel {
    /// One rate per minute. Negative rates are clipped to zero.
    pub fn new(rates: &[f64]) -> Result<Self, CalibrationError> {
        let samplers = rates
            .iter()
            .enumerate()
            .map(|(index, &rate)| poisson_sampler(index, rate))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CountNullModel { samplers })
    }

    /// The same rate for all `n_minutes`.
    pub fn global(n_minutes: usize, rate: f64) -> Result<Self, CalibrationError> {
        let sampler = poisson_sampler(0, rate)?;
        Ok(CountNullModel {
            samplers: vec![sampler; n_minutes],
        })
    }
}

fn poisson_sampler(index: usize, rate: f64) -> Result<Option<Poisson<f64>>, CalibrationError> {
    if !rate.is_finite() {
        return Err(CalibrationError::InvalidRate { index, rate });
    }
    let rate = rate.max(0.0);
    if rate == 0.0 {
        return Ok(None);
    }
    Poisson::new(rate)
        .map(Some)
        .map_err(|_| CalibrationError::InvalidRate { index, rate })
}

impl NullModel for CountNullModel {
    type Frame = usize;

    fn n_minutes(&self) -> usize {
        self.samplers.len()
    }

    fn frame(&self, window: usize) -> Option<usize> {
        (window >= 1 && window <= self.samplers.len()).then_some(window)
    }

    fn draw_max<R: Rng + ?Sized>(
        &self,
        window: &usize,
        rng: &mut R,
        scratch: &mut SimulationScratch,
    ) -> f64 {
        scratch.series.clear();
        for sampler in &self.samplers {
            let draw = match sampler {
                Some(poisson) => poisson.sample(rng),
                None => 0.0,
            };
            scratch.series.push(draw);
        }
        rolling_sum_into(&scratch.series, *window, &mut scratch.rolling);
        max_or_zero(scratch.rolling.iter().copied())
    }
}

/// Binomial subgroup-a draws on the observed per-minute totals; statistic is
/// the maximum absolute deviation of the window share from its expected
/// rate, over windows with enough support.
#[derive(Debug, Clone)]
pub struct ProportionNullModel {
    trials: Vec<f64>,
    samplers: Vec<Binomial>,
    /// `n_i * p_i` per minute.
    expected_successes: Vec<f64>,
    /// Set when every minute shares one probability.
    constant_rate: Option<f64>,
    min_window_total: f64,
}

/// Per-window state of a [`ProportionNullModel`].
#[derive(Debug, Clone)]
pub struct ProportionFrame {
    window: usize,
    total_roll: Vec<f64>,
    expected_rate: Vec<f64>,
    valid: Vec<usize>,
}

impl ProportionNullModel {
    /// One probability per minute.
    pub fn new(
        trials: &[u64],
        probabilities: &[f64],
        min_window_total: u64,
    ) -> Result<Self, CalibrationError> {
        if trials.len() != probabilities.len() {
            return Err(CalibrationError::LengthMismatch {
                expected: trials.len(),
                actual: probabilities.len(),
            });
        }
        let mut samplers = Vec::with_capacity(trials.len());
        let mut expected_successes = Vec::with_capacity(trials.len());
        for (index, (&n, &p)) in trials.iter().zip(probabilities).enumerate() {
            let p = clip_probability(index, p)?;
            samplers.push(binomial_sampler(index, n, p)?);
            expected_successes.push(n as f64 * p);
        }
        Ok(ProportionNullModel {
            trials: trials.iter().map(|&n| n as f64).collect(),
            samplers,
            expected_successes,
            constant_rate: None,
            min_window_total: min_window_total as f64,
        })
    }

    /// One probability for every minute; deviations are measured against it
    /// directly.
    pub fn global(
        trials: &[u64],
        probability: f64,
        min_window_total: u64,
    ) -> Result<Self, CalibrationError> {
        let p = clip_probability(0, probability)?;
        let mut model = Self::new(trials, &vec![p; trials.len()], min_window_total)?;
        model.constant_rate = Some(p);
        Ok(model)
    }

    /// Expected subgroup-a share of every window of length `window`:
    /// `sum(n_i * p_i) / sum(n_i)`, or 0 for windows without submissions.
    pub fn expected_window_rates(&self, window: usize) -> Vec<f64> {
        if window == 0 || window > self.trials.len() {
            return Vec::new();
        }
        let n_windows = self.trials.len() - window + 1;
        if let Some(rate) = self.constant_rate {
            return vec![rate; n_windows];
        }
        let mut total_roll = Vec::new();
        let mut expected_roll = Vec::new();
        rolling_sum_into(&self.trials, window, &mut total_roll);
        rolling_sum_into(&self.expected_successes, window, &mut expected_roll);
        expected_roll
            .iter()
            .zip(&total_roll)
            .map(|(&e, &n)| if n > 0.0 { e / n } else { 0.0 })
            .collect()
    }
}

fn clip_probability(index: usize, probability: f64) -> Result<f64, CalibrationError> {
    if probability.is_nan() {
        return Err(CalibrationError::InvalidProbability { index, probability });
    }
    Ok(probability.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR))
}

fn binomial_sampler(index: usize, n: u64, p: f64) -> Result<Binomial, CalibrationError> {
    Binomial::new(n, p).map_err(|_| CalibrationError::InvalidProbability {
        index,
        probability: p,
    })
}

impl NullModel for ProportionNullModel {
    type Frame = ProportionFrame;

    fn n_minutes(&self) -> usize {
        self.trials.len()
    }

    fn frame(&self, window: usize) -> Option<ProportionFrame> {
        if window == 0 || window > self.trials.len() {
            return None;
        }
        let mut total_roll = Vec::new();
        rolling_sum_into(&self.trials, window, &mut total_roll);
        let valid: Vec<usize> = total_roll
            .iter()
            .enumerate()
            .filter(|(_, &n)| n >= self.min_window_total && n > 0.0)
            .map(|(i, _)| i)
            .collect();
        if valid.is_empty() {
            return None;
        }
        Some(ProportionFrame {
            window,
            expected_rate: self.expected_window_rates(window),
            total_roll,
            valid,
        })
    }

    fn draw_max<R: Rng + ?Sized>(
        &self,
        frame: &ProportionFrame,
        rng: &mut R,
        scratch: &mut SimulationScratch,
    ) -> f64 {
        scratch.series.clear();
        for sampler in &self.samplers {
            scratch.series.push(sampler.sample(rng) as f64);
        }
        rolling_sum_into(&scratch.series, frame.window, &mut scratch.rolling);
        max_or_zero(frame.valid.iter().map(|&i| {
            (scratch.rolling[i] / frame.total_roll[i] - frame.expected_rate[i]).abs()
        }))
    }
}

/// Optional wall-clock limit shared by every window of one detector run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterationBudget {
    deadline: Option<Instant>,
}

impl IterationBudget {
    pub fn unlimited() -> Self {
        IterationBudget { deadline: None }
    }

    /// Budget starting now; `None` means unlimited.
    pub fn from_millis(max_wall_time_ms: Option<u64>) -> Self {
        IterationBudget {
            deadline: max_wall_time_ms.map(|ms| Instant::now() + Duration::from_millis(ms)),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Simulated maxima for one window length.
#[derive(Debug, Clone, PartialEq)]
pub struct NullSample {
    pub window_minutes: usize,
    pub maxima: Vec<f64>,
    pub requested_iterations: usize,
    /// The budget ran out before `requested_iterations` draws.
    pub truncated: bool,
}

impl NullSample {
    pub fn completed_iterations(&self) -> usize {
        self.maxima.len()
    }
}

/// Runs a fixed number of independent iterations per window length.
#[derive(Debug, Clone, Copy)]
pub struct NullSimulator {
    iterations: usize,
    budget: IterationBudget,
}

impl NullSimulator {
    pub fn new(iterations: usize) -> Self {
        NullSimulator {
            iterations,
            budget: IterationBudget::unlimited(),
        }
    }

    pub fn with_budget(mut self, budget: IterationBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Null maxima for `window`. The budget is checked before every
    /// iteration after the first, so a non-empty sample always has at least
    /// one draw.
    pub fn simulate<M, R>(&self, model: &M, window: usize, rng: &mut R) -> NullSample
    where
        M: NullModel,
        R: Rng + ?Sized,
    {
        let mut sample = NullSample {
            window_minutes: window,
            maxima: Vec::new(),
            requested_iterations: self.iterations,
            truncated: false,
        };
        let Some(frame) = model.frame(window) else {
            return sample;
        };

        sample.maxima.reserve(self.iterations);
        let mut scratch = SimulationScratch::with_capacity(model.n_minutes());
        for iteration in 0..self.iterations {
            if iteration > 0 && self.budget.exhausted() {
                sample.truncated = true;
                break;
            }
            sample.maxima.push(model.draw_max(&frame, rng, &mut scratch));
        }
        sample
    }
}
