//! Per-step comparison of two learning-curve batches.
//!
//! Each batch is transposed to `[nb_steps][nb_runs]`, `sample_size` runs are
//! drawn with replacement (independently per batch), steps are kept every
//! `downsampling_fact`, and at each kept step a central tendency, an error
//! band and a Welch t-test are computed.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use tracing::info;

use crate::error::{AcError, Result};

use super::curves::LearningCurveBatch;
use super::descriptive::{mean, median, percentile, std_dev};
use super::welch::welch_t_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CentralTendency {
    #[default]
    Mean,
    Median,
}

impl FromStr for CentralTendency {
    type Err = AcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(CentralTendency::Mean),
            "median" => Ok(CentralTendency::Median),
            _ => Err(AcError::UnsupportedStatistic {
                kind: "central tendency",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CentralTendency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CentralTendency::Mean => write!(f, "mean"),
            CentralTendency::Median => write!(f, "median"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorBand {
    /// Symmetric percentile interval of the sample
    Percentile,
    /// central ± population standard deviation
    #[default]
    Std,
    /// central ± std / sqrt(number of kept steps). The divisor is the length
    /// of the step axis, not the number of sampled runs.
    Sem,
}

impl FromStr for ErrorBand {
    type Err = AcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentile" | "pi" => Ok(ErrorBand::Percentile),
            "std" | "sd" => Ok(ErrorBand::Std),
            "sem" | "se" => Ok(ErrorBand::Sem),
            _ => Err(AcError::UnsupportedStatistic {
                kind: "error band",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ErrorBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBand::Percentile => write!(f, "percentile"),
            ErrorBand::Std => write!(f, "std"),
            ErrorBand::Sem => write!(f, "sem"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComparatorConfig {
    /// Runs drawn with replacement from each batch
    pub sample_size: usize,
    /// Step stride
    pub downsampling_fact: usize,
    /// Significance level of the Welch test
    pub alpha: f64,
    pub central: CentralTendency,
    pub band: ErrorBand,
    /// Coverage of the percentile band, in percent
    pub band_percentile: f64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            sample_size: 20,
            downsampling_fact: 1,
            alpha: 0.05,
            central: CentralTendency::Mean,
            band: ErrorBand::default(),
            band_percentile: 95.0,
        }
    }
}

impl ComparatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_size < 2 {
            return Err(AcError::config(format!(
                "sample_size must be at least 2, got {}",
                self.sample_size
            )));
        }
        if self.downsampling_fact == 0 {
            return Err(AcError::config("downsampling_fact must be positive"));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(AcError::config(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if !(self.band_percentile > 0.0 && self.band_percentile <= 100.0) {
            return Err(AcError::config(format!(
                "band_percentile must be in (0, 100], got {}",
                self.band_percentile
            )));
        }
        Ok(())
    }
}

/// Statistics of one kept step
#[derive(Debug, Clone, PartialEq)]
pub struct StepComparison {
    /// Index in the original (not downsampled) step axis
    pub step: usize,
    pub central1: f64,
    pub band1: (f64, f64),
    pub central2: f64,
    pub band2: (f64, f64),
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub steps: Vec<StepComparison>,
}

impl ComparisonResult {
    pub fn significant_steps(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|s| s.significant)
            .map(|s| s.step)
            .collect()
    }

    pub fn nb_significant(&self) -> usize {
        self.steps.iter().filter(|s| s.significant).count()
    }

    pub fn log_summary(&self, label1: &str, label2: &str) {
        info!(
            "Comparison {} vs {}: {}/{} kept steps significant",
            label1,
            label2,
            self.nb_significant(),
            self.steps.len()
        );
        if let Some(last) = self.steps.last() {
            info!(
                "  step {}: {} {:.2} [{:.2}, {:.2}] | {} {:.2} [{:.2}, {:.2}] | p={:.4}",
                last.step,
                label1,
                last.central1,
                last.band1.0,
                last.band1.1,
                label2,
                last.central2,
                last.band2.0,
                last.band2.1,
                last.p_value
            );
        }
    }
}

pub struct Comparator {
    config: ComparatorConfig,
}

impl Comparator {
    pub fn new(config: ComparatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    pub fn compare<R: Rng + ?Sized>(
        &self,
        batch1: &LearningCurveBatch,
        batch2: &LearningCurveBatch,
        rng: &mut R,
    ) -> Result<ComparisonResult> {
        if batch1.nb_steps() != batch2.nb_steps() {
            return Err(AcError::config(format!(
                "batches have different step counts: {} vs {}",
                batch1.nb_steps(),
                batch2.nb_steps()
            )));
        }

        let sample1 = self.sample(batch1, rng);
        let sample2 = self.sample(batch2, rng);
        let nb_kept = sample1.len();

        let steps = sample1
            .iter()
            .zip(&sample2)
            .map(|((step, a), (_, b))| {
                let central1 = self.central(a);
                let central2 = self.central(b);
                let test = welch_t_test(a, b);
                let percentile = self.config.band_percentile;
                StepComparison {
                    step: *step,
                    central1,
                    band1: error_band(self.config.band, central1, a, nb_kept, percentile),
                    central2,
                    band2: error_band(self.config.band, central2, b, nb_kept, percentile),
                    p_value: test.p_value,
                    significant: test.is_significant(self.config.alpha),
                }
            })
            .collect();

        Ok(ComparisonResult { steps })
    }

    /// Resampled runs at every kept step: `[(step, values)]`
    fn sample<R: Rng + ?Sized>(
        &self,
        batch: &LearningCurveBatch,
        rng: &mut R,
    ) -> Vec<(usize, Vec<f64>)> {
        let ids: Vec<usize> = (0..self.config.sample_size)
            .map(|_| rng.random_range(0..batch.nb_runs()))
            .collect();

        batch
            .transposed()
            .into_iter()
            .enumerate()
            .step_by(self.config.downsampling_fact)
            .map(|(step, runs)| (step, ids.iter().map(|&id| runs[id]).collect()))
            .collect()
    }

    fn central(&self, values: &[f64]) -> f64 {
        match self.config.central {
            CentralTendency::Mean => mean(values),
            CentralTendency::Median => median(values),
        }
    }
}

/// Lower and upper band around `central` for one step's sample
pub(crate) fn error_band(
    kind: ErrorBand,
    central: f64,
    sample: &[f64],
    nb_kept: usize,
    band_percentile: f64,
) -> (f64, f64) {
    match kind {
        ErrorBand::Percentile => {
            let tail = (100.0 - band_percentile) / 2.0;
            (percentile(sample, tail), percentile(sample, 100.0 - tail))
        }
        ErrorBand::Std => {
            let std = std_dev(sample);
            (central - std, central + std)
        }
        ErrorBand::Sem => {
            let sem = std_dev(sample) / (nb_kept as f64).sqrt();
            (central - sem, central + sem)
        }
    }
}
