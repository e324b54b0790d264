use crate::error::{AcError, Result};

/// `[nb_runs][nb_steps]` collection of a scalar performance metric.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningCurveBatch {
    nb_runs: usize,
    nb_steps: usize,
    data: Vec<f64>,
}

impl LearningCurveBatch {
    /// Build from one row per run. Rows must be non-empty and all the same length.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let nb_runs = rows.len();
        if nb_runs == 0 {
            return Err(AcError::config("learning curve batch has no runs"));
        }
        let nb_steps = rows[0].len();
        if nb_steps == 0 {
            return Err(AcError::config("learning curves have no steps"));
        }
        if let Some((run, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != nb_steps) {
            return Err(AcError::config(format!(
                "ragged learning curve batch: run {} has {} steps, expected {}",
                run,
                row.len(),
                nb_steps
            )));
        }

        Ok(Self {
            nb_runs,
            nb_steps,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn from_step_counts(runs: &[Vec<usize>]) -> Result<Self> {
        Self::new(
            runs.iter()
                .map(|r| r.iter().map(|&s| s as f64).collect())
                .collect(),
        )
    }

    pub fn nb_runs(&self) -> usize {
        self.nb_runs
    }

    pub fn nb_steps(&self) -> usize {
        self.nb_steps
    }

    pub fn get(&self, run: usize, step: usize) -> Option<f64> {
        if run >= self.nb_runs || step >= self.nb_steps {
            return None;
        }
        Some(self.data[run * self.nb_steps + step])
    }

    pub fn run(&self, run: usize) -> Option<&[f64]> {
        if run >= self.nb_runs {
            return None;
        }
        let start = run * self.nb_steps;
        Some(&self.data[start..start + self.nb_steps])
    }

    /// `[nb_steps][nb_runs]` view
    pub fn transposed(&self) -> Vec<Vec<f64>> {
        (0..self.nb_steps)
            .map(|step| {
                (0..self.nb_runs)
                    .map(|run| self.data[run * self.nb_steps + step])
                    .collect()
            })
            .collect()
    }
}
