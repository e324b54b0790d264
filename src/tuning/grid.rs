use rand::RngCore;

use crate::error::{AcError, Result};
use crate::rl::HyperParams;

use super::{Trial, Tuner};

/// Exhaustive search over the Cartesian product of two value lists
pub struct GridSearch {
    candidates: Vec<HyperParams>,
    next: usize,
    trials: Vec<Trial>,
}

impl GridSearch {
    pub fn new(alpha_critic: Vec<f64>, alpha_actor: Vec<f64>) -> Result<Self> {
        if alpha_critic.is_empty() || alpha_actor.is_empty() {
            return Err(AcError::config("grid search needs at least one value per learning rate"));
        }

        let candidates: Vec<HyperParams> = alpha_critic
            .iter()
            .flat_map(|&critic| {
                alpha_actor
                    .iter()
                    .map(move |&actor| HyperParams::new(critic, actor))
            })
            .collect();
        for params in &candidates {
            params.validate()?;
        }

        Ok(Self {
            candidates,
            next: 0,
            trials: Vec::new(),
        })
    }

    /// `per_axis` log-spaced values between `min` and `max` on both axes
    pub fn log_spaced(min: f64, max: f64, per_axis: usize) -> Result<Self> {
        if !(min > 0.0 && max >= min) {
            return Err(AcError::config(format!(
                "invalid grid bounds [{}, {}]",
                min, max
            )));
        }
        let values = match per_axis {
            0 => Vec::new(),
            1 => vec![min],
            n => {
                let (lo, hi) = (min.log10(), max.log10());
                (0..n)
                    .map(|i| 10f64.powf(lo + (hi - lo) * i as f64 / (n - 1) as f64))
                    .collect()
            }
        };
        Self::new(values.clone(), values)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl Tuner for GridSearch {
    fn propose(&mut self, _rng: &mut dyn RngCore) -> Option<HyperParams> {
        let params = self.candidates.get(self.next).copied();
        self.next += 1;
        params
    }

    fn observe(&mut self, params: HyperParams, score: f64) {
        self.trials.push(Trial { params, score });
    }

    fn trials(&self) -> &[Trial] {
        &self.trials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_proposes_each_point_once() {
        let mut grid = GridSearch::new(vec![0.1, 0.2], vec![0.5, 0.6, 0.7]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut seen = Vec::new();
        while let Some(p) = grid.propose(&mut rng) {
            seen.push((p.alpha_critic, p.alpha_actor));
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], (0.1, 0.5));
        assert_eq!(seen[5], (0.2, 0.7));
        assert!(grid.propose(&mut rng).is_none());
    }

    #[test]
    fn test_log_spaced_bounds() {
        let grid = GridSearch::log_spaced(0.01, 1.0, 3).unwrap();
        assert_eq!(grid.len(), 9);
        let first = grid.candidates[0];
        let last = grid.candidates[8];
        assert!((first.alpha_critic - 0.01).abs() < 1e-12);
        assert!((last.alpha_actor - 1.0).abs() < 1e-12);
        assert!((grid.candidates[4].alpha_critic - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_grids_rejected() {
        assert!(GridSearch::new(vec![], vec![0.1]).is_err());
        assert!(GridSearch::new(vec![0.0], vec![0.1]).is_err());
        assert!(GridSearch::log_spaced(0.0, 1.0, 3).is_err());
        assert!(GridSearch::log_spaced(0.1, 1.0, 0).is_err());
    }
}
