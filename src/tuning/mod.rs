//! Hyper-parameter search over the two learning rates.
//!
//! A [`Tuner`] proposes `HyperParams`, the caller scores them and feeds the
//! score back. Scores are maximised.

mod bayes;
mod grid;
mod objective;

pub use bayes::{BayesConfig, BayesianOptimizer};
pub use grid::GridSearch;
pub use objective::{Objective, ObjectiveEvaluator};

use rand::RngCore;
use tracing::{info, warn};

use crate::error::{AcError, Result};
use crate::rl::HyperParams;

/// One evaluated configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    pub params: HyperParams,
    pub score: f64,
}

pub trait Tuner {
    /// Next configuration to evaluate, `None` once the search is exhausted
    fn propose(&mut self, rng: &mut dyn RngCore) -> Option<HyperParams>;

    fn observe(&mut self, params: HyperParams, score: f64);

    /// Every observed trial, in evaluation order
    fn trials(&self) -> &[Trial];

    /// Highest finite score seen so far
    fn best(&self) -> Option<Trial> {
        best_trial(self.trials())
    }
}

pub(crate) fn best_trial(trials: &[Trial]) -> Option<Trial> {
    trials
        .iter()
        .filter(|t| t.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .copied()
}

/// Drive `tuner` until it stops proposing. Objective errors abort the search.
pub fn tune<F>(tuner: &mut dyn Tuner, mut objective: F, rng: &mut dyn RngCore) -> Result<Trial>
where
    F: FnMut(HyperParams) -> Result<f64>,
{
    let mut trial = 0;
    while let Some(params) = tuner.propose(rng) {
        let score = objective(params)?;
        if score.is_finite() {
            info!(
                "Trial {}: alpha_critic={:.4}, alpha_actor={:.4} -> score {:.4}",
                trial, params.alpha_critic, params.alpha_actor, score
            );
        } else {
            warn!(
                "Trial {}: alpha_critic={:.4}, alpha_actor={:.4} -> non-finite score {}",
                trial, params.alpha_critic, params.alpha_actor, score
            );
        }
        tuner.observe(params, score);
        trial += 1;
    }

    let best = tuner
        .best()
        .ok_or_else(|| AcError::config("tuner produced no finite trial"))?;
    info!(
        "Best of {} trials: alpha_critic={:.4}, alpha_actor={:.4} (score {:.4})",
        trial, best.params.alpha_critic, best.params.alpha_actor, best.score
    );
    Ok(best)
}
