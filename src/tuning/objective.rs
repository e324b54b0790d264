use std::fmt;
use std::str::FromStr;

use crate::env::Environment;
use crate::error::{AcError, Result};
use crate::infra::DefaultObserver;
use crate::rl::{ExperimentRunner, HyperParams, PolicyInit, TrainingConfig};
use crate::stats::descriptive;

/// Scalar summary a tuner optimises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    /// Mean L2 norm of the final value table, maximised
    #[default]
    ValueNorm,
    /// Mean step count of the last episode, minimised
    MeanFinalSteps,
}

impl Objective {
    /// Turn a summary into a score where higher is better
    pub fn to_score(self, summary: f64) -> f64 {
        match self {
            Objective::ValueNorm => summary,
            Objective::MeanFinalSteps => -summary,
        }
    }
}

impl FromStr for Objective {
    type Err = AcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "value_norm" | "norm" => Ok(Objective::ValueNorm),
            "mean_final_steps" | "steps" => Ok(Objective::MeanFinalSteps),
            _ => Err(AcError::config(format!("unknown tuning objective '{}'", s))),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::ValueNorm => write!(f, "value_norm"),
            Objective::MeanFinalSteps => write!(f, "mean_final_steps"),
        }
    }
}

/// Trains `nb_repeats` independent runs per evaluation on a fixed environment
pub struct ObjectiveEvaluator<E> {
    env: E,
    objective: Objective,
    epsilon: f64,
    policy_init: PolicyInit,
    base_seed: u64,
    nb_episodes: usize,
    timeout: usize,
    nb_repeats: usize,
}

impl<E> ObjectiveEvaluator<E>
where
    E: Environment + Clone,
{
    /// Episode count, timeout and exploration come from `training`; its rates are ignored.
    pub fn new(
        env: E,
        objective: Objective,
        training: &TrainingConfig,
        nb_repeats: usize,
        base_seed: u64,
    ) -> Self {
        Self {
            env,
            objective,
            epsilon: training.epsilon,
            policy_init: training.policy_init,
            base_seed,
            nb_episodes: training.nb_episodes,
            timeout: training.timeout,
            nb_repeats,
        }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Raw summary (value norm or final step count) averaged over `nb_repeats` runs
    pub fn evaluate(
        &self,
        alpha_critic: f64,
        alpha_actor: f64,
        nb_episodes: usize,
        timeout: usize,
        nb_repeats: usize,
    ) -> Result<f64> {
        let runner = ExperimentRunner::new(TrainingConfig {
            params: HyperParams::new(alpha_critic, alpha_actor),
            epsilon: self.epsilon,
            nb_episodes,
            timeout,
            policy_init: self.policy_init,
        })?;
        let batch = runner.run_batch(&self.env, nb_repeats, self.base_seed, &mut DefaultObserver)?;

        Ok(match self.objective {
            Objective::ValueNorm => descriptive::mean(&batch.value_norms()),
            Objective::MeanFinalSteps => batch.statistics().final_mean_steps(),
        })
    }

    /// Score of `params` with the configured budgets, higher is better
    pub fn score(&self, params: HyperParams) -> Result<f64> {
        let summary = self.evaluate(
            params.alpha_critic,
            params.alpha_actor,
            self.nb_episodes,
            self.timeout,
            self.nb_repeats,
        )?;
        Ok(self.objective.to_score(summary))
    }
}
