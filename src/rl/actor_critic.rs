//! Tabular actor-critic update: TD(0) critic and a clamped, renormalised actor

use crate::error::{AcError, Result};

use super::tables::{MIN_PROBABILITY, PolicyTable, ValueTable};

/// Learning rates of one actor-critic configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HyperParams {
    pub alpha_critic: f64,
    pub alpha_actor: f64,
}

impl HyperParams {
    pub fn new(alpha_critic: f64, alpha_actor: f64) -> Self {
        Self {
            alpha_critic,
            alpha_actor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("alpha_critic", self.alpha_critic),
            ("alpha_actor", self.alpha_actor),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(AcError::config(format!(
                    "{} must be a positive learning rate, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for HyperParams {
    fn default() -> Self {
        Self::new(0.5, 0.5)
    }
}

/// One environment step, consumed immediately by `update`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: usize,
    pub action: usize,
    pub reward: f64,
    pub next_state: usize,
    pub terminated: bool,
}

/// Apply one actor-critic step and return the TD error.
///
/// Only `values[state]` and row `policy[state]` change. Within that row only the
/// taken action is perturbed (floored at `MIN_PROBABILITY`) before the whole row
/// is divided by its new sum.
pub fn update(
    values: &mut ValueTable,
    policy: &mut PolicyTable,
    transition: &Transition,
    gamma: f64,
    params: &HyperParams,
) -> Result<f64> {
    let Transition {
        state,
        action,
        reward,
        next_state,
        terminated,
    } = *transition;

    let nb_states = values.len();
    if policy.nb_states() != nb_states {
        return Err(AcError::config(format!(
            "value table has {} states, policy table {}",
            nb_states,
            policy.nb_states()
        )));
    }
    if state >= nb_states || next_state >= nb_states {
        return Err(AcError::environment(format!(
            "transition {} -> {} outside 0..{}",
            state, next_state, nb_states
        )));
    }
    if action >= policy.nb_actions() {
        return Err(AcError::environment(format!(
            "action {} outside 0..{}",
            action,
            policy.nb_actions()
        )));
    }

    let bootstrap = if terminated {
        0.0
    } else {
        gamma * values.get(next_state)
    };
    let delta = reward + bootstrap - values.get(state);
    if !delta.is_finite() {
        return Err(AcError::NumericDegeneracy {
            state,
            value: delta,
        });
    }

    values.add(state, params.alpha_critic * delta);

    let row = policy.row_mut(state);
    let candidate = row[action] + params.alpha_actor * delta;
    row[action] = if candidate > MIN_PROBABILITY {
        candidate
    } else {
        MIN_PROBABILITY
    };
    policy.normalize_row(state)?;

    Ok(delta)
}
