//! Episode runner: sample, explore, step, update until termination or timeout

use rand::Rng;

use crate::env::Environment;
use crate::error::{AcError, Result};

use super::actor_critic::{self, HyperParams, Transition};
use super::tables::{PolicyTable, ValueTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeStatus {
    Running,
    Terminated,
    Truncated,
}

/// Outcome of one episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeRecord {
    /// Steps taken before termination or timeout
    pub steps: usize,
    pub status: EpisodeStatus,
    /// Undiscounted sum of rewards
    pub total_reward: f64,
}

impl EpisodeRecord {
    pub fn terminated(&self) -> bool {
        self.status == EpisodeStatus::Terminated
    }
}

pub struct EpisodeRunner {
    params: HyperParams,
    /// Probability of replacing the sampled action by a uniformly random one
    epsilon: f64,
}

impl EpisodeRunner {
    pub fn new(params: HyperParams, epsilon: f64) -> Self {
        Self { params, epsilon }
    }

    pub fn params(&self) -> &HyperParams {
        &self.params
    }

    /// Run one episode, updating `values` and `policy` after every step.
    pub fn run<E, R>(
        &self,
        env: &mut E,
        values: &mut ValueTable,
        policy: &mut PolicyTable,
        rng: &mut R,
    ) -> Result<EpisodeRecord>
    where
        E: Environment,
        R: Rng + ?Sized,
    {
        if values.len() != env.nb_states()
            || policy.nb_states() != env.nb_states()
            || policy.nb_actions() != env.nb_actions()
        {
            return Err(AcError::config(format!(
                "tables sized {}x{} do not match environment {}x{}",
                policy.nb_states(),
                policy.nb_actions(),
                env.nb_states(),
                env.nb_actions()
            )));
        }

        let gamma = env.gamma();
        let timeout = env.timeout();
        let nb_states = env.nb_states();
        let nb_actions = env.nb_actions();

        let (mut state, _) = env.reset(rng);
        if state >= nb_states {
            return Err(AcError::environment(format!(
                "reset returned state {} outside 0..{}",
                state, nb_states
            )));
        }
        let mut steps = 0;
        let mut total_reward = 0.0;
        let mut status = EpisodeStatus::Running;

        while status == EpisodeStatus::Running {
            let mut action = policy.sample(state, rng)?;
            if self.epsilon > 0.0 && rng.random::<f64>() < self.epsilon {
                action = rng.random_range(0..nb_actions);
            }

            let result = env.step(action, rng)?;
            if result.next_state >= nb_states {
                return Err(AcError::environment(format!(
                    "step returned state {} outside 0..{}",
                    result.next_state, nb_states
                )));
            }
            let transition = Transition {
                state,
                action,
                reward: result.reward,
                next_state: result.next_state,
                terminated: result.terminated,
            };
            actor_critic::update(values, policy, &transition, gamma, &self.params)?;

            total_reward += result.reward;
            state = result.next_state;
            steps += 1;

            status = if result.terminated {
                EpisodeStatus::Terminated
            } else if result.truncated || steps >= timeout {
                EpisodeStatus::Truncated
            } else {
                EpisodeStatus::Running
            };
        }

        Ok(EpisodeRecord {
            steps,
            status,
            total_reward,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{MazeConfig, MazeEnv, StepInfo, StepResult};
    use crate::rl::PolicyInit;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Two-state environment whose step always lands on `next_state`
    struct FixedJump {
        next_state: usize,
    }

    impl Environment for FixedJump {
        fn nb_states(&self) -> usize {
            2
        }

        fn nb_actions(&self) -> usize {
            2
        }

        fn gamma(&self) -> f64 {
            0.9
        }

        fn timeout(&self) -> usize {
            10
        }

        fn set_timeout(&mut self, _timeout: usize) {}

        fn reset<R: Rng + ?Sized>(&mut self, _rng: &mut R) -> (usize, StepInfo) {
            (0, StepInfo::default())
        }

        fn step<R: Rng + ?Sized>(&mut self, _action: usize, _rng: &mut R) -> Result<StepResult> {
            Ok(StepResult {
                next_state: self.next_state,
                reward: 0.0,
                terminated: false,
                truncated: false,
                info: StepInfo::default(),
            })
        }
    }

    fn corridor(timeout: usize) -> MazeEnv {
        let config = MazeConfig {
            timeout,
            ..MazeConfig::default()
        };
        MazeEnv::from_layout("S...G", config).unwrap()
    }

    #[test]
    fn test_episode_reaches_goal_or_times_out() {
        let mut env = corridor(1000);
        let mut rng = StdRng::seed_from_u64(11);
        let mut values = ValueTable::new(env.nb_states());
        let mut policy =
            PolicyTable::random(env.nb_states(), env.nb_actions(), PolicyInit::Raw, &mut rng)
                .unwrap();
        let runner = EpisodeRunner::new(HyperParams::new(0.5, 0.5), 0.1);

        let record = runner.run(&mut env, &mut values, &mut policy, &mut rng).unwrap();
        assert!(record.steps >= 4);
        assert!(record.steps <= 1000);
        if record.terminated() {
            assert!((record.total_reward - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_timeout_truncates_episode() {
        let mut env = corridor(3);
        let mut rng = StdRng::seed_from_u64(5);
        let mut values = ValueTable::new(env.nb_states());
        // Always walk west, into the wall
        let mut policy = PolicyTable::from_rows(vec![vec![0.0, 0.0, 0.0, 1.0]; 5]).unwrap();
        let runner = EpisodeRunner::new(HyperParams::new(0.1, 1e-9), 0.0);

        let record = runner.run(&mut env, &mut values, &mut policy, &mut rng).unwrap();
        assert_eq!(record.steps, 3);
        assert_eq!(record.status, EpisodeStatus::Truncated);
    }

    #[test]
    fn test_touched_rows_are_distributions() {
        let mut env = corridor(200);
        let mut rng = StdRng::seed_from_u64(9);
        let mut values = ValueTable::new(env.nb_states());
        let mut policy =
            PolicyTable::random(env.nb_states(), env.nb_actions(), PolicyInit::Raw, &mut rng)
                .unwrap();
        let runner = EpisodeRunner::new(HyperParams::new(0.5, 0.5), 0.0);

        runner.run(&mut env, &mut values, &mut policy, &mut rng).unwrap();
        // The start cell is always visited
        let row = policy.row(0);
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(row.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn test_mismatched_tables_are_rejected() {
        let mut env = corridor(10);
        let mut rng = StdRng::seed_from_u64(1);
        let mut values = ValueTable::new(2);
        let mut policy = PolicyTable::from_rows(vec![vec![0.5, 0.5]; 2]).unwrap();
        let runner = EpisodeRunner::new(HyperParams::default(), 0.0);
        assert!(matches!(
            runner.run(&mut env, &mut values, &mut policy, &mut rng),
            Err(AcError::Configuration(_))
        ));
    }

    #[test]
    fn test_out_of_range_next_state_is_environment_error() {
        let mut env = FixedJump { next_state: 5 };
        let mut rng = StdRng::seed_from_u64(2);
        let mut values = ValueTable::new(2);
        let mut policy = PolicyTable::from_rows(vec![vec![0.5, 0.5]; 2]).unwrap();
        let runner = EpisodeRunner::new(HyperParams::default(), 0.0);

        let result = runner.run(&mut env, &mut values, &mut policy, &mut rng);
        assert!(matches!(result, Err(AcError::Environment(_))));
        assert_eq!(values.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_in_range_jumps_run_to_timeout() {
        let mut env = FixedJump { next_state: 1 };
        let mut rng = StdRng::seed_from_u64(2);
        let mut values = ValueTable::new(2);
        let mut policy = PolicyTable::from_rows(vec![vec![0.5, 0.5]; 2]).unwrap();
        let runner = EpisodeRunner::new(HyperParams::default(), 0.0);

        let record = runner.run(&mut env, &mut values, &mut policy, &mut rng).unwrap();
        assert_eq!(record.steps, 10);
        assert_eq!(record.status, EpisodeStatus::Truncated);
    }
}
