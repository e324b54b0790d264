//! Environment interface - gym-like reset/step contract consumed by the episode runner

mod maze;

pub use maze::{MAX_MAZE_SIDE, MazeConfig, MazeEnv};

use rand::Rng;

use crate::error::Result;

/// Additional information from a reset or a step
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Steps taken this episode
    pub steps: usize,
    /// Action actually applied after any slip
    pub applied_action: Option<usize>,
}

/// Step result from the environment
#[derive(Debug, Clone)]
pub struct StepResult {
    /// State reached
    pub next_state: usize,
    pub reward: f64,
    /// Reached an absorbing state
    pub terminated: bool,
    /// Hit the environment timeout
    pub truncated: bool,
    pub info: StepInfo,
}

/// Discrete MDP driven by the episode runner.
///
/// Randomness is drawn from the caller's generator so every run owns its own stream.
pub trait Environment {
    fn nb_states(&self) -> usize;

    fn nb_actions(&self) -> usize;

    /// Discount factor in (0, 1]
    fn gamma(&self) -> f64;

    /// Maximum steps per episode before truncation
    fn timeout(&self) -> usize;

    fn set_timeout(&mut self, timeout: usize);

    /// Start a new episode and return the initial state
    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> (usize, StepInfo);

    /// Apply `action` from the current state
    fn step<R: Rng + ?Sized>(&mut self, action: usize, rng: &mut R) -> Result<StepResult>;
}
