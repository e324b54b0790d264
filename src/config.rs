//! Experiment configuration, read from `MAZE_AC_*` environment variables
//! (a `.env` file is honoured by the binary through `dotenv`).

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::env::MazeConfig;
use crate::error::{AcError, Result};
use crate::rl::{HyperParams, TrainingConfig};
use crate::stats::ComparatorConfig;
use crate::tuning::{BayesConfig, Objective};

/// Which search drives the learning-rate tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TunerKind {
    /// Use the baseline rates without searching
    Off,
    Grid,
    #[default]
    Bayesian,
}

impl FromStr for TunerKind {
    type Err = AcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(TunerKind::Off),
            "grid" => Ok(TunerKind::Grid),
            "bayes" | "bayesian" => Ok(TunerKind::Bayesian),
            _ => Err(AcError::config(format!("unknown tuner '{}'", s))),
        }
    }
}

impl fmt::Display for TunerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunerKind::Off => write!(f, "off"),
            TunerKind::Grid => write!(f, "grid"),
            TunerKind::Bayesian => write!(f, "bayesian"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TuningConfig {
    pub kind: TunerKind,
    pub objective: Objective,
    /// Runs averaged per objective evaluation
    pub nb_repeats: usize,
    /// Values per axis of the grid search
    pub grid_per_axis: usize,
    pub bayes: BayesConfig,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            kind: TunerKind::default(),
            objective: Objective::default(),
            nb_repeats: 3,
            grid_per_axis: 4,
            bayes: BayesConfig::default(),
        }
    }
}

impl TuningConfig {
    pub fn validate(&self) -> Result<()> {
        if self.nb_repeats == 0 {
            return Err(AcError::config("tuning nb_repeats must be positive"));
        }
        match self.kind {
            TunerKind::Off => Ok(()),
            TunerKind::Grid if self.grid_per_axis == 0 => {
                Err(AcError::config("grid_per_axis must be positive"))
            }
            TunerKind::Grid => Ok(()),
            TunerKind::Bayesian => self.bayes.validate(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub training: TrainingConfig,
    /// Rates the tuned pair is compared against
    pub baseline: HyperParams,
    /// Independent runs per batch
    pub nb_runs: usize,
    pub seed: u64,
    pub maze: MazeConfig,
    /// ASCII layout file; a random maze is generated when absent
    pub maze_file: Option<String>,
    pub comparator: ComparatorConfig,
    pub tuning: TuningConfig,
    /// Folder for CSV reports; nothing is written when absent
    pub output_folder: Option<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            baseline: HyperParams::new(0.1, 0.1),
            nb_runs: 20,
            seed: 42,
            maze: MazeConfig::default(),
            maze_file: None,
            comparator: ComparatorConfig::default(),
            tuning: TuningConfig::default(),
            output_folder: None,
        }
    }
}

impl ExperimentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `MAZE_AC_*` key
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvVars { lookup };
        let mut config = Self::default();

        vars.set("MAZE_AC_ALPHA_CRITIC", &mut config.training.params.alpha_critic)?;
        vars.set("MAZE_AC_ALPHA_ACTOR", &mut config.training.params.alpha_actor)?;
        vars.set("MAZE_AC_EPSILON", &mut config.training.epsilon)?;
        vars.set("MAZE_AC_EPISODES", &mut config.training.nb_episodes)?;
        vars.set("MAZE_AC_TIMEOUT", &mut config.training.timeout)?;
        vars.set("MAZE_AC_POLICY_INIT", &mut config.training.policy_init)?;
        vars.set("MAZE_AC_BASELINE_ALPHA_CRITIC", &mut config.baseline.alpha_critic)?;
        vars.set("MAZE_AC_BASELINE_ALPHA_ACTOR", &mut config.baseline.alpha_actor)?;
        vars.set("MAZE_AC_RUNS", &mut config.nb_runs)?;
        vars.set("MAZE_AC_SEED", &mut config.seed)?;

        vars.set("MAZE_AC_MAZE_WIDTH", &mut config.maze.width)?;
        vars.set("MAZE_AC_MAZE_HEIGHT", &mut config.maze.height)?;
        vars.set("MAZE_AC_WALL_RATIO", &mut config.maze.wall_ratio)?;
        vars.set("MAZE_AC_SLIP_PROBABILITY", &mut config.maze.slip_probability)?;
        vars.set("MAZE_AC_GAMMA", &mut config.maze.gamma)?;
        vars.set("MAZE_AC_GOAL_REWARD", &mut config.maze.goal_reward)?;
        vars.set("MAZE_AC_STEP_REWARD", &mut config.maze.step_reward)?;
        config.maze_file = vars.string("MAZE_AC_MAZE_FILE");

        vars.set("MAZE_AC_SAMPLE_SIZE", &mut config.comparator.sample_size)?;
        vars.set("MAZE_AC_DOWNSAMPLING", &mut config.comparator.downsampling_fact)?;
        vars.set("MAZE_AC_ALPHA", &mut config.comparator.alpha)?;
        vars.set("MAZE_AC_CENTRAL", &mut config.comparator.central)?;
        vars.set("MAZE_AC_ERROR_BAND", &mut config.comparator.band)?;
        vars.set("MAZE_AC_BAND_PERCENTILE", &mut config.comparator.band_percentile)?;

        vars.set("MAZE_AC_TUNER", &mut config.tuning.kind)?;
        vars.set("MAZE_AC_OBJECTIVE", &mut config.tuning.objective)?;
        vars.set("MAZE_AC_TUNING_REPEATS", &mut config.tuning.nb_repeats)?;
        vars.set("MAZE_AC_GRID_PER_AXIS", &mut config.tuning.grid_per_axis)?;
        vars.set("MAZE_AC_TUNING_BUDGET", &mut config.tuning.bayes.budget)?;
        vars.set("MAZE_AC_TUNING_INITIAL", &mut config.tuning.bayes.n_initial)?;
        vars.set("MAZE_AC_MIN_RATE", &mut config.tuning.bayes.min_rate)?;
        vars.set("MAZE_AC_MAX_RATE", &mut config.tuning.bayes.max_rate)?;

        config.output_folder = vars.string("MAZE_AC_OUTPUT_FOLDER");

        config.validate()?;
        Ok(config)
    }

    /// Every section checked before any run starts
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.baseline.validate()?;
        if self.nb_runs == 0 {
            return Err(AcError::config("nb_runs must be positive"));
        }
        if self.maze_file.is_none() {
            self.maze.validate()?;
        }
        self.comparator.validate()?;
        self.tuning.validate()?;
        Ok(())
    }

    /// Training settings with the learning rates replaced by `params`
    pub fn training_with(&self, params: HyperParams) -> TrainingConfig {
        TrainingConfig {
            params,
            ..self.training.clone()
        }
    }
}

struct EnvVars<F> {
    lookup: F,
}

impl<F> EnvVars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    /// Overwrite `target` when `key` is set; a value that does not parse is an error naming the key
    fn set<T>(&self, key: &str, target: &mut T) -> Result<()>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if let Some(raw) = self.string(key) {
            *target = raw
                .trim()
                .parse()
                .map_err(|e| AcError::config(format!("{}='{}': {}", key, raw, e)))?;
        }
        Ok(())
    }
}
