//! Experiment runner: episodes within a run share tables, runs are independent

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinSet;
use tracing::info;

use crate::env::Environment;
use crate::error::{AcError, Result};
use crate::infra::TrainingObserver;
use crate::stats::LearningCurveBatch;

use super::actor_critic::HyperParams;
use super::episode::{EpisodeRecord, EpisodeRunner};
use super::metrics::RunStatistics;
use super::tables::{PolicyInit, PolicyTable, ValueTable};

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Learning rates
    pub params: HyperParams,
    /// Exploration rate of the episode runner
    pub epsilon: f64,
    /// Episodes per run
    pub nb_episodes: usize,
    /// Maximum steps per episode
    pub timeout: usize,
    /// Policy table initialisation
    pub policy_init: PolicyInit,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            params: HyperParams::default(),
            epsilon: 0.05,
            nb_episodes: 100,
            timeout: 50,
            policy_init: PolicyInit::Raw,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(AcError::config(format!(
                "epsilon must be in [0, 1], got {}",
                self.epsilon
            )));
        }
        if self.nb_episodes == 0 {
            return Err(AcError::config("nb_episodes must be positive"));
        }
        if self.timeout == 0 {
            return Err(AcError::config("timeout must be positive"));
        }
        Ok(())
    }
}

/// Seed of run `run` in a batch started from `base_seed`
pub fn run_seed(base_seed: u64, run: usize) -> u64 {
    base_seed.wrapping_add(run as u64)
}

/// Outcome of one independent run
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run: usize,
    pub seed: u64,
    pub records: Vec<EpisodeRecord>,
    /// Final snapshot of the tables
    pub values: ValueTable,
    pub policy: PolicyTable,
}

impl RunResult {
    pub fn step_counts(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.steps).collect()
    }
}

/// All runs of a batch, ordered by run index
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub runs: Vec<RunResult>,
}

impl BatchResult {
    pub fn step_counts(&self) -> Vec<Vec<usize>> {
        self.runs.iter().map(RunResult::step_counts).collect()
    }

    pub fn value_norms(&self) -> Vec<f64> {
        self.runs.iter().map(|r| r.values.norm()).collect()
    }

    pub fn statistics(&self) -> RunStatistics {
        RunStatistics::from_runs(&self.step_counts(), &self.value_norms())
    }

    /// Step counts as a `[nb_runs][nb_episodes]` batch for the comparator
    pub fn learning_curves(&self) -> Result<LearningCurveBatch> {
        LearningCurveBatch::from_step_counts(&self.step_counts())
    }
}

#[derive(Debug, Clone)]
pub struct ExperimentRunner {
    config: TrainingConfig,
}

impl ExperimentRunner {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// One run: fresh tables, `nb_episodes` episodes sharing them.
    pub fn train<E, R>(
        &self,
        env: &mut E,
        rng: &mut R,
        run: usize,
        seed: u64,
        observer: &mut dyn TrainingObserver,
    ) -> Result<RunResult>
    where
        E: Environment,
        R: Rng + ?Sized,
    {
        env.set_timeout(self.config.timeout);
        let mut values = ValueTable::new(env.nb_states());
        let mut policy = PolicyTable::random(
            env.nb_states(),
            env.nb_actions(),
            self.config.policy_init,
            rng,
        )?;
        let runner = EpisodeRunner::new(self.config.params, self.config.epsilon);

        observer.on_run_start(run, seed);

        let mut records = Vec::with_capacity(self.config.nb_episodes);
        for episode in 0..self.config.nb_episodes {
            let record = runner.run(env, &mut values, &mut policy, rng)?;
            observer.on_episode_end(run, episode, &record);
            records.push(record);
        }

        let result = RunResult {
            run,
            seed,
            records,
            values,
            policy,
        };
        observer.on_run_finished(&result);
        Ok(result)
    }

    /// Run `run` of a batch on its own copy of the environment and its own seeded stream
    pub fn run_single<E>(
        &self,
        env: &E,
        run: usize,
        base_seed: u64,
        observer: &mut dyn TrainingObserver,
    ) -> Result<RunResult>
    where
        E: Environment + Clone,
    {
        let seed = run_seed(base_seed, run);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut env = env.clone();
        self.train(&mut env, &mut rng, run, seed, observer)
            .map_err(|e| AcError::run_failed(run, e))
    }

    /// Sequential batch of independent runs. The first failure aborts the batch.
    pub fn run_batch<E>(
        &self,
        env: &E,
        nb_runs: usize,
        base_seed: u64,
        observer: &mut dyn TrainingObserver,
    ) -> Result<BatchResult>
    where
        E: Environment + Clone,
    {
        if nb_runs == 0 {
            return Err(AcError::config("nb_runs must be positive"));
        }

        let runs = (0..nb_runs)
            .map(|run| self.run_single(env, run, base_seed, &mut *observer))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Batch of {} runs finished (alpha_critic={}, alpha_actor={})",
            nb_runs, self.config.params.alpha_critic, self.config.params.alpha_actor
        );
        Ok(BatchResult { runs })
    }

    /// Same as `run_batch` with every run on Tokio's blocking pool, each observed by
    /// its own observer from `make_observer`.
    /// Results are joined and re-ordered by run index before returning.
    pub async fn run_batch_concurrent<E, F, O>(
        &self,
        env: &E,
        nb_runs: usize,
        base_seed: u64,
        make_observer: F,
    ) -> Result<BatchResult>
    where
        E: Environment + Clone + Send + 'static,
        F: Fn() -> O,
        O: TrainingObserver + Send + 'static,
    {
        if nb_runs == 0 {
            return Err(AcError::config("nb_runs must be positive"));
        }

        let mut tasks = JoinSet::new();
        for run in 0..nb_runs {
            let runner = self.clone();
            let env = env.clone();
            let mut observer = make_observer();
            tasks.spawn_blocking(move || runner.run_single(&env, run, base_seed, &mut observer));
        }

        let mut runs = Vec::with_capacity(nb_runs);
        while let Some(joined) = tasks.join_next().await {
            match joined? {
                Ok(result) => runs.push(result),
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }
        runs.sort_by_key(|r| r.run);

        info!(
            "Concurrent batch of {} runs finished (alpha_critic={}, alpha_actor={})",
            nb_runs, self.config.params.alpha_critic, self.config.params.alpha_actor
        );
        Ok(BatchResult { runs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{MazeConfig, MazeEnv, StepInfo, StepResult};
    use crate::infra::DefaultObserver;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts episodes across every observer built from the same counter
    struct EpisodeCounter(Arc<AtomicUsize>);

    impl TrainingObserver for EpisodeCounter {
        fn on_run_start(&mut self, _run: usize, _seed: u64) {}

        fn on_episode_end(&mut self, _run: usize, _episode: usize, _record: &EpisodeRecord) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Single-state environment whose every step fails
    #[derive(Clone)]
    struct BrokenEnv;

    impl Environment for BrokenEnv {
        fn nb_states(&self) -> usize {
            1
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
            Err(AcError::environment("actuator offline"))
        }
    }

    const MAZE: &str = "
        S..#
        .#..
        ...G
    ";

    fn maze() -> MazeEnv {
        MazeEnv::from_layout(MAZE, MazeConfig::default()).unwrap()
    }

    fn config(nb_episodes: usize) -> TrainingConfig {
        TrainingConfig {
            params: HyperParams::new(0.5, 0.5),
            nb_episodes,
            timeout: 100,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_training_config_validation() {
        assert!(TrainingConfig::default().validate().is_ok());
        let bad_timeout = TrainingConfig {
            timeout: 0,
            ..TrainingConfig::default()
        };
        assert!(matches!(bad_timeout.validate(), Err(AcError::Configuration(_))));
        let bad_rate = TrainingConfig {
            params: HyperParams::new(-0.1, 0.5),
            ..TrainingConfig::default()
        };
        assert!(ExperimentRunner::new(bad_rate).is_err());
    }

    #[test]
    fn test_same_seed_same_step_counts() {
        let runner = ExperimentRunner::new(config(30)).unwrap();
        let env = maze();
        let first = runner.run_single(&env, 0, 1234, &mut DefaultObserver).unwrap();
        let second = runner.run_single(&env, 0, 1234, &mut DefaultObserver).unwrap();
        assert_eq!(first.step_counts(), second.step_counts());
        assert_eq!(first.values, second.values);
    }

    #[test]
    fn test_train_sets_timeout_and_records_every_episode() {
        let runner = ExperimentRunner::new(config(12)).unwrap();
        let mut env = maze();
        let mut rng = StdRng::seed_from_u64(3);
        let result = runner.train(&mut env, &mut rng, 0, 3, &mut DefaultObserver).unwrap();
        assert_eq!(env.timeout(), 100);
        assert_eq!(result.records.len(), 12);
        assert!(result.step_counts().iter().all(|&s| s >= 1 && s <= 100));
    }

    #[test]
    fn test_batch_statistics_shape() {
        let runner = ExperimentRunner::new(config(10)).unwrap();
        let batch = runner.run_batch(&maze(), 4, 99, &mut DefaultObserver).unwrap();
        assert_eq!(batch.runs.len(), 4);
        let seeds: Vec<u64> = batch.runs.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![99, 100, 101, 102]);

        let stats = batch.statistics();
        assert_eq!(stats.nb_runs, 4);
        assert_eq!(stats.mean_steps.len(), 10);
        assert_eq!(stats.std_steps.len(), 10);

        let curves = batch.learning_curves().unwrap();
        assert_eq!(curves.nb_runs(), 4);
        assert_eq!(curves.nb_steps(), 10);
    }

    #[test]
    fn test_zero_runs_rejected() {
        let runner = ExperimentRunner::new(config(1)).unwrap();
        assert!(runner.run_batch(&maze(), 0, 0, &mut DefaultObserver).is_err());
    }

    #[tokio::test]
    async fn test_concurrent_batch_matches_sequential() {
        let runner = ExperimentRunner::new(config(15)).unwrap();
        let env = maze();
        let sequential = runner.run_batch(&env, 3, 7, &mut DefaultObserver).unwrap();
        let concurrent = runner
            .run_batch_concurrent(&env, 3, 7, || DefaultObserver)
            .await
            .unwrap();
        assert_eq!(sequential.step_counts(), concurrent.step_counts());
        assert_eq!(sequential.value_norms(), concurrent.value_norms());
    }

    #[test]
    fn test_failed_run_aborts_sequential_batch() {
        let runner = ExperimentRunner::new(config(5)).unwrap();
        let result = runner.run_batch(&BrokenEnv, 3, 0, &mut DefaultObserver);
        match result {
            Err(AcError::RunFailed { run, source }) => {
                assert_eq!(run, 0);
                assert!(matches!(*source, AcError::Environment(_)));
            }
            other => panic!("expected a failed run, got {:?}", other.map(|b| b.runs.len())),
        }
    }

    #[tokio::test]
    async fn test_failed_run_aborts_concurrent_batch() {
        let runner = ExperimentRunner::new(config(5)).unwrap();
        let result = runner
            .run_batch_concurrent(&BrokenEnv, 1, 0, || DefaultObserver)
            .await;
        assert!(matches!(result, Err(AcError::RunFailed { run: 0, .. })));

        let result = runner
            .run_batch_concurrent(&BrokenEnv, 4, 0, || DefaultObserver)
            .await;
        assert!(matches!(result, Err(AcError::RunFailed { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_batch_observes_every_episode() {
        let runner = ExperimentRunner::new(config(6)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let batch = runner
            .run_batch_concurrent(&maze(), 3, 5, || EpisodeCounter(counter.clone()))
            .await
            .unwrap();
        assert_eq!(batch.runs.len(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 18);
    }
}
