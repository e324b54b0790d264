use tracing::{debug, info};

use crate::rl::{EpisodeRecord, RunResult, TrainingMetrics};

/// Trait for observing training events during a run
pub trait TrainingObserver {
    /// Called before the first episode of a run
    fn on_run_start(&mut self, run: usize, seed: u64);

    /// Called after every episode
    fn on_episode_end(&mut self, run: usize, episode: usize, record: &EpisodeRecord);

    /// Called once the run has finished all its episodes
    fn on_run_finished(&mut self, _result: &RunResult) {
        // Default implementation does nothing
    }
}

/// Logs run boundaries at info level and episodes at debug level
pub struct DefaultObserver;

impl TrainingObserver for DefaultObserver {
    fn on_run_start(&mut self, run: usize, seed: u64) {
        debug!("Run {} started (seed {})", run, seed);
    }

    fn on_episode_end(&mut self, run: usize, episode: usize, record: &EpisodeRecord) {
        debug!(
            "run {} episode {}: {} steps, {:?}",
            run, episode, record.steps, record.status
        );
    }

    fn on_run_finished(&mut self, result: &RunResult) {
        info!(
            "Run {} finished: last episode {} steps, value norm {:.4}",
            result.run,
            result.step_counts().last().copied().unwrap_or(0),
            result.values.norm()
        );
    }
}

/// Keeps moving averages and logs them every `log_every` episodes
pub struct MetricsObserver {
    metrics: TrainingMetrics,
    window_size: usize,
    log_every: usize,
}

impl MetricsObserver {
    pub fn new(window_size: usize, log_every: usize) -> Self {
        Self {
            metrics: TrainingMetrics::new(window_size),
            window_size,
            log_every,
        }
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }
}

impl TrainingObserver for MetricsObserver {
    fn on_run_start(&mut self, _run: usize, _seed: u64) {
        self.metrics = TrainingMetrics::new(self.window_size);
    }

    fn on_episode_end(&mut self, run: usize, episode: usize, record: &EpisodeRecord) {
        self.metrics.record_episode(record);
        if self.log_every > 0 && (episode + 1) % self.log_every == 0 {
            self.metrics.log_to_console(run);
        }
    }
}

pub struct CompositeObserver {
    observers: Vec<Box<dyn TrainingObserver + Send>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Box<dyn TrainingObserver + Send>>) -> Self {
        Self { observers }
    }
}

impl TrainingObserver for CompositeObserver {
    fn on_run_start(&mut self, run: usize, seed: u64) {
        for observer in &mut self.observers {
            observer.on_run_start(run, seed);
        }
    }

    fn on_episode_end(&mut self, run: usize, episode: usize, record: &EpisodeRecord) {
        for observer in &mut self.observers {
            observer.on_episode_end(run, episode, record);
        }
    }

    fn on_run_finished(&mut self, result: &RunResult) {
        for observer in &mut self.observers {
            observer.on_run_finished(result);
        }
    }
}
