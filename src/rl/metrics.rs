//! Training metrics: moving averages over recent episodes and batch statistics across runs

use std::collections::VecDeque;
use std::time::Instant;

use crate::stats::descriptive;

use super::episode::EpisodeRecord;

/// Moving average calculator
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: VecDeque<f64>,
    window_size: usize,
    sum: f64,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size,
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.window_size {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Training metrics tracker for one run
#[derive(Debug)]
pub struct TrainingMetrics {
    /// Episode lengths
    pub episode_lengths: MovingAverage,
    /// Episode returns
    pub episode_rewards: MovingAverage,
    /// Fraction of episodes reaching a goal
    pub success_rate: MovingAverage,
    pub episodes: usize,
    pub total_steps: usize,
    start_time: Instant,
}

impl TrainingMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            episode_lengths: MovingAverage::new(window_size),
            episode_rewards: MovingAverage::new(window_size),
            success_rate: MovingAverage::new(window_size),
            episodes: 0,
            total_steps: 0,
            start_time: Instant::now(),
        }
    }

    pub fn record_episode(&mut self, record: &EpisodeRecord) {
        self.episode_lengths.push(record.steps as f64);
        self.episode_rewards.push(record.total_reward);
        self.success_rate
            .push(if record.terminated() { 1.0 } else { 0.0 });
        self.episodes += 1;
        self.total_steps += record.steps;
    }

    /// Environment steps per second since creation
    pub fn steps_per_second(&self) -> f64 {
        let duration = self.start_time.elapsed().as_secs_f64();
        if duration > 0.0 {
            self.total_steps as f64 / duration
        } else {
            0.0
        }
    }

    pub fn log_to_console(&self, run: usize) {
        tracing::info!(
            "Run {} | Episode {} | Steps {} | SPS {:.0}",
            run,
            self.episodes,
            self.total_steps,
            self.steps_per_second()
        );
        tracing::info!(
            "  Episode: length={:.1}, reward={:.3}, success={:.1}%",
            self.episode_lengths.average(),
            self.episode_rewards.average(),
            self.success_rate.average() * 100.0
        );
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Mean and standard deviation across runs at each episode index,
/// plus the spread of the final value-table norm.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    pub nb_runs: usize,
    pub mean_steps: Vec<f64>,
    pub std_steps: Vec<f64>,
    pub value_norm_mean: f64,
    pub value_norm_std: f64,
}

impl RunStatistics {
    /// `step_counts[run][episode]`; runs shorter than the longest contribute only
    /// where they have data
    pub fn from_runs(step_counts: &[Vec<usize>], value_norms: &[f64]) -> Self {
        let nb_episodes = step_counts.iter().map(Vec::len).max().unwrap_or(0);
        let mut mean_steps = Vec::with_capacity(nb_episodes);
        let mut std_steps = Vec::with_capacity(nb_episodes);

        for episode in 0..nb_episodes {
            let column: Vec<f64> = step_counts
                .iter()
                .filter_map(|run| run.get(episode))
                .map(|&steps| steps as f64)
                .collect();
            mean_steps.push(descriptive::mean(&column));
            std_steps.push(descriptive::std_dev(&column));
        }

        Self {
            nb_runs: step_counts.len(),
            mean_steps,
            std_steps,
            value_norm_mean: descriptive::mean(value_norms),
            value_norm_std: descriptive::std_dev(value_norms),
        }
    }

    /// Mean step count of the last episode
    pub fn final_mean_steps(&self) -> f64 {
        self.mean_steps.last().copied().unwrap_or(0.0)
    }

    pub fn log_summary(&self, label: &str) {
        tracing::info!("=== {} ===", label);
        tracing::info!("Runs: {}", self.nb_runs);
        tracing::info!(
            "Steps: first={:.1}, last={:.1} (std {:.1})",
            self.mean_steps.first().copied().unwrap_or(0.0),
            self.final_mean_steps(),
            self.std_steps.last().copied().unwrap_or(0.0)
        );
        tracing::info!(
            "Value norm: {:.4} (std {:.4})",
            self.value_norm_mean,
            self.value_norm_std
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::EpisodeStatus;

    #[test]
    fn test_moving_average() {
        let mut avg = MovingAverage::new(3);

        avg.push(1.0);
        assert!((avg.average() - 1.0).abs() < 1e-12);

        avg.push(2.0);
        assert!((avg.average() - 1.5).abs() < 1e-12);

        avg.push(3.0);
        assert!((avg.average() - 2.0).abs() < 1e-12);

        avg.push(4.0); // Pushes out 1.0
        assert!((avg.average() - 3.0).abs() < 1e-12);
        assert_eq!(avg.len(), 3);
    }

    #[test]
    fn test_training_metrics_records() {
        let mut metrics = TrainingMetrics::new(10);
        metrics.record_episode(&EpisodeRecord {
            steps: 10,
            status: EpisodeStatus::Terminated,
            total_reward: 1.0,
        });
        metrics.record_episode(&EpisodeRecord {
            steps: 30,
            status: EpisodeStatus::Truncated,
            total_reward: 0.0,
        });
        assert_eq!(metrics.episodes, 2);
        assert_eq!(metrics.total_steps, 40);
        assert!((metrics.episode_lengths.average() - 20.0).abs() < 1e-12);
        assert!((metrics.success_rate.average() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_run_statistics_across_runs() {
        let stats = RunStatistics::from_runs(&[vec![10, 4], vec![20, 6]], &[1.0, 3.0]);
        assert_eq!(stats.nb_runs, 2);
        assert_eq!(stats.mean_steps, vec![15.0, 5.0]);
        assert_eq!(stats.std_steps, vec![5.0, 1.0]);
        assert!((stats.value_norm_mean - 2.0).abs() < 1e-12);
        assert!((stats.value_norm_std - 1.0).abs() < 1e-12);
        assert_eq!(stats.final_mean_steps(), 5.0);
    }
}
