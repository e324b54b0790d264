use maze_ac::env::{Environment, MazeConfig, MazeEnv};
use maze_ac::infra::{CompositeObserver, DefaultObserver, MetricsObserver, TrainingObserver};
use maze_ac::rl::{ExperimentRunner, HyperParams, TrainingConfig};
use maze_ac::stats::{Comparator, ComparatorConfig, ErrorBand, LearningCurveBatch};
use maze_ac::tuning::{GridSearch, Objective, ObjectiveEvaluator, Tuner, tune};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

const CORRIDOR: &str = "
    S.....
    ####..
    G.....
";

fn corridor() -> MazeEnv {
    MazeEnv::from_layout(CORRIDOR, MazeConfig::default()).unwrap()
}

fn training(params: HyperParams, nb_episodes: usize) -> TrainingConfig {
    TrainingConfig {
        params,
        nb_episodes,
        timeout: 200,
        ..TrainingConfig::default()
    }
}

#[test]
fn test_fixed_seed_reproduces_batch() {
    let runner = ExperimentRunner::new(training(HyperParams::new(0.5, 0.5), 40)).unwrap();
    let env = corridor();
    let first = runner.run_batch(&env, 3, 2024, &mut DefaultObserver).unwrap();
    let second = runner.run_batch(&env, 3, 2024, &mut DefaultObserver).unwrap();
    assert_eq!(first.step_counts(), second.step_counts());
    assert_eq!(first.value_norms(), second.value_norms());
}

#[test]
fn test_learning_shortens_episodes() {
    let env = corridor();
    let optimal = env.optimal_steps();
    assert!(optimal.iter().flatten().all(|&d| d <= 11));

    let runner = ExperimentRunner::new(training(HyperParams::new(0.5, 0.5), 300)).unwrap();
    let observers: Vec<Box<dyn TrainingObserver + Send>> = vec![
        Box::new(DefaultObserver),
        Box::new(MetricsObserver::new(50, 100)),
    ];
    let mut observer = CompositeObserver::new(observers);
    let batch = runner.run_batch(&env, 6, 1, &mut observer).unwrap();
    let stats = batch.statistics();

    let early: f64 = stats.mean_steps[..20].iter().sum::<f64>() / 20.0;
    let late: f64 = stats.mean_steps[280..].iter().sum::<f64>() / 20.0;
    assert!(late < early, "late {} should be below early {}", late, early);

    for run in &batch.runs {
        for state in 0..run.policy.nb_states() {
            assert!(run.policy.row(state).iter().all(|&p| p > 0.0));
        }
    }
}

#[test]
fn test_compare_tuned_against_poor_rates() {
    let env = corridor();
    let good = ExperimentRunner::new(training(HyperParams::new(0.5, 0.5), 150))
        .unwrap()
        .run_batch(&env, 8, 10, &mut DefaultObserver)
        .unwrap();
    let poor = ExperimentRunner::new(training(HyperParams::new(1e-4, 1e-4), 150))
        .unwrap()
        .run_batch(&env, 8, 10, &mut DefaultObserver)
        .unwrap();

    let comparator = Comparator::new(ComparatorConfig {
        sample_size: 8,
        downsampling_fact: 10,
        band: ErrorBand::Percentile,
        ..ComparatorConfig::default()
    })
    .unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let result = comparator
        .compare(
            &good.learning_curves().unwrap(),
            &poor.learning_curves().unwrap(),
            &mut rng,
        )
        .unwrap();

    assert_eq!(result.steps.len(), 15);
    for step in &result.steps {
        assert!(step.band1.0 <= step.band1.1);
        assert!(step.band2.0 <= step.band2.1);
        assert!((0.0..=1.0).contains(&step.p_value) || step.p_value.is_nan());
    }
}

#[test]
fn test_identical_batches_report_no_difference() {
    let mut rng = StdRng::seed_from_u64(99);
    let rows: Vec<Vec<f64>> = (0..10)
        .map(|_| {
            (0..30)
                .map(|step| 100.0 / (1.0 + step as f64) + rng.random_range(0.0..5.0))
                .collect()
        })
        .collect();
    let batch = LearningCurveBatch::new(rows).unwrap();
    let comparator = Comparator::new(ComparatorConfig {
        alpha: 0.01,
        ..ComparatorConfig::default()
    })
    .unwrap();
    let result = comparator.compare(&batch, &batch, &mut rng).unwrap();
    assert!(result.nb_significant() <= 6);
}

#[test]
fn test_grid_tuning_on_maze() {
    let env = corridor();
    let evaluator = ObjectiveEvaluator::new(
        env,
        Objective::MeanFinalSteps,
        &training(HyperParams::default(), 60),
        2,
        5,
    );
    let mut grid = GridSearch::new(vec![0.05, 0.5], vec![0.05, 0.5]).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let best = tune(&mut grid, |p| evaluator.score(p), &mut rng).unwrap();

    assert_eq!(grid.trials().len(), 4);
    assert!(best.score <= -1.0);
    assert!(grid.trials().iter().all(|t| t.score <= best.score));
}

#[test]
fn test_random_maze_is_solvable() {
    let config = MazeConfig {
        width: 8,
        height: 6,
        wall_ratio: 0.25,
        ..MazeConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(8);
    let env = MazeEnv::random(config, &mut rng).unwrap();
    assert_eq!(env.nb_actions(), 4);
    assert!(env.optimal_steps().iter().all(Option::is_some));
}
