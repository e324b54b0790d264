use dotenv::dotenv;
use maze_ac::config::{ExperimentConfig, TunerKind};
use maze_ac::env::{Environment, MazeEnv};
use maze_ac::infra::{CompositeObserver, DefaultObserver, MetricsObserver, TrainingObserver};
use maze_ac::report::CsvReport;
use maze_ac::rl::{ExperimentRunner, HyperParams};
use maze_ac::stats::Comparator;
use maze_ac::tuning::{BayesianOptimizer, GridSearch, ObjectiveEvaluator, Trial, Tuner, tune};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maze_ac=info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn build_maze(config: &ExperimentConfig, rng: &mut StdRng) -> maze_ac::Result<MazeEnv> {
    match &config.maze_file {
        Some(path) => {
            let layout = std::fs::read_to_string(path)?;
            MazeEnv::from_layout(&layout, config.maze.clone())
        }
        None => MazeEnv::random(config.maze.clone(), rng),
    }
}

/// Per-run logging plus moving averages reported four times per run
fn run_observer(nb_episodes: usize) -> CompositeObserver {
    let observers: Vec<Box<dyn TrainingObserver + Send>> = vec![
        Box::new(DefaultObserver),
        Box::new(MetricsObserver::new(50, (nb_episodes / 4).max(1))),
    ];
    CompositeObserver::new(observers)
}

/// Search the learning rates on the blocking pool; returns the best pair and every trial
async fn tune_rates(
    config: &ExperimentConfig,
    env: &MazeEnv,
) -> maze_ac::Result<(HyperParams, Vec<Trial>)> {
    let mut tuner: Box<dyn Tuner + Send> = match config.tuning.kind {
        TunerKind::Off => {
            info!("Tuning disabled, using configured rates");
            return Ok((config.training.params, Vec::new()));
        }
        TunerKind::Grid => Box::new(GridSearch::log_spaced(
            config.tuning.bayes.min_rate,
            config.tuning.bayes.max_rate,
            config.tuning.grid_per_axis,
        )?),
        TunerKind::Bayesian => Box::new(BayesianOptimizer::new(config.tuning.bayes.clone())?),
    };

    info!(
        "Tuning with {} search on objective {}",
        config.tuning.kind, config.tuning.objective
    );
    let evaluator = ObjectiveEvaluator::new(
        env.clone(),
        config.tuning.objective,
        &config.training,
        config.tuning.nb_repeats,
        config.seed,
    );
    let seed = config.seed;

    tokio::task::spawn_blocking(move || {
        let mut rng = StdRng::seed_from_u64(seed);
        let best = tune(tuner.as_mut(), |params| evaluator.score(params), &mut rng)?;
        Ok((best.params, tuner.trials().to_vec()))
    })
    .await?
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = ExperimentConfig::from_env()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let env = build_maze(&config, &mut rng)?;
    info!(
        "Maze with {} states, mean shortest path {:.2}\n{}",
        env.nb_states(),
        env.mean_optimal_steps(),
        env.draw_ascii(None)
    );

    let (tuned, trials) = tune_rates(&config, &env).await?;

    let tuned_runner = ExperimentRunner::new(config.training_with(tuned))?;
    let baseline_runner = ExperimentRunner::new(config.training_with(config.baseline))?;
    let nb_episodes = config.training.nb_episodes;
    let tuned_batch = tuned_runner
        .run_batch_concurrent(&env, config.nb_runs, config.seed, || run_observer(nb_episodes))
        .await?;
    let baseline_batch = baseline_runner
        .run_batch_concurrent(&env, config.nb_runs, config.seed, || run_observer(nb_episodes))
        .await?;

    let tuned_stats = tuned_batch.statistics();
    let baseline_stats = baseline_batch.statistics();
    tuned_stats.log_summary("Tuned");
    baseline_stats.log_summary("Baseline");

    let comparator = Comparator::new(config.comparator.clone())?;
    let comparison = comparator.compare(
        &tuned_batch.learning_curves()?,
        &baseline_batch.learning_curves()?,
        &mut rng,
    )?;
    comparison.log_summary("tuned", "baseline");

    if let Some(run) = tuned_batch.runs.first() {
        info!("Greedy policy of tuned run 0:\n{}", env.draw_ascii(Some(&run.policy)));
    }

    if let Some(folder) = &config.output_folder {
        let report = CsvReport::new(folder)?;
        report.write_learning_curve("tuned", &tuned_stats)?;
        report.write_learning_curve("baseline", &baseline_stats)?;
        report.write_comparison("tuned_vs_baseline", &comparison)?;
        if !trials.is_empty() {
            report.write_trials("trials", &trials)?;
        }
    }

    Ok(())
}
