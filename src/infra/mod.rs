mod pathfinding;
mod training_observer;
mod types;

pub use pathfinding::Bfs;
pub use training_observer::{CompositeObserver, DefaultObserver, MetricsObserver, TrainingObserver};
pub use types::{Direction, Position};
