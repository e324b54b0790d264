//! Grid maze MDP: free cells are states, the four moves are actions, goal cells are absorbing

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::error::{AcError, Result};
use crate::infra::{Bfs, Direction, Position};
use crate::rl::PolicyTable;
use crate::state::{Map, Tile};

use super::{Environment, StepInfo, StepResult};

/// Largest width or height accepted for a generated maze
pub const MAX_MAZE_SIDE: i32 = 1024;

/// Maze configuration
#[derive(Debug, Clone)]
pub struct MazeConfig {
    /// Discount factor
    pub gamma: f64,
    /// Maximum steps per episode
    pub timeout: usize,
    /// Reward for entering a goal cell
    pub goal_reward: f64,
    /// Reward for every other transition
    pub step_reward: f64,
    /// Probability that a move is replaced by a uniformly random one
    pub slip_probability: f64,
    /// Random maze width
    pub width: i32,
    /// Random maze height
    pub height: i32,
    /// Fraction of cells turned into walls by the random generator
    pub wall_ratio: f64,
    /// Layouts tried before the random generator gives up
    pub max_attempts: usize,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            gamma: 0.95,
            timeout: 50,
            goal_reward: 1.0,
            step_reward: 0.0,
            slip_probability: 0.0,
            width: 10,
            height: 10,
            wall_ratio: 0.2,
            max_attempts: 100,
        }
    }
}

impl MazeConfig {
    pub fn validate(&self) -> Result<()> {
        self.validate_dynamics()?;
        if !(0.0..1.0).contains(&self.wall_ratio) {
            return Err(AcError::config(format!(
                "wall_ratio must be in [0, 1), got {}",
                self.wall_ratio
            )));
        }
        if self.width < 2 || self.height < 2 {
            return Err(AcError::config(format!(
                "maze must be at least 2x2, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_MAZE_SIDE || self.height > MAX_MAZE_SIDE {
            return Err(AcError::config(format!(
                "maze sides are limited to {}, got {}x{}",
                MAX_MAZE_SIDE, self.width, self.height
            )));
        }
        Ok(())
    }

    /// Checks the settings that matter once a layout exists
    fn validate_dynamics(&self) -> Result<()> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(AcError::config(format!(
                "gamma must be in (0, 1], got {}",
                self.gamma
            )));
        }
        if self.timeout == 0 {
            return Err(AcError::config("timeout must be positive"));
        }
        if !(0.0..=1.0).contains(&self.slip_probability) {
            return Err(AcError::config(format!(
                "slip_probability must be in [0, 1], got {}",
                self.slip_probability
            )));
        }
        Ok(())
    }
}

/// Maze environment
#[derive(Debug, Clone)]
pub struct MazeEnv {
    map: Map,
    config: MazeConfig,
    /// State index -> cell
    cells: Vec<Position>,
    /// Cell -> state index
    states: HashMap<Position, usize>,
    terminal: Vec<bool>,
    starts: Vec<usize>,
    current: Option<usize>,
    steps: usize,
}

impl MazeEnv {
    pub fn new(map: Map, config: MazeConfig) -> Result<Self> {
        config.validate_dynamics()?;

        let mut cells = Vec::new();
        let mut states = HashMap::new();
        let mut terminal = Vec::new();
        let mut marked_starts = Vec::new();

        for (pos, tile) in map.iter() {
            if !tile.is_walkable() {
                continue;
            }
            let state = cells.len();
            cells.push(pos);
            states.insert(pos, state);
            terminal.push(tile == Tile::Goal);
            if tile == Tile::Start {
                marked_starts.push(state);
            }
        }

        if !terminal.iter().any(|&t| t) {
            return Err(AcError::config("maze has no goal cell"));
        }

        let starts = if marked_starts.is_empty() {
            (0..cells.len()).filter(|&s| !terminal[s]).collect()
        } else {
            marked_starts
        };
        if starts.is_empty() {
            return Err(AcError::config("maze has no start cell"));
        }

        Ok(Self {
            map,
            config,
            cells,
            states,
            terminal,
            starts,
            current: None,
            steps: 0,
        })
    }

    /// Build a maze from an ASCII layout (see `Map::parse`)
    pub fn from_layout(layout: &str, config: MazeConfig) -> Result<Self> {
        Self::new(Map::parse(layout)?, config)
    }

    /// Generate a random maze whose every free cell can reach the goal in the bottom-right corner
    pub fn random<R: Rng + ?Sized>(config: MazeConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let goal = Position::new(config.width - 1, config.height - 1);

        for attempt in 0..config.max_attempts {
            let mut map = Map::new(config.width, config.height);
            for pos in map.positions().collect::<Vec<_>>() {
                if pos != goal && rng.random::<f64>() < config.wall_ratio {
                    map.set(pos, Tile::Wall);
                }
            }
            map.set(goal, Tile::Goal);

            if Bfs::all_reach(&map, &[goal]) {
                debug!(
                    "Generated {}x{} maze after {} attempts",
                    config.width,
                    config.height,
                    attempt + 1
                );
                return Self::new(map, config);
            }
        }

        Err(AcError::config(format!(
            "could not generate a connected {}x{} maze with wall ratio {} in {} attempts",
            config.width, config.height, config.wall_ratio, config.max_attempts
        )))
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn config(&self) -> &MazeConfig {
        &self.config
    }

    pub fn position_of(&self, state: usize) -> Option<Position> {
        self.cells.get(state).copied()
    }

    pub fn state_of(&self, pos: &Position) -> Option<usize> {
        self.states.get(pos).copied()
    }

    pub fn is_terminal(&self, state: usize) -> bool {
        self.terminal.get(state).copied().unwrap_or(false)
    }

    pub fn current_state(&self) -> Option<usize> {
        self.current
    }

    /// Shortest number of moves from each state to the nearest goal
    pub fn optimal_steps(&self) -> Vec<Option<usize>> {
        let goals: Vec<Position> = (0..self.cells.len())
            .filter(|&s| self.terminal[s])
            .map(|s| self.cells[s])
            .collect();
        let distances = Bfs::distances_from(&self.map, &goals);
        self.cells
            .iter()
            .map(|pos| distances.get(pos).copied())
            .collect()
    }

    /// Mean optimal episode length over the start states
    pub fn mean_optimal_steps(&self) -> f64 {
        let optimal = self.optimal_steps();
        let reachable: Vec<usize> = self.starts.iter().filter_map(|&s| optimal[s]).collect();
        if reachable.is_empty() {
            0.0
        } else {
            reachable.iter().sum::<usize>() as f64 / reachable.len() as f64
        }
    }

    /// Render the maze, optionally with the greedy action of each state
    pub fn draw_ascii(&self, policy: Option<&PolicyTable>) -> String {
        let mut output = String::new();

        for y in 0..self.map.height {
            for x in 0..self.map.width {
                let pos = Position::new(x, y);
                let c = match self.map.get(&pos) {
                    Some(Tile::Wall) | None => '█',
                    Some(Tile::Goal) => 'G',
                    Some(_) if Some(pos) == self.current.map(|s| self.cells[s]) => '@',
                    Some(_) => match (policy, self.state_of(&pos)) {
                        (Some(policy), Some(state)) => {
                            Direction::from_index(policy.greedy_action(state))
                                .map(Direction::arrow)
                                .unwrap_or('?')
                        }
                        _ => '.',
                    },
                };
                output.push(c);
            }
            output.push('\n');
        }

        output
    }

    fn next_position(&self, from: Position, direction: Direction) -> Position {
        let target = from.step(direction);
        if self.map.is_walkable(&target) {
            target
        } else {
            from
        }
    }
}

impl Environment for MazeEnv {
    fn nb_states(&self) -> usize {
        self.cells.len()
    }

    fn nb_actions(&self) -> usize {
        Direction::ALL.len()
    }

    fn gamma(&self) -> f64 {
        self.config.gamma
    }

    fn timeout(&self) -> usize {
        self.config.timeout
    }

    fn set_timeout(&mut self, timeout: usize) {
        self.config.timeout = timeout;
    }

    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> (usize, StepInfo) {
        let state = self.starts[rng.random_range(0..self.starts.len())];
        self.current = Some(state);
        self.steps = 0;
        (state, StepInfo::default())
    }

    fn step<R: Rng + ?Sized>(&mut self, action: usize, rng: &mut R) -> Result<StepResult> {
        let state = self
            .current
            .ok_or_else(|| AcError::environment("step called before reset"))?;
        let mut direction = Direction::from_index(action).ok_or_else(|| {
            AcError::environment(format!(
                "action {} out of range 0..{}",
                action,
                Direction::ALL.len()
            ))
        })?;

        let slip = self.config.slip_probability;
        if slip > 0.0 && rng.random::<f64>() < slip {
            direction = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
        }

        self.steps += 1;

        let (next_state, reward) = if self.terminal[state] {
            (state, 0.0)
        } else {
            let next_pos = self.next_position(self.cells[state], direction);
            let next_state = self.states[&next_pos];
            let reward = if self.terminal[next_state] {
                self.config.goal_reward
            } else {
                self.config.step_reward
            };
            (next_state, reward)
        };

        self.current = Some(next_state);
        let terminated = self.terminal[next_state];
        let truncated = !terminated && self.steps >= self.config.timeout;

        Ok(StepResult {
            next_state,
            reward,
            terminated,
            truncated,
            info: StepInfo {
                steps: self.steps,
                applied_action: Some(direction.index()),
            },
        })
    }
}
