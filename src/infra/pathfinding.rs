use std::collections::{HashMap, VecDeque};

use crate::infra::Position;
use crate::state::Map;

pub struct Bfs;

impl Bfs {
    /// Multi-source breadth-first search over walkable cells.
    /// Returns the number of moves from every reachable position to the closest source.
    pub fn distances_from(map: &Map, sources: &[Position]) -> HashMap<Position, usize> {
        let mut distances: HashMap<Position, usize> = HashMap::new();
        let mut queue = VecDeque::new();

        for &source in sources {
            if map.is_walkable(&source) && !distances.contains_key(&source) {
                distances.insert(source, 0);
                queue.push_back(source);
            }
        }

        while let Some(current) = queue.pop_front() {
            let current_distance = distances[&current];
            for neighbor in current.neighbors() {
                if !map.is_walkable(&neighbor) || distances.contains_key(&neighbor) {
                    continue;
                }
                distances.insert(neighbor, current_distance + 1);
                queue.push_back(neighbor);
            }
        }

        distances
    }

    /// Whether every walkable cell can reach at least one of the targets
    pub fn all_reach(map: &Map, targets: &[Position]) -> bool {
        let distances = Self::distances_from(map, targets);
        map.iter()
            .filter(|(_, tile)| tile.is_walkable())
            .all(|(pos, _)| distances.contains_key(&pos))
    }
}
