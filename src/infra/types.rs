#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Neighbouring cell in the given direction (may lie outside the grid)
    pub fn step(&self, direction: Direction) -> Position {
        match direction {
            Direction::North => Position::new(self.x, self.y - 1),
            Direction::East => Position::new(self.x + 1, self.y),
            Direction::South => Position::new(self.x, self.y + 1),
            Direction::West => Position::new(self.x - 1, self.y),
        }
    }

    pub fn neighbors(&self) -> [Position; 4] {
        Direction::ALL.map(|direction| self.step(direction))
    }
}

/// Movement actions of the maze, indexed in the order of `ALL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Direction::ALL.get(index).copied()
    }

    pub fn arrow(self) -> char {
        match self {
            Direction::North => '↑',
            Direction::East => '→',
            Direction::South => '↓',
            Direction::West => '←',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_index_roundtrip() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_index(direction.index()), Some(direction));
        }
        assert_eq!(Direction::from_index(4), None);
    }

    #[test]
    fn test_neighbors_are_adjacent() {
        let pos = Position::new(2, 3);
        for neighbor in pos.neighbors() {
            assert_eq!(pos.distance(&neighbor), 1);
        }
        assert_eq!(pos.step(Direction::North), Position::new(2, 2));
    }
}
