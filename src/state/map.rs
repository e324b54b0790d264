use crate::error::{AcError, Result};
use crate::infra::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Free,
    Wall,
    Goal,
    Start,
}

impl Tile {
    pub fn is_walkable(self) -> bool {
        !matches!(self, Tile::Wall)
    }

    fn from_char(c: char) -> Option<Tile> {
        match c {
            '.' | ' ' => Some(Tile::Free),
            '#' => Some(Tile::Wall),
            'G' => Some(Tile::Goal),
            'S' => Some(Tile::Start),
            _ => None,
        }
    }
}

/// Dense rectangular grid of tiles, row-major
#[derive(Clone, Debug)]
pub struct Map {
    pub width: i32,
    pub height: i32,
    tiles: Vec<Tile>,
}

impl Map {
    pub fn new(width: i32, height: i32) -> Self {
        let len = width.max(0) as usize * height.max(0) as usize;
        Self {
            width,
            height,
            tiles: vec![Tile::Free; len],
        }
    }

    /// Parse a layout where `#` is a wall, `.` free, `G` a goal and `S` a start cell.
    pub fn parse(layout: &str) -> Result<Self> {
        let rows: Vec<&str> = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if rows.is_empty() {
            return Err(AcError::config("maze layout is empty"));
        }

        let width = rows[0].chars().count();
        let mut tiles = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(AcError::config(format!(
                    "maze layout row {} has {} cells, expected {}",
                    y,
                    row.chars().count(),
                    width
                )));
            }
            for c in row.chars() {
                let tile = Tile::from_char(c).ok_or_else(|| {
                    AcError::config(format!("unknown maze tile '{}' in row {}", c, y))
                })?;
                tiles.push(tile);
            }
        }

        Ok(Self {
            width: width as i32,
            height: rows.len() as i32,
            tiles,
        })
    }

    pub fn contains(&self, pos: &Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    pub fn get(&self, pos: &Position) -> Option<Tile> {
        if self.contains(pos) {
            Some(self.tiles[self.offset(pos)])
        } else {
            None
        }
    }

    pub fn set(&mut self, pos: Position, tile: Tile) {
        if self.contains(&pos) {
            let offset = self.offset(&pos);
            self.tiles[offset] = tile;
        }
    }

    pub fn is_walkable(&self, pos: &Position) -> bool {
        self.get(pos).is_some_and(Tile::is_walkable)
    }

    /// All positions in row-major order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Position::new(x, y)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, Tile)> + '_ {
        self.positions().zip(self.tiles.iter().copied())
    }

    fn offset(&self, pos: &Position) -> usize {
        (pos.y * self.width + pos.x) as usize
    }
}
