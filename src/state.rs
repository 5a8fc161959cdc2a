use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn squared_distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Path of a single particle, one position per sampled timestep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trajectory {
    positions: Vec<Position>,
}

impl Trajectory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, position: Position) {
        self.positions.push(position);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn first(&self) -> Option<&Position> {
        self.positions.first()
    }

    pub fn last(&self) -> Option<&Position> {
        self.positions.last()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }
}

impl From<Vec<Position>> for Trajectory {
    fn from(positions: Vec<Position>) -> Self {
        Self { positions }
    }
}
