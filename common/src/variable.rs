use std::hash::{Hash, Hasher};

use crate::game::Point;

/// The solver's per-cell state.
///
/// One `Variable` exists per board coordinate for the lifetime of a game,
/// owned by the agent's coordinate-keyed table. Equations reference cells by
/// [`Point`] and resolve them through that table, so there is no object
/// aliasing between constraints.
#[derive(Debug, Clone)]
pub struct Variable {
    pub pos: Point,
    /// The revealed clue, once this cell has been exposed.
    pub value: Option<u8>,
    /// Remaining unexplained mine count for the equation built around this
    /// cell: the clue minus the neighbors already flagged at build time.
    pub constraint_value: u8,
    /// The unrevealed neighbors the equation built around this cell refers to.
    pub constraint_neighbors: Vec<Point>,
}

impl Variable {
    pub fn new(pos: Point) -> Self {
        Variable {
            pos,
            value: None,
            constraint_value: 0,
            constraint_neighbors: Vec::new(),
        }
    }

    /// Clears everything except the coordinate identity, for reuse across
    /// games.
    pub fn reset(&mut self) {
        self.value = None;
        self.constraint_value = 0;
        self.constraint_neighbors.clear();
    }
}

// Identity is the coordinate alone; clue state never affects equality.
impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pos.hash(state);
    }
}
