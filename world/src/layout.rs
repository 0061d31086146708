//! Breadth-first tile layout used by the world crate.
//!
//! The layout assigns an integer grid position to every tile reachable from a
//! root tile by walking exits in the fixed order north, east, south, west,
//! and rejects graphs that are geometrically impossible: a tile that would
//! need two different positions, or a position that two different tiles
//! would need to share. The visitation order doubles as the tile numbering
//! for saved map files.

use std::collections::{HashMap, VecDeque};

use blockwork_core::{Direction, Position, TileId};
use thiserror::Error;

use crate::Tile;

/// Reasons a tile graph cannot be laid out on the integer grid.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// Following an exit would place an already-placed tile somewhere else.
    #[error("tile expected at {expected} is already placed at {actual}")]
    TileRelocated {
        /// Position the exit says the tile should occupy.
        expected: Position,
        /// Position the tile was already assigned.
        actual: Position,
    },
    /// Following an exit would put a second tile onto an occupied position.
    #[error("position {position} is already occupied by a different tile")]
    PositionOccupied {
        /// The contested position.
        position: Position,
    },
}

/// Sparse bidirectional index between grid positions and arena tiles.
///
/// Rebuilt wholesale from a root tile; left empty whenever a rebuild fails,
/// so lookups never observe a partially laid out graph. The reverse map is
/// keyed by [`TileId`], i.e. by tile identity: two structurally identical
/// tiles in different arena slots stay distinct.
#[derive(Debug, Default)]
pub(crate) struct TileLayout {
    by_position: HashMap<Position, TileId>,
    positions: HashMap<TileId, Position>,
    ordered: Vec<TileId>,
}

impl TileLayout {
    /// Creates an empty layout; every lookup reports "absent".
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Discards the previous layout and walks the graph reachable from
    /// `root`, assigning positions relative to `origin`.
    ///
    /// One-way exits are legal; only an exit that contradicts an assignment
    /// already made is an error. On failure the layout is left empty.
    pub(crate) fn rebuild(
        &mut self,
        tiles: &[Tile],
        root: TileId,
        origin: Position,
    ) -> Result<(), LayoutError> {
        self.clear();
        let outcome = self.traverse(tiles, root, origin);
        if outcome.is_err() {
            self.clear();
        }
        outcome
    }

    /// The tile laid out at `position`, if any.
    pub(crate) fn tile_at(&self, position: Position) -> Option<TileId> {
        self.by_position.get(&position).copied()
    }

    /// The position assigned to `tile`, if it was reached by the walk.
    pub(crate) fn position_of(&self, tile: TileId) -> Option<Position> {
        self.positions.get(&tile).copied()
    }

    /// The reachable tiles in visitation order.
    pub(crate) fn ordered(&self) -> &[TileId] {
        &self.ordered
    }

    fn traverse(
        &mut self,
        tiles: &[Tile],
        root: TileId,
        origin: Position,
    ) -> Result<(), LayoutError> {
        let mut queue = VecDeque::new();
        self.record(root, origin);
        queue.push_back(root);

        while let Some(current) = queue.pop_front() {
            self.ordered.push(current);
            let position = self.positions[&current];

            for direction in Direction::ALL {
                let Some(neighbour) = tiles[current.index()].exit(direction) else {
                    continue;
                };
                let expected = direction.step_from(position);

                if let Some(&actual) = self.positions.get(&neighbour) {
                    if actual != expected {
                        return Err(LayoutError::TileRelocated { expected, actual });
                    }
                }

                match self.by_position.get(&expected) {
                    Some(&occupant) if occupant != neighbour => {
                        return Err(LayoutError::PositionOccupied { position: expected });
                    }
                    // already recorded consistently; do not enqueue again
                    Some(_) => {}
                    None => {
                        self.record(neighbour, expected);
                        queue.push_back(neighbour);
                    }
                }
            }
        }

        Ok(())
    }

    fn record(&mut self, tile: TileId, position: Position) {
        let _ = self.by_position.insert(position, tile);
        let _ = self.positions.insert(tile, position);
    }

    fn clear(&mut self) {
        self.by_position.clear();
        self.positions.clear();
        self.ordered.clear();
    }
}
