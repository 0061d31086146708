#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Blockwork engine.
//!
//! This crate defines the value types that connect the authoritative world,
//! the action system, and the command-line adapter: block variants with their
//! fixed attribute table, integer tile coordinates, the four exit directions,
//! arena tile identifiers, and the domain error kind raised when a tile or
//! builder mutation is rejected.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kinds of block that can be stacked on a tile.
///
/// Each variant carries a fixed, immutable attribute set; there is no
/// per-instance state. Grass and soil are ground blocks: never moveable,
/// always diggable, and confined to the bottom of a stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Block {
    /// A grass block; green, diggable, neither moveable nor carryable.
    Grass,
    /// A soil block; black, diggable and carryable but not moveable.
    Soil,
    /// A stone block; gray and completely inert.
    Stone,
    /// A wooden block; brown, diggable, moveable, and carryable.
    Wood,
}

impl Block {
    /// Name used for this block in map files and diagnostics.
    #[must_use]
    pub const fn block_type(self) -> &'static str {
        match self {
            Self::Grass => "grass",
            Self::Soil => "soil",
            Self::Stone => "stone",
            Self::Wood => "wood",
        }
    }

    /// Colour a renderer would paint this block.
    #[must_use]
    pub const fn colour(self) -> &'static str {
        match self {
            Self::Grass => "green",
            Self::Soil => "black",
            Self::Stone => "gray",
            Self::Wood => "brown",
        }
    }

    /// Whether the block can be removed from the top of a tile.
    #[must_use]
    pub const fn is_diggable(self) -> bool {
        !matches!(self, Self::Stone)
    }

    /// Whether the block can be shifted onto an adjacent tile.
    #[must_use]
    pub const fn is_moveable(self) -> bool {
        matches!(self, Self::Wood)
    }

    /// Whether the block can be added to a builder's inventory.
    #[must_use]
    pub const fn is_carryable(self) -> bool {
        matches!(self, Self::Soil | Self::Wood)
    }

    /// Whether the block is a ground block, restricted to the bottom of a
    /// stack.
    #[must_use]
    pub const fn is_ground(self) -> bool {
        matches!(self, Self::Grass | Self::Soil)
    }

    /// Resolves a map-file block name to its variant.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "grass" => Some(Self::Grass),
            "soil" => Some(Self::Soil),
            "stone" => Some(Self::Stone),
            "wood" => Some(Self::Wood),
            _ => None,
        }
    }
}

/// Location of a tile expressed as integer coordinates.
///
/// Positions order by x first, then y, and render as `"(x, y)"`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    x: i32,
    y: i32,
}

impl Position {
    /// Creates a new position at the provided coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal coordinate; east is positive.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical coordinate; south is positive.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Named exit directions connecting neighbouring tiles.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Direction {
    /// Toward decreasing y.
    North,
    /// Toward increasing x.
    East,
    /// Toward increasing y.
    South,
    /// Toward decreasing x.
    West,
}

impl Direction {
    /// Every direction in the fixed traversal order used by the layout walk.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// The exit-name token used in map files and action streams.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }

    /// Resolves an exit-name token to its direction.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "north" => Some(Self::North),
            "east" => Some(Self::East),
            "south" => Some(Self::South),
            "west" => Some(Self::West),
            _ => None,
        }
    }

    /// The position one step in this direction from `from`.
    #[must_use]
    pub const fn step_from(self, from: Position) -> Position {
        match self {
            Self::North => Position::new(from.x(), from.y() - 1),
            Self::East => Position::new(from.x() + 1, from.y()),
            Self::South => Position::new(from.x(), from.y() + 1),
            Self::West => Position::new(from.x() - 1, from.y()),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of a tile slot within the world's tile arena.
///
/// Tiles reference each other exclusively through identifiers, so the cyclic
/// exit graph never holds direct references, and maps keyed by `TileId` are
/// keyed by tile identity rather than structural equality.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TileId(usize);

impl TileId {
    /// Creates an identifier for the provided arena slot.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Retrieves the underlying arena slot.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

/// Reasons the world rejects a tile or builder mutation.
///
/// These are always recoverable at the action-interpretation boundary; they
/// become fatal only when raised while constructing a world from a map file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum WorldError {
    /// The requested exit does not exist or cannot be entered.
    #[error("no exit this way")]
    NoExit,
    /// The mutation would stack blocks above an allowed height.
    #[error("the block stack is too high")]
    TooHigh,
    /// The mutation needs a block where none remains.
    #[error("the block stack is too low")]
    TooLow,
    /// The block in question cannot be used this way.
    #[error("cannot use that block")]
    InvalidBlock,
}
