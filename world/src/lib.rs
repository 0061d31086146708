#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Blockwork.
//!
//! The world owns a tile arena, the sparse spatial index derived from it, a
//! single builder, and the start position that seeds the layout walk. Tiles
//! reference their neighbours through [`TileId`] values rather than direct
//! references, so the cyclic exit graph stays free of lifetime entanglement.
//! Mutations go through the operations on [`World`]; read access goes through
//! the [`query`] module, which only ever hands out snapshots and borrows,
//! never the live backing collections.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;

use blockwork_core::{Block, Direction, Position, TileId, WorldError};

mod layout;
mod map_file;

pub use layout::LayoutError;
pub use map_file::{FormatError, LoadError};

use layout::TileLayout;

/// Most blocks a single tile can hold.
const MAX_BLOCKS: usize = 8;

/// Stack height at and above which ground blocks may not sit.
const MAX_GROUND_HEIGHT: usize = 3;

/// A stack of blocks plus the named exits leading to neighbouring tiles.
///
/// Blocks are ordered bottom to top: index 0 is the lowest block and the last
/// index is the surface. A tile never holds more than eight blocks, and a
/// ground block never sits at stack index three or higher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    blocks: Vec<Block>,
    exits: BTreeMap<Direction, TileId>,
}

impl Tile {
    /// Creates a tile with the default stack of two soil blocks under a
    /// grass block, and no exits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::Soil, Block::Soil, Block::Grass],
            exits: BTreeMap::new(),
        }
    }

    /// Creates a tile holding exactly the provided stack.
    ///
    /// Fails with [`WorldError::TooHigh`] if more than eight blocks are given
    /// or if a ground block sits at stack index three or higher; an invalid
    /// stack is rejected outright rather than truncated.
    pub fn with_blocks(blocks: Vec<Block>) -> Result<Self, WorldError> {
        if blocks.len() > MAX_BLOCKS {
            return Err(WorldError::TooHigh);
        }
        if blocks.iter().skip(MAX_GROUND_HEIGHT).any(|block| block.is_ground()) {
            return Err(WorldError::TooHigh);
        }
        Ok(Self {
            blocks,
            exits: BTreeMap::new(),
        })
    }

    /// The blocks on this tile, bottom to top.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks currently stacked on this tile.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterates the exits of this tile in direction order.
    pub fn exits(&self) -> impl Iterator<Item = (Direction, TileId)> + '_ {
        self.exits.iter().map(|(direction, target)| (*direction, *target))
    }

    /// The neighbour reached through the named exit, if one exists.
    #[must_use]
    pub fn exit(&self, direction: Direction) -> Option<TileId> {
        self.exits.get(&direction).copied()
    }

    /// Adds an exit toward the given tile, replacing any existing exit with
    /// the same name.
    pub fn add_exit(&mut self, direction: Direction, target: TileId) {
        let _ = self.exits.insert(direction, target);
    }

    /// Removes the named exit.
    ///
    /// Fails with [`WorldError::NoExit`] if the exit does not exist.
    pub fn remove_exit(&mut self, direction: Direction) -> Result<(), WorldError> {
        match self.exits.remove(&direction) {
            Some(_) => Ok(()),
            None => Err(WorldError::NoExit),
        }
    }

    /// The top block of the stack.
    ///
    /// Fails with [`WorldError::TooLow`] if the tile is empty.
    pub fn top_block(&self) -> Result<Block, WorldError> {
        self.blocks.last().copied().ok_or(WorldError::TooLow)
    }

    /// Removes and returns the top block of the stack.
    ///
    /// Fails with [`WorldError::TooLow`] if the tile is empty.
    pub fn remove_top_block(&mut self) -> Result<Block, WorldError> {
        self.blocks.pop().ok_or(WorldError::TooLow)
    }

    /// Digs the top block out of the tile and returns it.
    ///
    /// Fails with [`WorldError::TooLow`] if the tile is empty and with
    /// [`WorldError::InvalidBlock`] if the top block is not diggable; in the
    /// latter case the block stays on the tile.
    pub fn dig(&mut self) -> Result<Block, WorldError> {
        let top = self.top_block()?;
        if !top.is_diggable() {
            return Err(WorldError::InvalidBlock);
        }
        self.remove_top_block()
    }

    /// Places a block on top of the stack.
    ///
    /// Fails with [`WorldError::TooHigh`] if the tile already holds eight
    /// blocks, or already holds three or more and the incoming block is a
    /// ground block.
    pub fn place_block(&mut self, block: Block) -> Result<(), WorldError> {
        if self.blocks.len() >= MAX_BLOCKS
            || (block.is_ground() && self.blocks.len() >= MAX_GROUND_HEIGHT)
        {
            return Err(WorldError::TooHigh);
        }
        self.blocks.push(block);
        Ok(())
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::new()
    }
}

/// The single mobile agent that traverses and reshapes the world.
#[derive(Clone, Debug)]
pub struct Builder {
    name: String,
    inventory: Vec<Block>,
    current_tile: TileId,
}

impl Builder {
    /// Creates a builder with an empty inventory standing on the given tile.
    #[must_use]
    pub fn new(name: impl Into<String>, starting_tile: TileId) -> Self {
        Self {
            name: name.into(),
            inventory: Vec::new(),
            current_tile: starting_tile,
        }
    }

    /// Creates a builder carrying the provided starting inventory.
    ///
    /// Fails with [`WorldError::InvalidBlock`] if any starting block is not
    /// carryable.
    pub fn with_inventory(
        name: impl Into<String>,
        starting_tile: TileId,
        inventory: Vec<Block>,
    ) -> Result<Self, WorldError> {
        if inventory.iter().any(|block| !block.is_carryable()) {
            return Err(WorldError::InvalidBlock);
        }
        Ok(Self {
            name: name.into(),
            inventory,
            current_tile: starting_tile,
        })
    }

    /// The builder's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tile the builder currently stands on.
    #[must_use]
    pub fn current_tile(&self) -> TileId {
        self.current_tile
    }

    /// The carried blocks in insertion order.
    #[must_use]
    pub fn inventory(&self) -> &[Block] {
        &self.inventory
    }

    fn set_current_tile(&mut self, tile: TileId) {
        self.current_tile = tile;
    }

    fn push_inventory(&mut self, block: Block) {
        self.inventory.push(block);
    }

    fn remove_inventory(&mut self, index: usize) -> Block {
        self.inventory.remove(index)
    }
}

/// The authoritative Blockwork world: tile arena, spatial layout, builder,
/// and start position.
#[derive(Debug)]
pub struct World {
    tiles: Vec<Tile>,
    layout: TileLayout,
    builder: Builder,
    start_position: Position,
}

impl World {
    /// Builds a world from a tile arena, the start position, and a builder.
    ///
    /// The layout walk runs from the builder's current tile at
    /// `start_position`; tiles not reachable from there stay in the arena but
    /// outside the spatial index. Fails with a [`LayoutError`] when the exit
    /// graph is geometrically impossible, in which case no world is
    /// constructed.
    ///
    /// Panics if the builder's tile or any exit target is not a valid arena
    /// slot; identifiers must come from indices into `tiles`.
    pub fn new(
        tiles: Vec<Tile>,
        start_position: Position,
        builder: Builder,
    ) -> Result<Self, LayoutError> {
        assert!(
            builder.current_tile().index() < tiles.len(),
            "builder starts on a tile outside the arena"
        );
        for tile in &tiles {
            for (_, target) in tile.exits() {
                assert!(
                    target.index() < tiles.len(),
                    "exit target outside the tile arena"
                );
            }
        }

        let mut layout = TileLayout::new();
        layout.rebuild(&tiles, builder.current_tile(), start_position)?;
        Ok(Self {
            tiles,
            layout,
            builder,
            start_position,
        })
    }

    /// Loads a world from a map text source.
    pub fn load(reader: impl BufRead) -> Result<Self, LoadError> {
        map_file::read_world(reader)
    }

    /// Loads a world from a map file on disk.
    ///
    /// A missing file is reported as [`LoadError::FileNotFound`], distinct
    /// from every malformed-content condition.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(LoadError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(error) => {
                return Err(LoadError::Format(FormatError::new(format!(
                    "could not open '{}': {error}",
                    path.display()
                ))));
            }
        };
        Self::load(io::BufReader::new(file))
    }

    /// Writes the world to a map text sink.
    pub fn save(&self, out: &mut impl Write) -> io::Result<()> {
        map_file::write_world(self, out)
    }

    /// Writes the world to a map file on disk.
    pub fn save_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = io::BufWriter::new(file);
        self.save(&mut writer)?;
        writer.flush()
    }

    /// Moves the builder through the named exit of its current tile.
    ///
    /// Fails with [`WorldError::NoExit`] if the exit is absent or the target
    /// tile cannot be entered.
    pub fn move_builder(&mut self, direction: Direction) -> Result<(), WorldError> {
        let current = &self.tiles[self.builder.current_tile().index()];
        match current.exit(direction) {
            Some(target) => self.move_builder_to(target),
            None => Err(WorldError::NoExit),
        }
    }

    /// Moves the builder onto the given tile.
    ///
    /// Fails with [`WorldError::NoExit`] unless the tile is reachable through
    /// an exit of the current tile and its height differs by at most one
    /// block.
    pub fn move_builder_to(&mut self, target: TileId) -> Result<(), WorldError> {
        if !self.can_enter(target) {
            return Err(WorldError::NoExit);
        }
        self.builder.set_current_tile(target);
        Ok(())
    }

    /// Moves the top block of `from` onto the neighbour through the named
    /// exit.
    ///
    /// Fails with [`WorldError::NoExit`] if the exit is absent, with
    /// [`WorldError::TooHigh`] if the destination is at least as tall as the
    /// source, and with [`WorldError::InvalidBlock`] if the top block is not
    /// moveable. The height precondition guarantees the destination accepts
    /// the block.
    pub fn move_block(&mut self, from: TileId, direction: Direction) -> Result<(), WorldError> {
        let source = self.tiles.get(from.index()).ok_or(WorldError::NoExit)?;
        let target = source.exit(direction).ok_or(WorldError::NoExit)?;
        if self.tiles[target.index()].block_count() >= source.block_count() {
            return Err(WorldError::TooHigh);
        }
        let top = self.tiles[from.index()].top_block()?;
        if !top.is_moveable() {
            return Err(WorldError::InvalidBlock);
        }
        let block = self.tiles[from.index()].remove_top_block()?;
        self.tiles[target.index()].place_block(block)
    }

    /// Digs the top block of the builder's current tile, keeping it in the
    /// inventory when carryable and discarding it otherwise.
    ///
    /// Fails with [`WorldError::TooLow`] on an empty tile and with
    /// [`WorldError::InvalidBlock`] when the top block is not diggable.
    pub fn dig_on_current_tile(&mut self) -> Result<Block, WorldError> {
        let tile = &mut self.tiles[self.builder.current_tile().index()];
        let block = tile.dig()?;
        if block.is_carryable() {
            self.builder.push_inventory(block);
        }
        Ok(block)
    }

    /// Drops the inventory block at `index` onto the builder's current tile.
    ///
    /// Fails with [`WorldError::InvalidBlock`] if the index is out of range
    /// and propagates [`WorldError::TooHigh`] from placement; the inventory
    /// only shrinks when the block actually lands.
    pub fn drop_from_inventory(&mut self, index: usize) -> Result<(), WorldError> {
        let block = self
            .builder
            .inventory()
            .get(index)
            .copied()
            .ok_or(WorldError::InvalidBlock)?;
        self.tiles[self.builder.current_tile().index()].place_block(block)?;
        let _ = self.builder.remove_inventory(index);
        Ok(())
    }

    /// Mutable access to a tile slot, for reshaping a world in place.
    ///
    /// Panics if `id` is not a valid arena slot. Note that the spatial index
    /// reflects the exit graph as it stood at construction or load time.
    pub fn tile_mut(&mut self, id: TileId) -> &mut Tile {
        &mut self.tiles[id.index()]
    }

    fn can_enter(&self, target: TileId) -> bool {
        let Some(target_tile) = self.tiles.get(target.index()) else {
            return false;
        };
        let current = &self.tiles[self.builder.current_tile().index()];
        let connected = current.exits().any(|(_, id)| id == target);
        let heights_compatible =
            target_tile.block_count().abs_diff(current.block_count()) <= 1;
        connected && heights_compatible
    }

    pub(crate) fn arena(&self) -> &[Tile] {
        &self.tiles
    }

    pub(crate) fn layout(&self) -> &TileLayout {
        &self.layout
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::{Builder, Position, Tile, TileId, World};

    /// The builder inhabiting the world.
    #[must_use]
    pub fn builder(world: &World) -> &Builder {
        &world.builder
    }

    /// The position that seeded the layout walk.
    #[must_use]
    pub fn start_position(world: &World) -> Position {
        world.start_position
    }

    /// The tile stored at the given arena slot, if the slot exists.
    #[must_use]
    pub fn tile(world: &World, id: TileId) -> Option<&Tile> {
        world.tiles.get(id.index())
    }

    /// The tile laid out at the given position, if any.
    #[must_use]
    pub fn tile_at(world: &World, position: Position) -> Option<TileId> {
        world.layout.tile_at(position)
    }

    /// The position assigned to the given tile by the layout walk, if it is
    /// reachable from the start tile.
    #[must_use]
    pub fn position_of(world: &World, id: TileId) -> Option<Position> {
        world.layout.position_of(id)
    }

    /// Snapshot of the reachable tiles in layout-walk order.
    ///
    /// The order fixes the tile numbering used by saved map files. The
    /// returned sequence is independent of the world; mutating it does not
    /// affect later calls.
    #[must_use]
    pub fn tiles_in_layout_order(world: &World) -> Vec<TileId> {
        world.layout.ordered().to_vec()
    }

    /// Number of tiles reachable from the start tile.
    #[must_use]
    pub fn tile_count(world: &World) -> usize {
        world.layout.ordered().len()
    }

    /// Whether the builder could step onto the given tile from where it
    /// stands.
    #[must_use]
    pub fn builder_can_enter(world: &World, target: TileId) -> bool {
        world.can_enter(target)
    }
}
