//! World map file codec.
//!
//! The format is line oriented and strict: a starting position, the builder
//! name and inventory, a `total:<N>` header followed by exactly N tile
//! entries, and an `exits` section with exactly N exit entries. Tile numbers
//! in a saved file are layout-walk positions, so a save always emits the
//! reachable tiles in a canonical order regardless of how the arena was
//! assembled. The reader takes declared numbers at face value and re-derives
//! geometric consistency from the loaded graph instead of trusting the file.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Write};

use blockwork_core::{Block, Direction, Position, TileId};
use thiserror::Error;

use crate::{query, Builder, LayoutError, Tile, World};

#[cfg(windows)]
const LINE_SEP: &str = "\r\n";
#[cfg(not(windows))]
const LINE_SEP: &str = "\n";

/// A malformed map source.
///
/// Carries the offending line number when the failure can be pinned to one.
#[derive(Clone, Debug)]
pub struct FormatError {
    line: Option<usize>,
    message: String,
}

impl FormatError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub(crate) fn at_line(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }

    /// The one-based line the failure was detected on, when known.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Description of what was wrong with the source.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "error on line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for FormatError {}

/// Reasons loading a world map can fail.
///
/// A missing file stays distinguishable from malformed content, and malformed
/// content stays distinguishable from a syntactically valid file whose exit
/// graph is geometrically impossible.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The map file does not exist.
    #[error("world map file '{path}' does not exist")]
    FileNotFound {
        /// The path that was asked for.
        path: String,
    },
    /// The map source violated the format.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// The map parsed but its tiles cannot be laid out on the grid.
    #[error(transparent)]
    Inconsistent(#[from] LayoutError),
}

/// Wraps a reader with one-based line accounting for error reporting.
struct LineReader<R> {
    reader: R,
    line: usize,
}

impl<R: BufRead> LineReader<R> {
    fn new(reader: R) -> Self {
        Self { reader, line: 0 }
    }

    fn current_line(&self) -> usize {
        self.line
    }

    fn error(&self, message: impl Into<String>) -> FormatError {
        FormatError::at_line(self.line, message)
    }

    /// Reads the next line without its terminator; `None` at end of input.
    fn next_line(&mut self) -> Result<Option<String>, FormatError> {
        let mut buffer = String::new();
        let bytes = self.reader.read_line(&mut buffer).map_err(|error| {
            FormatError::at_line(self.line, format!("could not read the map source: {error}"))
        })?;
        if bytes == 0 {
            return Ok(None);
        }
        self.line += 1;
        if buffer.ends_with('\n') {
            let _ = buffer.pop();
            if buffer.ends_with('\r') {
                let _ = buffer.pop();
            }
        }
        Ok(Some(buffer))
    }

    fn expect_line(&mut self, missing: &str) -> Result<String, FormatError> {
        match self.next_line()? {
            Some(line) => Ok(line),
            None => Err(self.error(missing)),
        }
    }

    fn expect_blank(&mut self, missing: &str, not_blank: &str) -> Result<(), FormatError> {
        let line = self.expect_line(missing)?;
        if line.is_empty() {
            Ok(())
        } else {
            Err(self.error(not_blank))
        }
    }

    fn expect_end(&mut self, not_end: &str) -> Result<(), FormatError> {
        match self.next_line()? {
            Some(_) => Err(self.error(not_end)),
            None => Ok(()),
        }
    }
}

/// Splits `text` on exactly one occurrence of `delimiter`.
fn split_pair<'t>(
    text: &'t str,
    delimiter: char,
    line: usize,
    missing: &str,
    too_many: &str,
) -> Result<(&'t str, &'t str), FormatError> {
    let mut pieces = text.splitn(3, delimiter);
    let first = pieces.next().unwrap_or("");
    let Some(second) = pieces.next() else {
        return Err(FormatError::at_line(line, missing));
    };
    if pieces.next().is_some() {
        return Err(FormatError::at_line(line, too_many));
    }
    Ok((first, second))
}

/// Parses a tile number and bounds-checks it against the declared total.
fn parse_id(token: &str, what: &str, total: usize, line: usize) -> Result<usize, FormatError> {
    let value: i64 = token
        .parse()
        .map_err(|_| FormatError::at_line(line, format!("{what} is not a valid integer")))?;
    if value < 0 {
        return Err(FormatError::at_line(line, format!("{what} is negative")));
    }
    let value = usize::try_from(value)
        .map_err(|_| FormatError::at_line(line, format!("{what} is out of range")))?;
    if value >= total {
        return Err(FormatError::at_line(line, format!("{what} is out of range")));
    }
    Ok(value)
}

/// Decodes a comma-separated block list; the empty string is an empty list.
fn decode_blocks(text: &str, line: usize) -> Result<Vec<Block>, FormatError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|token| {
            Block::from_type_name(token).ok_or_else(|| {
                FormatError::at_line(line, format!("unknown block name '{token}'"))
            })
        })
        .collect()
}

pub(crate) fn read_world(reader: impl BufRead) -> Result<World, LoadError> {
    let mut lines = LineReader::new(reader);

    let x_line = lines.expect_line("file ended before the starting position")?;
    let x: i32 = x_line
        .parse()
        .map_err(|_| lines.error("starting x is not a valid integer"))?;
    let y_line = lines.expect_line("file ended before the starting position")?;
    let y: i32 = y_line
        .parse()
        .map_err(|_| lines.error("starting y is not a valid integer"))?;

    let builder_name = lines.expect_line("file ended before the builder name")?;
    let inventory_line = lines.expect_line("file ended before the inventory")?;
    let inventory = decode_blocks(&inventory_line, lines.current_line())?;
    lines.expect_blank(
        "file ended after the inventory",
        "expected a blank line after the inventory",
    )?;

    let total_line = lines.expect_line("file ended before the tile total")?;
    let (keyword, count_token) = split_pair(
        &total_line,
        ':',
        lines.current_line(),
        "tile total line is missing a colon",
        "tile total line has too many colons",
    )?;
    if keyword != "total" {
        return Err(lines.error("tile total line must start with 'total'").into());
    }
    let declared: i64 = count_token
        .parse()
        .map_err(|_| lines.error("tile total is not a valid integer"))?;
    if declared < 0 {
        return Err(lines.error("tile total is negative").into());
    }
    let total = usize::try_from(declared)
        .map_err(|_| lines.error("tile total is out of range"))?;
    if total == 0 {
        return Err(lines.error("map declares no tiles").into());
    }

    let mut slots: Vec<Option<Tile>> = vec![None; total];
    for _ in 0..total {
        let entry = lines.expect_line("missing tile entry under 'total'")?;
        let (id_token, block_list) = split_pair(
            &entry,
            ' ',
            lines.current_line(),
            "tile entry is missing a space",
            "tile entry has too many spaces",
        )?;
        let id = parse_id(id_token, "tile id", total, lines.current_line())?;
        if slots[id].is_some() {
            return Err(lines.error(format!("duplicate tile entry for id {id}")).into());
        }
        let blocks = decode_blocks(block_list, lines.current_line())?;
        let tile = Tile::with_blocks(blocks)
            .map_err(|_| lines.error("tile blocks violate the stack limits"))?;
        slots[id] = Some(tile);
    }
    // every id in [0, total) appeared exactly once, so every slot is filled
    let mut tiles: Vec<Tile> = slots.into_iter().flatten().collect();

    lines.expect_blank(
        "file ended after the tile entries",
        "expected a blank line after the tile entries",
    )?;
    let header = lines.expect_line("file ended before the exits section")?;
    if header != "exits" {
        return Err(lines.error("expected the 'exits' header").into());
    }

    let mut seen = vec![false; total];
    for _ in 0..total {
        let entry = lines.expect_line("missing exit entry under 'exits'")?;
        let (id_token, exit_list) = split_pair(
            &entry,
            ' ',
            lines.current_line(),
            "exit entry is missing a space",
            "exit entry has too many spaces",
        )?;
        let id = parse_id(id_token, "tile id", total, lines.current_line())?;
        if seen[id] {
            return Err(lines.error(format!("duplicate exit entry for id {id}")).into());
        }
        seen[id] = true;
        if exit_list.is_empty() {
            continue;
        }
        for exit in exit_list.split(',') {
            let (name, target_token) = split_pair(
                exit,
                ':',
                lines.current_line(),
                "exit is missing a colon",
                "exit has too many colons",
            )?;
            let direction = Direction::from_name(name)
                .ok_or_else(|| lines.error(format!("unknown exit name '{name}'")))?;
            let target = parse_id(target_token, "exit target", total, lines.current_line())?;
            tiles[id].add_exit(direction, TileId::new(target));
        }
    }

    lines.expect_end("unexpected content after the exit entries")?;

    let builder = Builder::with_inventory(builder_name, TileId::new(0), inventory)
        .map_err(|_| FormatError::new("the starting inventory contains a block that cannot be carried"))?;
    let world = World::new(tiles, Position::new(x, y), builder)?;
    Ok(world)
}

pub(crate) fn write_world(world: &World, out: &mut impl Write) -> io::Result<()> {
    let order = world.layout().ordered();
    let mut file_ids = HashMap::with_capacity(order.len());
    for (file_id, tile_id) in order.iter().enumerate() {
        let _ = file_ids.insert(*tile_id, file_id);
    }

    let builder = query::builder(world);
    let start = query::start_position(world);
    write!(out, "{}{LINE_SEP}", start.x())?;
    write!(out, "{}{LINE_SEP}", start.y())?;
    write!(out, "{}{LINE_SEP}", builder.name())?;
    write!(out, "{}{LINE_SEP}", encode_blocks(builder.inventory()))?;
    write!(out, "{LINE_SEP}")?;

    write!(out, "total:{}{LINE_SEP}", order.len())?;
    for (file_id, tile_id) in order.iter().enumerate() {
        let tile = &world.arena()[tile_id.index()];
        write!(out, "{file_id} {}{LINE_SEP}", encode_blocks(tile.blocks()))?;
    }
    write!(out, "{LINE_SEP}")?;

    write!(out, "exits{LINE_SEP}")?;
    for (file_id, tile_id) in order.iter().enumerate() {
        let tile = &world.arena()[tile_id.index()];
        write!(out, "{file_id} ")?;
        let mut separator = "";
        for (direction, target) in tile.exits() {
            // the walk reaches every exit target, so the lookup cannot miss
            let Some(target_id) = file_ids.get(&target) else {
                continue;
            };
            write!(out, "{separator}{}:{target_id}", direction.name())?;
            separator = ",";
        }
        write!(out, "{LINE_SEP}")?;
    }
    Ok(())
}

fn encode_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| block.block_type())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::{FormatError, LoadError};
    use crate::{query, World};
    use blockwork_core::{Block, Direction, Position, TileId};

    const SAMPLE: &str = "1\n\
        2\n\
        Bob\n\
        wood,wood,wood,soil\n\
        \n\
        total:4\n\
        0 soil,soil,grass,wood\n\
        1 grass,grass,soil\n\
        2 soil,soil,soil,wood\n\
        3 grass,grass,grass,stone\n\
        \n\
        exits\n\
        0 east:2,north:1,west:3\n\
        1 south:0\n\
        2 west:0\n\
        3 east:0\n";

    /// The sample as this codec writes it: layout-walk exit order.
    const SAMPLE_CANONICAL: &str = "1\n\
        2\n\
        Bob\n\
        wood,wood,wood,soil\n\
        \n\
        total:4\n\
        0 soil,soil,grass,wood\n\
        1 grass,grass,soil\n\
        2 soil,soil,soil,wood\n\
        3 grass,grass,grass,stone\n\
        \n\
        exits\n\
        0 north:1,east:2,west:3\n\
        1 south:0\n\
        2 west:0\n\
        3 east:0\n";

    fn load(text: &str) -> Result<World, LoadError> {
        World::load(text.as_bytes())
    }

    fn save_to_string(world: &World) -> String {
        let mut bytes = Vec::new();
        world.save(&mut bytes).expect("writing to memory succeeds");
        String::from_utf8(bytes).expect("map files are utf-8")
    }

    fn format_error(result: Result<World, LoadError>) -> FormatError {
        match result {
            Err(LoadError::Format(error)) => error,
            Ok(_) => panic!("expected a format error, map loaded"),
            Err(other) => panic!("expected a format error, got {other}"),
        }
    }

    #[test]
    fn documented_sample_loads() {
        let world = load(SAMPLE).expect("sample is well formed");

        let builder = query::builder(&world);
        assert_eq!(builder.name(), "Bob");
        assert_eq!(
            builder.inventory(),
            [Block::Wood, Block::Wood, Block::Wood, Block::Soil]
        );
        assert_eq!(builder.current_tile(), TileId::new(0));
        assert_eq!(query::start_position(&world), Position::new(1, 2));
        assert_eq!(query::tile_count(&world), 4);

        let north = query::tile(&world, TileId::new(1)).expect("tile 1 exists");
        assert_eq!(north.blocks(), [Block::Grass, Block::Grass, Block::Soil]);
        assert_eq!(north.exit(Direction::South), Some(TileId::new(0)));
        assert_eq!(
            query::tile_at(&world, Position::new(1, 1)),
            Some(TileId::new(1))
        );
    }

    #[test]
    fn save_emits_the_canonical_form() {
        let world = load(SAMPLE).expect("sample is well formed");
        assert_eq!(save_to_string(&world), SAMPLE_CANONICAL);
    }

    #[test]
    fn second_save_is_byte_idempotent() {
        let first = save_to_string(&load(SAMPLE).expect("sample is well formed"));
        let second = save_to_string(&load(&first).expect("own output reloads"));
        assert_eq!(first, second);
    }

    #[test]
    fn file_without_trailing_newline_loads() {
        let trimmed = SAMPLE.trim_end_matches('\n');
        let world = load(trimmed).expect("single missing newline is fine");
        assert_eq!(query::tile_count(&world), 4);
    }

    #[test]
    fn trailing_blank_line_is_rejected() {
        let padded = format!("{SAMPLE}\n");
        let error = format_error(load(&padded));
        assert_eq!(error.line(), Some(17));
        assert_eq!(error.message(), "unexpected content after the exit entries");
    }

    #[test]
    fn save_renumbers_to_layout_order() {
        // declared order puts the north neighbour last, but the walk visits
        // north before east, so ids 1 and 2 swap on save
        let scrambled = "0\n\
            0\n\
            Bob\n\
            \n\
            \n\
            total:3\n\
            0 soil,soil,grass\n\
            1 soil\n\
            2 stone\n\
            \n\
            exits\n\
            0 east:1,north:2\n\
            1 \n\
            2 \n";
        let world = load(scrambled).expect("scrambled map is consistent");
        let saved = save_to_string(&world);
        let expected = "0\n\
            0\n\
            Bob\n\
            \n\
            \n\
            total:3\n\
            0 soil,soil,grass\n\
            1 stone\n\
            2 soil\n\
            \n\
            exits\n\
            0 north:1,east:2\n\
            1 \n\
            2 \n";
        assert_eq!(saved, expected);
    }

    #[test]
    fn empty_inventory_and_empty_tiles_round_trip() {
        let map = "0\n\
            0\n\
            Sam\n\
            \n\
            \n\
            total:2\n\
            0 \n\
            1 \n\
            \n\
            exits\n\
            0 south:1\n\
            1 \n";
        let world = load(map).expect("empty stacks are legal");
        assert!(query::builder(&world).inventory().is_empty());
        assert_eq!(
            query::tile(&world, TileId::new(0)).expect("tile 0").block_count(),
            0
        );
        assert_eq!(save_to_string(&world), map);
    }

    #[test]
    fn unreachable_tiles_are_dropped_on_save() {
        let map = "0\n\
            0\n\
            Sam\n\
            \n\
            \n\
            total:2\n\
            0 soil\n\
            1 stone\n\
            \n\
            exits\n\
            0 \n\
            1 \n";
        let world = load(map).expect("disconnected tiles still load");
        assert_eq!(query::tile_count(&world), 1);
        let saved = save_to_string(&world);
        assert!(saved.contains("total:1\n"));
        assert!(!saved.contains("stone"));
    }

    #[test]
    fn non_integer_start_coordinate_is_reported_on_line_one() {
        let error = format_error(load("one\n2\nBob\n\n\ntotal:1\n0 \n\nexits\n0 \n"));
        assert_eq!(error.line(), Some(1));
        assert_eq!(error.message(), "starting x is not a valid integer");
    }

    #[test]
    fn missing_blank_line_after_inventory_is_rejected() {
        let error = format_error(load("1\n2\nBob\nwood\ntotal:1\n0 \n\nexits\n0 \n"));
        assert_eq!(error.line(), Some(5));
        assert_eq!(error.message(), "expected a blank line after the inventory");
    }

    #[test]
    fn malformed_total_lines_are_rejected() {
        let missing_colon = format_error(load("1\n2\nBob\n\n\ntotal 1\n"));
        assert_eq!(missing_colon.message(), "tile total line is missing a colon");

        let wrong_keyword = format_error(load("1\n2\nBob\n\n\ncount:1\n"));
        assert_eq!(
            wrong_keyword.message(),
            "tile total line must start with 'total'"
        );

        let negative = format_error(load("1\n2\nBob\n\n\ntotal:-1\n"));
        assert_eq!(negative.message(), "tile total is negative");

        let word = format_error(load("1\n2\nBob\n\n\ntotal:many\n"));
        assert_eq!(word.message(), "tile total is not a valid integer");
    }

    #[test]
    fn zero_tile_maps_are_rejected() {
        let error = format_error(load("1\n2\nBob\n\n\ntotal:0\n\nexits\n"));
        assert_eq!(error.line(), Some(6));
        assert_eq!(error.message(), "map declares no tiles");
    }

    #[test]
    fn unknown_block_names_are_rejected() {
        let in_inventory = format_error(load("1\n2\nBob\nlava\n"));
        assert_eq!(in_inventory.line(), Some(4));
        assert_eq!(in_inventory.message(), "unknown block name 'lava'");

        let on_tile = format_error(load("1\n2\nBob\n\n\ntotal:1\n0 obsidian\n"));
        assert_eq!(on_tile.line(), Some(7));
        assert_eq!(on_tile.message(), "unknown block name 'obsidian'");
    }

    #[test]
    fn tile_ids_are_bounds_checked() {
        let too_high = format_error(load("1\n2\nBob\n\n\ntotal:1\n1 soil\n"));
        assert_eq!(too_high.message(), "tile id is out of range");

        let negative = format_error(load("1\n2\nBob\n\n\ntotal:1\n-1 soil\n"));
        assert_eq!(negative.message(), "tile id is negative");

        let word = format_error(load("1\n2\nBob\n\n\ntotal:1\nzero soil\n"));
        assert_eq!(word.message(), "tile id is not a valid integer");
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let tiles = format_error(load(
            "1\n2\nBob\n\n\ntotal:2\n0 soil\n0 soil\n\nexits\n0 \n1 \n",
        ));
        assert_eq!(tiles.line(), Some(8));
        assert_eq!(tiles.message(), "duplicate tile entry for id 0");

        let exits = format_error(load(
            "1\n2\nBob\n\n\ntotal:2\n0 soil\n1 soil\n\nexits\n0 \n0 \n",
        ));
        assert_eq!(exits.line(), Some(12));
        assert_eq!(exits.message(), "duplicate exit entry for id 0");
    }

    #[test]
    fn extra_tokens_on_entry_lines_are_rejected() {
        let error = format_error(load("1\n2\nBob\n\n\ntotal:1\n0 soil extra\n"));
        assert_eq!(error.message(), "tile entry has too many spaces");
    }

    #[test]
    fn overfull_tile_stacks_are_format_errors() {
        let nine = ["soil"; 9].join(",");
        let error = format_error(load(&format!("1\n2\nBob\n\n\ntotal:1\n0 {nine}\n")));
        assert_eq!(error.message(), "tile blocks violate the stack limits");

        let lifted_ground =
            format_error(load("1\n2\nBob\n\n\ntotal:1\n0 wood,wood,wood,grass\n"));
        assert_eq!(lifted_ground.message(), "tile blocks violate the stack limits");
    }

    #[test]
    fn uncarryable_inventory_is_a_format_error() {
        let error = format_error(load("1\n2\nBob\ngrass\n\ntotal:1\n0 \n\nexits\n0 \n"));
        assert_eq!(error.line(), None);
        assert_eq!(
            error.message(),
            "the starting inventory contains a block that cannot be carried"
        );
    }

    #[test]
    fn exits_section_is_validated() {
        let missing_header = format_error(load("1\n2\nBob\n\n\ntotal:1\n0 \n\ndoors\n0 \n"));
        assert_eq!(missing_header.message(), "expected the 'exits' header");

        let bad_name = format_error(load("1\n2\nBob\n\n\ntotal:1\n0 \n\nexits\n0 up:0\n"));
        assert_eq!(bad_name.line(), Some(10));
        assert_eq!(bad_name.message(), "unknown exit name 'up'");

        let bad_target = format_error(load("1\n2\nBob\n\n\ntotal:1\n0 \n\nexits\n0 north:9\n"));
        assert_eq!(bad_target.message(), "exit target is out of range");

        let missing_colon = format_error(load("1\n2\nBob\n\n\ntotal:1\n0 \n\nexits\n0 north\n"));
        assert_eq!(missing_colon.message(), "exit is missing a colon");
    }

    #[test]
    fn abrupt_end_of_file_is_reported() {
        let error = format_error(load("1\n2\nBob\n\n\ntotal:2\n0 soil\n"));
        assert_eq!(error.line(), Some(7));
        assert_eq!(error.message(), "missing tile entry under 'total'");
    }

    #[test]
    fn inconsistent_exit_graph_is_not_a_format_error() {
        // tile 1 sits north of tile 0 yet claims tile 0 is also to its north
        let map = "0\n\
            0\n\
            Bob\n\
            \n\
            \n\
            total:2\n\
            0 soil,soil,grass\n\
            1 soil,soil,grass\n\
            \n\
            exits\n\
            0 north:1\n\
            1 north:0\n";
        match load(map) {
            Err(LoadError::Inconsistent(_)) => {}
            other => panic!("expected an inconsistency error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_distinct_condition() {
        let result = World::load_file("/nonexistent/blockwork-no-such-map.txt");
        match result {
            Err(LoadError::FileNotFound { path }) => {
                assert!(path.contains("blockwork-no-such-map"));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }
}
