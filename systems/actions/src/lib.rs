#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Action system that drives a block world from a line-oriented stream.
//!
//! Each line of the stream is one action: a primary keyword plus, for all but
//! `DIG`, a payload token. Parsing checks only the line structure; payload
//! validity is judged during interpretation, where every rejected action
//! turns into a single report line and processing moves on. Only structural
//! violations — too many tokens, or an unrecognised keyword — abort the
//! stream.

use std::io::BufRead;

use blockwork_core::{Direction, WorldError};
use blockwork_world::{query, World};
use thiserror::Error;

/// Report line emitted whenever an action's payload cannot be interpreted.
const INVALID_ACTION: &str = "Error: Invalid action";

/// A single parsed action awaiting interpretation.
///
/// Payloads are carried verbatim from the stream; a nonsense direction or a
/// non-numeric drop index still parses and is rejected later, during
/// interpretation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Move the builder through the exit named by the payload.
    MoveBuilder {
        /// Raw direction token.
        direction: String,
    },
    /// Move the top block of the builder's tile through the named exit.
    MoveBlock {
        /// Raw direction token.
        direction: String,
    },
    /// Dig the top block of the builder's current tile.
    Dig,
    /// Drop an inventory block onto the builder's current tile.
    Drop {
        /// Raw inventory-index token.
        index: String,
    },
}

/// A structural violation in the action stream.
///
/// Unlike a rejected payload, this aborts the whole stream.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ActionFormatError {
    message: String,
}

impl ActionFormatError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Description of the structural violation.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Reads one action line from the stream.
///
/// Returns `Ok(None)` at end of input. A line with more than two tokens, or
/// whose keyword/token-count combination matches no action, is a structural
/// error.
pub fn read_action(reader: &mut impl BufRead) -> Result<Option<Action>, ActionFormatError> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line).map_err(|error| {
        ActionFormatError::new(format!("could not read the action source: {error}"))
    })?;
    if bytes == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        let _ = line.pop();
        if line.ends_with('\r') {
            let _ = line.pop();
        }
    }

    let tokens: Vec<&str> = line.splitn(3, ' ').collect();
    let action = match tokens.as_slice() {
        [_, _, _] => return Err(ActionFormatError::new("too many tokens on action line")),
        ["DIG"] => Action::Dig,
        ["MOVE_BUILDER", payload] => Action::MoveBuilder {
            direction: (*payload).to_owned(),
        },
        ["MOVE_BLOCK", payload] => Action::MoveBlock {
            direction: (*payload).to_owned(),
        },
        ["DROP", payload] => Action::Drop {
            index: (*payload).to_owned(),
        },
        _ => return Err(ActionFormatError::new("unrecognised action")),
    };
    Ok(Some(action))
}

/// Interprets one action against the world and returns its report line.
///
/// Domain failures never escape: they become their report line and the world
/// is left exactly as the failed operation defines.
#[must_use]
pub fn process_action(world: &mut World, action: &Action) -> String {
    match action {
        Action::Dig => report(
            world.dig_on_current_tile().map(|_| ()),
            "Top block on current tile removed",
        ),
        Action::Drop { index } => {
            let Ok(value) = index.parse::<i64>() else {
                return INVALID_ACTION.to_owned();
            };
            // negative indexes reach the domain check, like any other bad slot
            let result = match usize::try_from(value) {
                Ok(slot) => world.drop_from_inventory(slot),
                Err(_) => Err(WorldError::InvalidBlock),
            };
            report(result, "Dropped a block from inventory")
        }
        Action::MoveBlock { direction } => {
            let Some(direction) = Direction::from_name(direction) else {
                return INVALID_ACTION.to_owned();
            };
            let from = query::builder(world).current_tile();
            report(
                world.move_block(from, direction),
                &format!("Moved block {direction}"),
            )
        }
        Action::MoveBuilder { direction } => {
            let Some(direction) = Direction::from_name(direction) else {
                return INVALID_ACTION.to_owned();
            };
            report(
                world.move_builder(direction),
                &format!("Moved builder {direction}"),
            )
        }
    }
}

/// Parses and interprets actions until the stream is exhausted.
///
/// Each action is interpreted as soon as it is read and its report line is
/// handed to `report_line`, so an interactive source sees output
/// immediately. A structural error aborts the remainder of the stream.
pub fn process_actions(
    reader: &mut impl BufRead,
    world: &mut World,
    mut report_line: impl FnMut(&str),
) -> Result<(), ActionFormatError> {
    while let Some(action) = read_action(reader)? {
        let outcome = process_action(world, &action);
        report_line(&outcome);
    }
    Ok(())
}

fn report(result: Result<(), WorldError>, success: &str) -> String {
    match result {
        Ok(()) => success.to_owned(),
        Err(WorldError::NoExit) => "No exit this way".to_owned(),
        Err(WorldError::TooHigh) => "Too high".to_owned(),
        Err(WorldError::TooLow) => "Too low".to_owned(),
        Err(WorldError::InvalidBlock) => "Cannot use that block".to_owned(),
    }
}
