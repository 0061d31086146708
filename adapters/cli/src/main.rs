#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives a block world through an action stream.
//!
//! The pipeline is load → process actions → save, and each stage that can
//! fail maps to its own exit code so scripts can tell the stages apart.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process::ExitCode;

use anyhow::Context;
use blockwork_system_actions as actions;
use blockwork_world::World;
use clap::Parser;

/// Accepted in place of an action path to read actions from standard input.
const STDIN_SENTINEL: &str = "-";

const EXIT_USAGE: u8 = 1;
const EXIT_MAP_LOAD: u8 = 2;
const EXIT_ACTION_SOURCE: u8 = 3;
const EXIT_ACTION_FORMAT: u8 = 4;
const EXIT_SAVE: u8 = 5;

/// Applies an action stream to a block world map.
#[derive(Debug, Parser)]
#[command(name = "blockwork", version)]
struct Cli {
    /// World map to load.
    input_map: String,
    /// Action stream to apply, or `-` to read actions from standard input.
    actions: String,
    /// Path the resulting world map is written to.
    output_map: String,
}

/// Entry point for the Blockwork command-line interface.
fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let code = if error.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = error.print();
            return ExitCode::from(code);
        }
    };

    let mut world = match World::load_file(&cli.input_map) {
        Ok(world) => world,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::from(EXIT_MAP_LOAD);
        }
    };

    let mut reader: Box<dyn BufRead> = if cli.actions == STDIN_SENTINEL {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let opened = File::open(&cli.actions)
            .with_context(|| format!("cannot open action source '{}'", cli.actions));
        match opened {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(error) => {
                eprintln!("{error:#}");
                return ExitCode::from(EXIT_ACTION_SOURCE);
            }
        }
    };

    let processed = actions::process_actions(&mut reader, &mut world, |line| println!("{line}"));
    if let Err(error) = processed {
        eprintln!("{error}");
        return ExitCode::from(EXIT_ACTION_FORMAT);
    }

    let saved = world
        .save_file(&cli.output_map)
        .with_context(|| format!("cannot save world map to '{}'", cli.output_map));
    match saved {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::from(EXIT_SAVE)
        }
    }
}
