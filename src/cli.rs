use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// xish - a small line-oriented command interpreter
#[derive(Debug, Parser)]
#[command(name = "xish", version, about)]
pub struct Cli {
    /// Increase tracing on stderr (-v echoes commands, -vv traces pipes and expansion)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Script files to run in order; reads stdin when none are given
    pub scripts: Vec<PathBuf>,
}
