//! CLI module for Symscope
//!
//! Provides command-line interface using clap derive macros.

pub mod commands;
pub mod location;
pub mod output;
pub mod response;

pub use location::ParsedLocation;
pub use output::OutputContext;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    config::ConfigArgs, refs::RefsArgs, rename::RenameArgs, status::StatusArgs,
};

const LONG_ABOUT: &str = r#"
Symscope - cross-project symbol references and safe rename

Symscope resolves the identifier at a position, finds every use of the same
symbol in the projects that can see it, and renames all of them at once.

QUICK START:
  1. Describe the solution:   symscope.toml with [[project]] tables
  2. Find references:         symscope refs core/a.ml:3:5
  3. Preview a rename:        symscope rename core/a.ml:3:5 total --dry-run
  4. Apply it:                symscope rename core/a.ml:3:5 total

Positions are file:line[:column], 1-indexed.
"#;

/// Symscope - cross-project symbol references and safe rename
#[derive(Parser, Debug)]
#[command(name = "symscope")]
#[command(author, version, about, long_about = LONG_ABOUT)]
#[command(propagate_version = true)]
#[command(after_help = "Use 'symscope <COMMAND> --help' for more information about a command.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Solution manifest
    #[arg(long, global = true, env = "SYMSCOPE_SOLUTION", default_value = "symscope.toml")]
    pub solution: PathBuf,

    /// Verbose output (show debug info)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find all uses of the symbol at a position
    Refs(RefsArgs),

    /// Rename a symbol across every project that can see it
    Rename(RenameArgs),

    /// Show solution status
    Status(StatusArgs),

    /// Configuration management
    Config(ConfigArgs),
}
