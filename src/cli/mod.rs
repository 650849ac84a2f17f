//! CLI layer for the research core.
//!
//! Provides the command-line interface using clap: `init`/`status`/`prune`
//! manage the page cache, `search` is a one-shot consensus search, and
//! `research` drives the full router/planner/executor pipeline.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
