//! Command-line argument parsing for the research core.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Clawdia's research core: query planning, multi-provider search consensus,
/// and a content-addressed page cache, driven from the command line.
#[derive(Parser, Debug)]
#[command(name = "clawdia-research")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the page cache database. Defaults to `RESEARCH_DB_PATH` or
    /// the built-in default.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format: `text`, `json`, or `ndjson`.
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolves the effective page cache path: `--db-path`, then
    /// `RESEARCH_DB_PATH`, then the built-in default.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            std::env::var("RESEARCH_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(crate::research::DEFAULT_DB_PATH))
        })
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the page cache database, installing its schema.
    Init {
        /// Overwrite an existing database file.
        #[arg(short, long)]
        force: bool,
    },

    /// Show page cache occupancy and freshness.
    Status,

    /// Delete cached pages and search records older than a horizon.
    Prune {
        /// Prune horizon in days. Defaults to the settings' `prune_days`.
        #[arg(long)]
        days: Option<i64>,
    },

    /// Run a one-shot consensus search across the configured backends.
    Search {
        /// The search query.
        query: String,
    },

    /// Route, plan, and execute a full research pass for a prompt.
    Research {
        /// The user's research goal, in their own words.
        prompt: String,

        /// A success criterion the final answer must satisfy. May be
        /// repeated; defaults to the prompt itself when omitted.
        #[arg(long = "criterion")]
        criteria: Vec<String>,

        /// Caps the number of planned actions below the planner's default.
        #[arg(long)]
        max_actions: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_research() {
        let cli = Cli::parse_from(["clawdia-research", "research", "best pesto recipe"]);
        match cli.command {
            Commands::Research { prompt, .. } => assert_eq!(prompt, "best pesto recipe"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_search_with_global_flags() {
        let cli = Cli::parse_from(["clawdia-research", "--format", "json", "-v", "search", "rust async runtimes"]);
        assert_eq!(cli.format, "json");
        assert!(cli.verbose);
        match cli.command {
            Commands::Search { query } => assert_eq!(query, "rust async runtimes"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_default_db_path_uses_builtin_default() {
        let cli = Cli::parse_from(["clawdia-research", "status"]);
        assert!(cli.db_path.is_none());
    }

    #[test]
    fn test_custom_db_path() {
        let cli = Cli::parse_from(["clawdia-research", "--db-path", "/tmp/custom.db", "status"]);
        assert_eq!(cli.get_db_path(), PathBuf::from("/tmp/custom.db"));
    }

    #[test]
    fn test_research_accepts_repeated_criteria() {
        let cli = Cli::parse_from([
            "clawdia-research",
            "research",
            "evaluate rustls vs openssl",
            "--criterion",
            "performance",
            "--criterion",
            "maintenance status",
        ]);
        match cli.command {
            Commands::Research { criteria, .. } => {
                assert_eq!(criteria, vec!["performance".to_string(), "maintenance status".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
