//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `muse-radio` binary.
//!
//! ## Commands
//!
//! - `train`: learn embeddings from the session log and persist them
//! - `recommend`: ranked recommendations for a seed track
//! - `user`: popularity baseline for a user
//! - `queue`: simulate an auto-filling queue from a seed track
//! - `serve`: HTTP API
//! - `completion`: shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! muse-radio train --epochs 30
//! muse-radio recommend track_001 --limit 5
//! muse-radio queue track_001 --plays 12
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "muse-radio")]
#[command(about = "Muse Radio: learned track recommendations & a self-filling playback queue")]
#[command(version)]
pub struct Args {
    /// Configuration file (defaults to config.json in the data directory)
    #[arg(long, global = true, env = "MUSE_RADIO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Track catalog JSON, overriding the configured path
    #[arg(long, global = true, env = "MUSE_RADIO_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Listening sessions JSON, overriding the configured path
    #[arg(long, global = true, env = "MUSE_RADIO_SESSIONS")]
    pub sessions: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train track embeddings from the session log
    ///
    /// Runs a full training pass unless `--incremental` is given, in which
    /// case stored embeddings are loaded first and only updated.
    Train {
        /// Epochs to run (overrides the configured value)
        #[arg(long)]
        epochs: Option<usize>,

        /// Seed for reproducible initialization
        #[arg(long)]
        seed: Option<u64>,

        /// Update stored embeddings instead of training from scratch
        #[arg(long)]
        incremental: bool,
    },

    /// Recommend tracks similar to a seed track
    Recommend {
        /// Catalog id of the seed track
        #[arg(value_hint = clap::ValueHint::Other)]
        track: String,

        /// Number of recommendations
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Print the JSON response instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Popularity-based recommendations for a user
    User {
        user_id: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Simulate the auto-queue: seed it, then play through it
    ///
    /// Prints every dequeued track and the queue statistics at the end.
    Queue {
        /// Catalog id of the seed track
        #[arg(value_hint = clap::ValueHint::Other)]
        seed: String,

        /// Tracks to play through
        #[arg(long, default_value = "10")]
        plays: usize,
    },

    /// Serve the HTTP API
    Serve {
        /// Port to listen on (overrides the configured value)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate shell completions
    ///
    /// Usage: muse-radio completion bash > ~/.local/share/bash-completion/completions/muse-radio
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List catalog track ids for completion (hidden command)
    #[command(hide = true)]
    CompleteTracks,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_recommend_with_global_flags() {
        let args = Args::try_parse_from([
            "muse-radio",
            "recommend",
            "track_001",
            "--limit",
            "3",
            "--catalog",
            "/tmp/catalog.json",
        ])
        .unwrap();

        assert_eq!(args.catalog, Some(PathBuf::from("/tmp/catalog.json")));
        match args.command {
            Command::Recommend { track, limit, json } => {
                assert_eq!(track, "track_001");
                assert_eq!(limit, 3);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_queue_defaults() {
        let args = Args::try_parse_from(["muse-radio", "queue", "t1"]).unwrap();
        assert!(matches!(args.command, Command::Queue { plays: 10, .. }));
    }
}
