use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "seal",
    about = "Compute, persist, verify, and index cryptographic seals of directory trees.",
    version
)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv). Overridden by RUST_LOG if set.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Produce or update manifests for one or more directory trees.
    Seal {
        /// Directories to seal.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Progress print interval (e.g. 500ms, 2s).
        #[arg(short = 'i', long)]
        interval: Option<String>,
    },

    /// Two-pass verify; exits non-zero if any diff is non-identical.
    Verify {
        /// Directories to verify.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only verify directories under these relative prefixes.
        #[arg(short = 'p', long = "prefix")]
        prefixes: Vec<String>,

        /// Only consider directories sealed at or before this instant
        /// (YYYY-MM-DD[THH:MM[:SS]], local time zone).
        #[arg(short = 'b', long = "before")]
        before: Option<String>,

        /// Emit machine-readable JSON instead of human-readable lines.
        #[arg(long)]
        json: bool,
    },

    /// Build a content-addressed index of a sealed tree.
    Index {
        /// Directory whose sealed tree should be indexed.
        path: PathBuf,

        /// Index file path.
        #[arg(short = 'f', long = "file", required = true)]
        file: PathBuf,

        /// Storage backend: "sqlite", "redb", or "sled".
        #[arg(long, default_value = "sqlite")]
        backend: String,
    },

    /// Materialize two indices and diff their roots.
    Compare {
        /// First index file.
        index_a: PathBuf,

        /// Second index file.
        index_b: PathBuf,

        /// Storage backend both index files were written with.
        #[arg(long, default_value = "sqlite")]
        backend: String,

        /// Emit machine-readable JSON instead of human-readable lines.
        #[arg(long)]
        json: bool,
    },
}
