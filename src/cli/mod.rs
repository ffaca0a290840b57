//! Command-line surface: argument parsing and process exit codes. The
//! library itself never parses argv; `main.rs` is the only caller of
//! `Cli::parse`.

pub mod args;
pub mod exit;

pub use args::{Cli, Command};
pub use exit::ExitCode;
