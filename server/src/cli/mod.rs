// server/src/cli/mod.rs

// Command-line entry point: argument parsing, configuration overrides and
// the serve/migrate/show-config commands.

pub mod cli;

pub use cli::{start_cli, CliArgs, Commands};
