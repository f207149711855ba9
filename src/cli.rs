//! CLI surface for relayd-install.

use clap::Parser;

/// Command-line arguments.
///
/// The installer takes no flags or subcommands; behavior is controlled
/// entirely through `RELAYD_*` environment overrides.
#[derive(Parser, Debug)]
#[command(name = "relayd-install")]
#[command(version, about = "Install the relayd server as a systemd service")]
pub struct Cli {}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
