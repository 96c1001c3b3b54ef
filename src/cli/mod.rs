use anyhow::Result;
use indicatif::MultiProgress;

use command::{Cli, Commands};

pub mod command;
pub mod decode;
pub mod logging;
pub mod progress;
pub mod replay;
pub mod report;

/// Runs the selected subcommand. Progress bars are drawn on `multi` when
/// `--progress` is set.
pub fn run(cli: &Cli, multi: &MultiProgress) -> Result<()> {
    let multi = cli.progress.then_some(multi);

    match &cli.command {
        Commands::Replay(args) => replay::cmd_replay(args, cli, multi),
        Commands::Decode(args) => decode::cmd_decode(args, cli, multi),
    }
}
