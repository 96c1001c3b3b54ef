use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;

use cli::command::Cli;

mod cli;
mod input;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let multi = MultiProgress::new();

    cli::logging::init(&cli, &multi)?;
    cli::run(&cli, &multi)
}
