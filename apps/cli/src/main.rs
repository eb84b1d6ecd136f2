//! keypearls CLI: runs the pearl pipeline over a directory of key and
//! immobilizer notes and reports per-stage summaries.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
