use anyhow::Result;
use bundleguard_cli::cli::{self, Cli};
use bundleguard_cli::logger;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logging(cli.json_logs);
    cli::run(cli)
}
