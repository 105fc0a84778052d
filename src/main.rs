use clap::Parser;
use colored::Colorize;
use tracing::info;

use cpi_placement::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    tracing_subscriber::fmt()
        .with_max_level(settings.log_level())
        .with_writer(std::io::stderr)
        .init();
    info!("Starting placement engine");

    if let Err(e) = cli::run(cli, settings) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}
