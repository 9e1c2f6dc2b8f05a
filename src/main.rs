mod backend;
mod cli;
mod climatology;
mod config;
mod error;
mod export;
mod expr;
mod geometry;
mod geotiff;
mod legend;
mod logging;
mod parquet;
mod pipeline;
mod raster;
mod region;
mod render;
mod season;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Run { backend, overrides } => {
            match command::run(config, backend, overrides).await {
                Ok(destination) => println!("Climatology exported to `{}`", destination),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
        Commands::Plan { backend, overrides } => {
            match command::plan(config, backend, overrides).await {
                Ok(expression) => println!("{}", expression),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
        Commands::Legend {} => match command::legend(config) {
            Ok(legend) => print!("{}", legend),
            Err(e) => eprintln!("Error: {}", e),
        },
    }

    Ok(())
}
