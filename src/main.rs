//! kith - local-first relationship tracker storage.

use clap::{CommandFactory, Parser};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kith::cli::{self, Cli, Commands};
use kith::config::Config;
use kith::Error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Initialize logging; RUST_LOG wins over the config file.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kith={}", config.logging.level)));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match args.command {
        None => {
            Cli::command().print_help()?;
            println!();
        }
        Some(Commands::Init) => {
            cli::init::run(&config).await?;
        }
        Some(Commands::Export { output }) => {
            cli::export::run(&config, output.as_deref()).await?;
        }
        Some(Commands::Import { file }) => {
            cli::import::run(&config, &file).await?;
        }
        Some(Commands::Exec { file, strict }) => {
            cli::exec::run(&config, &file, strict).await?;
        }
        Some(Commands::Status) => {
            cli::status::run(&config).await?;
        }
    }

    Ok(())
}
