use crate::checkout::GitCheckout;
use crate::cli::{Cli, Commands};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod bump;
mod checkout;
mod cli;
mod config;
mod document;
mod editor;
mod error;
mod image_reference;
mod kind;
mod secret_string;
mod selector;
mod walker;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!("Starting bumpversion {}", env!("CARGO_PKG_VERSION"));

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Git(args) => {
            let config = args.into_config()?;
            config.validate_git()?;
            let checkout = GitCheckout::clone(&config.git)?;
            bump::run(&checkout, &config)?;
        }
        Commands::Local(args) => {
            let config = args.into_config()?;
            config.validate()?;
            bump::run_local(&config)?;
        }
    }
    Ok(())
}
