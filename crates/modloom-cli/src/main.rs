//! modloom - mod loader CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use modloom_cli::cmd;
use modloom_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Resolve {
            manifest,
            host_modules,
            no_libraries,
            no_mods,
        } => {
            let complete = cmd::resolve::resolve(
                config,
                &manifest,
                host_modules.as_deref(),
                cmd::resolve::ResolveOptions {
                    no_libraries,
                    no_mods,
                    verbose: cli.verbose,
                },
            )
            .await?;
            if !complete {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Sources => cmd::sources::sources(config).await,
        Commands::Targets { host } => cmd::targets::targets(config, host.as_deref()).await,
    }
}
