//! mccv - Main Entry Point

use clap::Parser;
use mccv::cli::{cmd_models, cmd_run, cmd_simulate, cmd_summarize, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mccv=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(args)?,
        Commands::Summarize { results } => cmd_summarize(&results)?,
        Commands::Simulate { rows, noise, seed, output } => cmd_simulate(rows, noise, seed, &output)?,
        Commands::Models => cmd_models()?,
    }

    Ok(())
}
