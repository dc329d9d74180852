use clap::Parser;
use tickwarden::cli::{self, CheckCommand, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Run(args) => cli::run::execute(args).await?,
        Commands::Check(CheckCommand::Config(arg)) => cli::check::execute_config(&arg.config)?,
        Commands::Stage(args) => cli::stage::execute(args)?,
    }
    Ok(())
}
