use anyhow::Result;
use clap::Parser;

mod cli;

use cli::{Cli, Commands};
use phobos_bindings::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // A broken config file must not prevent `config init`/`config path`
    let config = Config::load(cli.config.as_deref());

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    match cli.command {
        Commands::Run(args) => cli::run::run(args, config?, cli.verbose).await,
        Commands::Emit(args) => cli::emit::run(args, config?).await,
        Commands::Merge(args) => cli::merge::run(args, config?).await,
        Commands::Config(args) => cli::config::run(args, cli.config.as_deref()).await,
    }
}
