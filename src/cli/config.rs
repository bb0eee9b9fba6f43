use anyhow::Result;
use clap::{Args, Subcommand};

use phobos_bindings::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Output format: toml (default) or json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Show config file path
    Path,

    /// Initialize default config file
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(args: ConfigArgs, explicit: Option<&str>) -> Result<()> {
    match args.command {
        ConfigCommands::Show { format } => show_config(explicit, &format),
        ConfigCommands::Path => show_path(explicit),
        ConfigCommands::Init { force } => init_config(explicit, force),
    }
}

fn show_config(explicit: Option<&str>, format: &str) -> Result<()> {
    let config = Config::load(explicit)?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        _ => {
            println!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn show_path(explicit: Option<&str>) -> Result<()> {
    let path = Config::config_path(explicit)?;
    println!("{}", path.display());
    Ok(())
}

fn init_config(explicit: Option<&str>, force: bool) -> Result<()> {
    let path = Config::config_path(explicit)?;

    if !Config::write_template(&path, force)? {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    println!("Created config file at {}", path.display());
    Ok(())
}
