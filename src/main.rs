use clap::Parser;
use std::path::Path;
use updown_hedge::cli::{Cli, Commands, DEFAULT_CONFIG_PATH};
use updown_hedge::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)?,
        None => Config::default(),
    };

    // Initialize telemetry
    let _telemetry = updown_hedge::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Hedge(args) => {
            tracing::info!("Starting hedge batch");
            args.execute(&config).await?;
        }
        Commands::Watch(args) => {
            args.execute(&config).await?;
        }
        Commands::SafeAddress(args) => {
            args.execute()?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            println!(
                "# builder credentials: {}",
                if config.builder.is_some() { "configured" } else { "not set" }
            );
        }
    }

    Ok(())
}
