//! Outrig CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use outrig_config::{
    is_reporter_enabled, load_and_merge, Config, EnvProperties, LayeredProperties, LoggingConfig,
    PropertySource, PRE_STAGE_PLUGINS_KEY, REPORTER_KEY,
};
use outrig_reporters::build_registry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "outrig")]
#[command(about = "Staged enhancement pipeline for gateway outbound calls", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and print the stage plan
    Validate {
        /// Configuration files, later ones override earlier ones
        #[arg(short, long, default_value = "outrig.yaml")]
        config: Vec<PathBuf>,

        /// Print the merged configuration as JSON
        #[arg(long)]
        dump: bool,
    },

    /// Show the effective pipeline switches, environment included
    Flags {
        /// Configuration files, later ones override earlier ones
        #[arg(short, long, default_value = "outrig.yaml")]
        config: Vec<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config, dump } => {
            let config = match load_and_merge(config) {
                Ok(config) => config,
                Err(e) => {
                    init_tracing(&LoggingConfig::default())?;
                    tracing::error!("Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            };
            init_tracing(&config.observability.logging)?;

            let registry = match build_registry(&config) {
                Ok(registry) => registry,
                Err(e) => {
                    tracing::error!("Plugin configuration is invalid: {}", e);
                    std::process::exit(1);
                }
            };

            tracing::info!(plugins = registry.len(), "Configuration is valid");

            println!("{:<8} {:>6}  PLUGIN", "STAGE", "ORDER");
            for metadata in registry.plan() {
                println!("{}", metadata);
            }

            if dump {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }

            Ok(())
        }

        Commands::Flags { config } => {
            let config = load_and_merge(config)
                .context("failed to load configuration")?;
            init_tracing(&config.observability.logging)?;

            let properties = effective_properties(config);

            println!(
                "{} = {:?} (stages {})",
                REPORTER_KEY,
                properties.property(REPORTER_KEY),
                if is_reporter_enabled(&properties) {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!(
                "{} = {:?}",
                PRE_STAGE_PLUGINS_KEY,
                properties.property(PRE_STAGE_PLUGINS_KEY)
            );

            Ok(())
        }

        Commands::Version => {
            println!("Outrig");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

/// Environment first, then the loaded files
fn effective_properties(config: Config) -> LayeredProperties {
    LayeredProperties::new()
        .with(Arc::new(EnvProperties::default()))
        .with(Arc::new(config))
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.level().to_lowercase()))
        .context("invalid log level")?;

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format().eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true),
            )
            .try_init()?;
    }

    Ok(())
}
