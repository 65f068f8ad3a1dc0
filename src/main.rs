use clap::{Parser, Subcommand};
use site_mapper::config::AppConfig;
use site_mapper::pipeline;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plot store locations over the neighborhood boundaries
    Stores {
        /// TOML configuration; built-in defaults when omitted
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Save the image without opening a viewer
        #[arg(long)]
        no_display: bool,
    },
    /// Rank neighborhoods and map the top results
    Rank {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("site_mapper=info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Stores { config, no_display } => {
            let mut app_config = AppConfig::load(config.as_deref())?;
            if *no_display {
                app_config.static_map.display = false;
            }

            let summary = pipeline::run_store_map(&app_config)?;
            info!(
                "Drew {} regions and {} store markers",
                summary.regions_drawn, summary.markers_drawn
            );
        }
        Commands::Rank { config } => {
            let app_config = AppConfig::load(config.as_deref())?;
            let ranked = pipeline::run_ranking(&app_config)?;
            info!("Mapped {} neighborhoods", ranked.len());
        }
    }

    Ok(())
}
