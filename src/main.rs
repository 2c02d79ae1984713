use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use solar_sizer::{
    config::Config,
    domain::{BillRecord, EquipmentCatalogItem},
    load_profile::LoadProfileBuilder,
    repo::Repositories,
    sizing::{SizingEngine, SizingRequest},
    tariff::StaticTariffLookup,
    telemetry::init_tracing,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "solar-sizer")]
#[command(author, version, about = "Size solar, battery and inverter systems from bill history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an annualized load profile from a JSON array of bill records
    Profile {
        #[arg(long)]
        bills: PathBuf,
    },

    /// Run a full sizing and print the recommendation
    Size {
        /// JSON sizing request
        #[arg(long)]
        request: PathBuf,
        /// JSON array of equipment catalog items
        #[arg(long)]
        catalog: PathBuf,
        /// JSON array of tariffs used for lookup by utility name
        #[arg(long)]
        tariffs: Option<PathBuf>,
    },
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load()?;

    match cli.command {
        Commands::Profile { bills } => {
            let bills: Vec<BillRecord> = read_json(&bills).await?;
            let profile = LoadProfileBuilder::default().build(&bills)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::Size {
            request,
            catalog,
            tariffs,
        } => {
            let request: SizingRequest = read_json(&request).await?;
            let catalog: Vec<EquipmentCatalogItem> = read_json(&catalog).await?;
            let tariffs = match tariffs {
                Some(path) => StaticTariffLookup::from_json_file(path).await?,
                None => StaticTariffLookup::default(),
            };

            let repos = Repositories::new(&cfg, catalog).await?;
            let engine = SizingEngine::from_config(&cfg, &repos, Arc::new(tariffs))?;
            let recommendation = engine.size(&request).await?;
            info!(recommendation_id = %recommendation.id, "sizing complete");
            println!("{}", serde_json::to_string_pretty(&recommendation)?);
        }
    }

    Ok(())
}
