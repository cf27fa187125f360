use std::sync::Arc;

use anyhow::{Context, Result};
use catalog_client::{CatalogBackend, DocumentSink, HttpCatalogClient};
use clap::{Parser, Subcommand};
use scoring::{compute_derived, ConsequenceLevel, DeficiencyLevel, ExposureLevel};
use shared::protocol::{CatalogQuery, SuggestionRequest};
use storage::{SqliteStateStore, StatePersistence};
use tracing::info;
use wizard::{
    export::build_export, load_settings, prepare_database_url, LogView, Wizard, WizardModel,
    WizardSettings,
};

#[derive(Parser, Debug)]
#[command(about = "GTC-45 hazard matrix wizard tools")]
struct Cli {
    /// Overrides `catalog_url` from wizard.toml / APP__CATALOG_URL.
    #[arg(long)]
    catalog_url: Option<String>,
    /// Overrides `database_url` from wizard.toml / APP__DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scores one hazard from its deficiency, exposure and consequence levels.
    Score {
        deficiency: u32,
        exposure: u32,
        consequence: u32,
    },
    /// Lists the light hazard catalog.
    Catalog {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Asks for hazard category suggestions for a position.
    Suggest {
        position_name: String,
        #[arg(long)]
        sector: Option<String>,
    },
    /// Builds the document export from the saved wizard state.
    Export {
        /// Hands the export to the document service instead of printing it.
        #[arg(long)]
        submit: bool,
    },
    /// Shows where the saved wizard stands.
    Status,
    /// Deletes the saved wizard state.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(catalog_url) = cli.catalog_url {
        settings.catalog_url = catalog_url;
    }
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }

    match cli.command {
        Command::Score {
            deficiency,
            exposure,
            consequence,
        } => {
            let derived = compute_derived(
                Some(DeficiencyLevel::try_from(deficiency)?),
                Some(ExposureLevel::try_from(exposure)?),
                Some(ConsequenceLevel::try_from(consequence)?),
            );
            let probability_band = derived.probability_band();
            let risk_band = derived.risk_band();
            println!(
                "probability={} ({})",
                derived.probability.unwrap_or_default(),
                probability_band.label()
            );
            println!(
                "risk={} ({} {}): {}",
                derived.risk.unwrap_or_default(),
                risk_band.roman(),
                risk_band.label(),
                risk_band.acceptability()
            );
        }
        Command::Catalog { search, limit } => {
            let client = HttpCatalogClient::new(&settings.catalog_url)?;
            let hazards = client
                .list_hazards(&CatalogQuery {
                    search,
                    limit: limit.or(Some(settings.catalog_limit)),
                })
                .await?;
            for hazard in &hazards {
                let marker = if hazard.is_common { "*" } else { " " };
                println!(
                    "{marker} {:>5}  [{}] {}",
                    hazard.id.0, hazard.category_id.0, hazard.name
                );
            }
            info!(count = hazards.len(), "catalog listed");
        }
        Command::Suggest {
            position_name,
            sector,
        } => {
            let client = HttpCatalogClient::new(&settings.catalog_url)?;
            let mut suggestions = client
                .suggest_hazards(&SuggestionRequest {
                    position_name,
                    sector,
                })
                .await?;
            suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            for suggestion in suggestions {
                println!(
                    "{:>4.0}%  {}{}",
                    suggestion.confidence * 100.0,
                    suggestion.category_name,
                    suggestion
                        .rationale
                        .map(|rationale| format!(" ({rationale})"))
                        .unwrap_or_default()
                );
            }
        }
        Command::Export { submit } => {
            let persistence = open_persistence(&settings).await?;
            let model: WizardModel = persistence
                .load()
                .await?
                .context("no saved wizard state to export")?;
            let export = build_export(&model, chrono::Utc::now());
            if submit {
                let client = HttpCatalogClient::new(&settings.catalog_url)?;
                let receipt = client.submit(&export).await?;
                println!("submitted document_id={}", receipt.document_id);
                if let Some(url) = receipt.download_url {
                    println!("download_url={url}");
                }
            } else {
                println!("{}", serde_json::to_string_pretty(&export)?);
            }
        }
        Command::Status => {
            let persistence = open_persistence(&settings).await?;
            let client = Arc::new(HttpCatalogClient::new(&settings.catalog_url)?);
            let mut wizard = Wizard::builder(settings)
                .view(LogView)
                .backend(client.clone())
                .sink(client)
                .persistence(persistence)
                .build()?;
            if !wizard.resume().await? {
                wizard.start();
            }
            let progress = wizard.progress();
            println!(
                "step {}/{} ({}), positions={}, assessed {}/{} hazards ({}%)",
                progress.step_index + 1,
                progress.step_count,
                wizard.current_step().title(),
                progress.positions,
                progress.assessed_hazards,
                progress.assigned_hazards,
                progress.completion_percent
            );
        }
        Command::Clear => {
            let persistence = open_persistence(&settings).await?;
            persistence.clear().await?;
            println!("cleared saved state '{}'", persistence.key());
        }
    }

    Ok(())
}

async fn open_persistence(settings: &WizardSettings) -> Result<StatePersistence> {
    let database_url = prepare_database_url(&settings.database_url)?;
    let store = SqliteStateStore::new(&database_url).await?;
    store.health_check().await?;
    Ok(StatePersistence::new(
        Arc::new(store),
        settings.storage_key.clone(),
        settings.state_max_age(),
    ))
}
