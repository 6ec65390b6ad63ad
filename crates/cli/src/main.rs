use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use femcare_core::config::ENV_DATA_DIR;
use femcare_core::constants::fields;
use femcare_core::store::Document;
use femcare_core::{
    DocumentStore, FileDocumentStore, RepairService, DEFAULT_DATA_DIR, PATIENTS_COLLECTION,
    USERS_COLLECTION,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "femcare")]
#[command(about = "FemCare profile store admin CLI")]
struct Cli {
    /// Directory of the file-backed document store
    #[arg(long, env = ENV_DATA_DIR, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every user record
    ListUsers,
    /// Print a user record as JSON
    ShowUser {
        /// Identity id
        id: String,
    },
    /// Print a patient record as JSON
    ShowPatient {
        /// Identity id
        id: String,
    },
    /// Create missing patient records for patient-role users
    Repair,
}

fn text<'a>(doc: &'a Document, field: &str) -> &'a str {
    doc.get(field).and_then(|v| v.as_str()).unwrap_or("")
}

async fn show(store: &dyn DocumentStore, collection: &str, id: &str) -> anyhow::Result<()> {
    match store.get(collection, id).await? {
        Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
        None => println!("No {} record for id: {}", collection, id),
    }
    Ok(())
}

async fn list_users(store: &dyn DocumentStore) -> anyhow::Result<Vec<String>> {
    let mut lines = Vec::new();
    for id in store.list_ids(USERS_COLLECTION).await? {
        if let Some(doc) = store.get(USERS_COLLECTION, &id).await? {
            lines.push(format!(
                "ID: {}, Email: {}, Type: {}",
                id,
                text(&doc, fields::EMAIL),
                text(&doc, fields::USER_TYPE)
            ));
        }
    }
    Ok(lines)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("femcare_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let store: Arc<dyn DocumentStore> = Arc::new(FileDocumentStore::new(&cli.data_dir));

    match cli.command {
        Some(Commands::ListUsers) => {
            let lines = list_users(store.as_ref())
                .await
                .with_context(|| format!("listing users in {}", cli.data_dir.display()))?;
            if lines.is_empty() {
                println!("No users found.");
            } else {
                for line in lines {
                    println!("{}", line);
                }
            }
        }
        Some(Commands::ShowUser { id }) => show(store.as_ref(), USERS_COLLECTION, &id).await?,
        Some(Commands::ShowPatient { id }) => {
            show(store.as_ref(), PATIENTS_COLLECTION, &id).await?
        }
        Some(Commands::Repair) => {
            let report = RepairService::new(store).repair_orphans().await?;
            println!(
                "Scanned {} users, repaired {}, skipped {} doctors",
                report.scanned,
                report.repaired.len(),
                report.skipped_doctors
            );
            for id in report.repaired {
                println!("Created patient record: {}", id);
            }
        }
        None => {
            println!("Use 'femcare --help' for commands");
        }
    }

    Ok(())
}
