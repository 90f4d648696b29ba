//! Registry server CLI binary
//!
//! Serves the HTTP API and exposes the same operations offline against a
//! local data directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use registry_server::ingest::{ingest_archive, PackageMetadata};
use registry_server::{compute_cost, run_server, AppState, Config, FsPackageStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "registry-server")]
#[command(about = "Package registry with dependency cost resolution")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON); defaults apply when it does not exist
    #[arg(long, default_value = "registry.json", global = true)]
    config: PathBuf,

    /// Data directory for package storage (overrides the config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the registry server
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },

    /// Compute the cost of a stored package and print it as JSON
    Cost {
        /// Local package id
        id: String,

        /// Resolve and include dependencies
        #[arg(long)]
        dependencies: bool,
    },

    /// Add a zip or gzip-tar archive to the local store
    Add {
        /// Path to the archive
        archive: PathBuf,

        /// Package name
        #[arg(long)]
        name: String,

        /// Package version (defaults to 1.0.0)
        #[arg(long)]
        version: Option<String>,
    },

    /// List stored packages
    List,

    /// Remove every stored package
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = registry_logging::init_subscriber();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    let data_dir = cli
        .data
        .clone()
        .unwrap_or_else(|| config.storage.default_data_dir.clone());

    match cli.command {
        Commands::Start { host, port } => {
            let host = host.unwrap_or_else(|| config.server.default_host.clone());
            let port = port.unwrap_or(config.server.default_port);
            run_server(config, host, port, data_dir).await
        }

        Commands::Cost { id, dependencies } => {
            let state = AppState::from_config(config, data_dir, String::new())?;
            let report = compute_cost(
                state.store.as_ref(),
                state.source.as_ref(),
                &state.resolver_settings(),
                &id,
                dependencies,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Commands::Add {
            archive,
            name,
            version,
        } => {
            let bytes = tokio::fs::read(&archive)
                .await
                .with_context(|| format!("Failed to read {}", archive.display()))?;
            let store = FsPackageStore::new(data_dir);
            let record = ingest_archive(
                &store,
                &name,
                version.as_deref(),
                &bytes,
                config.max_upload_size_bytes() as u64,
            )
            .await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&PackageMetadata::from(&record))?
            );
            Ok(())
        }

        Commands::List => {
            let store = FsPackageStore::new(data_dir);
            let records = store.list().await?;
            if records.is_empty() {
                println!("No packages stored");
            }
            for record in records {
                println!(
                    "{:<30} {:<12} {:>10} B  {}",
                    record.name, record.version, record.size_bytes, record.id
                );
            }
            Ok(())
        }

        Commands::Reset => {
            let removed = FsPackageStore::new(data_dir).reset().await?;
            println!("Removed {removed} package(s)");
            Ok(())
        }
    }
}
