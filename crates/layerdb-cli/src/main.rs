//! layerdb CLI
//!
//! Command-line interface for inspecting and cleaning a local model store.

mod commands;

use clap::{Parser, Subcommand};
use layerdb_core::StorageConfig;
use layerdb_store::ManifestStore;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// layerdb - local model package store
#[derive(Parser, Debug)]
#[command(name = "layerdb")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Models directory (defaults to LAYERDB_MODELS or ~/.layerdb/models)
    #[arg(long, global = true)]
    models: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List stored models
    List {
        /// Fail on the first unreadable manifest instead of skipping it
        #[arg(long)]
        strict: bool,
    },

    /// Show a model's manifest
    Show {
        /// Model name (e.g., library/llama:7b)
        model: String,
    },

    /// Print the total size of a model's layers
    Size {
        /// Model name
        model: String,
    },

    /// Remove a model
    Rm {
        /// Model name
        model: String,

        /// Keep the layer blobs, remove only the manifest
        #[arg(long)]
        keep_layers: bool,
    },

    /// Show which of a model's layers are shared with other models
    Refs {
        /// Model name
        model: String,
    },

    /// Re-hash a model's layer blobs
    Verify {
        /// Model name
        model: String,
    },

    /// Store a model under another name
    Cp {
        /// Existing model name
        source: String,

        /// New model name
        destination: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let mut storage = StorageConfig::default().with_env_override();
    if let Some(models) = cli.models {
        storage.models_path = models;
    }
    let store = ManifestStore::from_config(&storage);

    match cli.command {
        Commands::List { strict } => commands::list(&store, strict)?,
        Commands::Show { model } => commands::show(&store, &model)?,
        Commands::Size { model } => commands::size(&store, &model)?,
        Commands::Rm { model, keep_layers } => commands::rm(&store, &model, keep_layers)?,
        Commands::Refs { model } => commands::refs(&store, &model)?,
        Commands::Verify { model } => commands::verify(&store, &model)?,
        Commands::Cp {
            source,
            destination,
        } => commands::cp(&store, &source, &destination)?,
    }

    Ok(())
}
