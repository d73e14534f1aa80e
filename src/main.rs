//! # csvmeta
//!
//! Command-line front end for the CSV metadata ingestion pipeline.
//!
//! ## Usage
//!
//! ```bash
//! csvmeta --config ./config/csvmeta.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csvmeta init` | Create the SQLite database and metadata table |
//! | `csvmeta process --bucket B --key K` | Run the pipeline for one object |
//! | `csvmeta invoke <event.json>` | Run the pipeline for an event notification |
//! | `csvmeta get <filename>` | Print the stored metadata record |
//! | `csvmeta list` | List all stored records |
//! | `csvmeta serve` | Start the HTTP server |
//!
//! `process` and `invoke` print a `{"statusCode", "body"}` envelope on stdout
//! and exit non-zero unless the status is 200. Logs go to stderr; set
//! `RUST_LOG` to adjust verbosity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use csv_metadata_ingest::{config, ingest, migrate, records, server};

/// csvmeta: validate uploaded CSV files and record their metadata.
#[derive(Parser)]
#[command(
    name = "csvmeta",
    about = "csvmeta: validate uploaded CSV files and record their metadata",
    version,
    long_about = "csvmeta runs a single-file ingestion pipeline: it checks an uploaded object's size, \
    fetches it from S3 (or a local directory), parses it as CSV, and stores a summary record \
    (row count, column names, size, timestamp) in SQLite."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/csvmeta.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and the metadata table.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Process a single object.
    Process {
        /// Bucket (container) holding the object.
        #[arg(long)]
        bucket: String,

        /// Object key; also used as the record's filename.
        #[arg(long)]
        key: String,
    },

    /// Process an object-created event notification.
    ///
    /// Only the first record of the notification is processed.
    Invoke {
        /// Path to the event JSON, or `-` for stdin.
        event: PathBuf,
    },

    /// Print the stored metadata for a file.
    Get {
        /// Filename (object key) the record is stored under.
        filename: String,
    },

    /// List all stored metadata records.
    List,

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and accepts event notifications on
    /// `POST /invoke`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Process { bucket, key } => {
            let response = ingest::run_process(&cfg, &bucket, &key).await?;
            if !ingest::print_response(&response)? {
                std::process::exit(1);
            }
        }
        Commands::Invoke { event } => {
            let response = ingest::run_invoke(&cfg, &event).await?;
            if !ingest::print_response(&response)? {
                std::process::exit(1);
            }
        }
        Commands::Get { filename } => {
            records::run_get(&cfg, &filename).await?;
        }
        Commands::List => {
            records::run_list(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
