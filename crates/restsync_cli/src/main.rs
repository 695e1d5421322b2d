//! restsync CLI
//!
//! Issues a single request intent against a live API and prints the
//! reconciled state of the resource.
//!
//! # Commands
//!
//! - `check` - Validate the configuration and print the initial state
//! - `index` - Fetch a collection
//! - `show` - Fetch one record
//! - `create` - Create a record
//! - `update` - Update a record
//! - `destroy` - Delete a record

mod commands;

use clap::{Parser, Subcommand};
use restsync_core::Event;
use restsync_dispatch::HttpTransport;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// restsync command-line client.
#[derive(Parser)]
#[command(name = "restsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration (one object or an array of fragments)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Request timeout in seconds
    #[arg(global = true, long, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the initial state
    Check,

    /// Fetch a collection
    Index {
        /// Resource name
        resource: String,

        /// Query parameter as key=value; repeat a key to send an array
        #[arg(short, long = "query")]
        query: Vec<String>,
    },

    /// Fetch one record
    Show {
        /// Resource name
        resource: String,

        /// Record ID (omit for singular resources)
        id: Option<String>,
    },

    /// Create a record
    Create {
        /// Resource name
        resource: String,

        /// Attributes as a JSON object
        #[arg(short, long)]
        data: String,
    },

    /// Update a record
    Update {
        /// Resource name
        resource: String,

        /// Record ID
        id: String,

        /// Attributes as a JSON object
        #[arg(short, long)]
        data: String,
    },

    /// Delete a record
    Destroy {
        /// Resource name
        resource: String,

        /// Record ID (omit for singular resources)
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = cli.config.ok_or("Configuration file required (--config)")?;
    let config = commands::load_config(&path)?;

    let event = match cli.command {
        Commands::Check => {
            let state = commands::check(config)?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            return Ok(());
        }
        Commands::Index { resource, query } => {
            let event = Event::index(resource);
            if query.is_empty() {
                event
            } else {
                event.with_query_params(commands::parse_query(&query)?)
            }
        }
        Commands::Show { resource, id } => commands::with_optional_id(Event::show(resource), id),
        Commands::Create { resource, data } => {
            Event::create(resource, commands::parse_data(&data)?)
        }
        Commands::Update { resource, id, data } => {
            Event::update(resource, commands::parse_data(&data)?).with_id(commands::parse_id(&id))
        }
        Commands::Destroy { resource, id } => {
            commands::with_optional_id(Event::destroy(resource), id)
        }
    };

    let transport = HttpTransport::with_timeout(Duration::from_secs(cli.timeout))?;
    let outcome = commands::run(config, event, transport).await?;
    println!("{}", serde_json::to_string_pretty(&outcome.state)?);

    if let Some(rejected) = outcome.rejected {
        eprintln!("error: {rejected}");
        std::process::exit(1);
    }

    Ok(())
}
