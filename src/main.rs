//! stash CLI - Command line interface for stashdb
//!
//! Reads and updates a stash from the command line. Output is JSON so the
//! tool can be driven from scripts.

use anyhow::bail;
use clap::{Parser, Subcommand};
use stashdb::{Cardinality, LocalBlobStore, MultiStash, SingleStash, Stash, StashConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stash")]
#[command(about = "A disk-backed multi-valued key-value stash")]
#[command(version)]
struct Cli {
    /// Directory of the blob store (overrides the config file)
    #[arg(short, long)]
    location: Option<PathBuf>,

    /// Asset the stash is stored as (overrides the config file)
    #[arg(short, long)]
    asset: Option<String>,

    /// Path to a config file (defaults to ~/.config/stash/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Treat the asset as a single-valued stash
    #[arg(long)]
    single: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// List every key
    All,

    /// Check whether a key exists
    Contains {
        /// The key
        key: String,
    },

    /// Get the first value of a key
    Get {
        /// The key
        key: String,
    },

    /// Get every value of a key
    GetAll {
        /// The key
        key: String,
    },

    /// Add values to a key (multi-valued stashes)
    Add {
        /// The key
        key: String,
        /// Values to add; duplicates are ignored
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Set the value of a key (single-valued stashes)
    Set {
        /// The key
        key: String,
        /// The new value
        value: String,
    },

    /// Find keys whose values contain a term (multi-valued stashes)
    Search {
        /// Substring to look for
        term: String,
        /// Ignore case when matching
        #[arg(short, long)]
        ignore_case: bool,
        /// Report each key once
        #[arg(short, long)]
        unique: bool,
    },

    /// List the assets in the blob store
    Assets,

    /// Delete stored objects no asset refers to
    Prune,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => StashConfig::load_from(path)?,
        None => StashConfig::load()?,
    };
    let location = cli.location.clone().unwrap_or(config.location);
    let asset = cli.asset.clone().unwrap_or(config.asset);
    let level = config.compression_level;

    match cli.command {
        Commands::Assets => {
            let store = LocalBlobStore::open_or_create(&location)?;
            let assets = store.assets()?;
            output(
                cli.format,
                &serde_json::json!({
                    "location": location.display().to_string(),
                    "count": assets.len(),
                    "assets": assets
                }),
            );
        }

        Commands::Prune => {
            let mut store = LocalBlobStore::open_or_create(&location)?;
            let removed = store.prune()?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "removed": removed
                }),
            );
        }

        command if cli.single => {
            let stash: SingleStash = open_stash(&location, &asset, level)?;
            run_single(stash, command, cli.format)?;
        }

        command => {
            let stash: MultiStash = open_stash(&location, &asset, level)?;
            run_multi(stash, command, cli.format)?;
        }
    }

    Ok(())
}

fn open_stash<C: Cardinality>(location: &Path, asset: &str, level: i32) -> anyhow::Result<Stash<C>> {
    let store = LocalBlobStore::open_or_create(location)?.with_compression(level);
    Ok(Stash::with_store(store, asset)?)
}

fn run_multi(mut stash: MultiStash, command: Commands, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Commands::Add { key, values } => {
            let stored = stash.add_many([(key.as_str(), values)])?;
            output(
                format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "stored": stored
                }),
            );
        }

        Commands::Search {
            term,
            ignore_case,
            unique,
        } => {
            let keys = if unique {
                stash.search_unique(&term, ignore_case)
            } else {
                stash.search(&term, ignore_case)
            };
            output(
                format,
                &serde_json::json!({
                    "term": term,
                    "count": keys.len(),
                    "keys": keys
                }),
            );
        }

        Commands::Set { .. } => bail!("`set` needs a single-valued stash (pass --single), use `add`"),

        command => read(&stash, command, format)?,
    }
    Ok(())
}

fn run_single(mut stash: SingleStash, command: Commands, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Commands::Set { key, value } => {
            stash.set(&key, value.as_str())?;
            output(
                format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "value": value
                }),
            );
        }

        Commands::Add { .. } => bail!("`add` needs a multi-valued stash (drop --single), use `set`"),
        Commands::Search { .. } => bail!("`search` needs a multi-valued stash (drop --single)"),

        command => read(&stash, command, format)?,
    }
    Ok(())
}

/// Commands that work the same for every layout
fn read<C: Cardinality>(stash: &Stash<C>, command: Commands, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Commands::All => {
            let keys = stash.all();
            output(
                format,
                &serde_json::json!({
                    "count": keys.len(),
                    "keys": keys
                }),
            );
        }

        Commands::Contains { key } => {
            output(
                format,
                &serde_json::json!({
                    "key": key,
                    "contains": stash.contains(&key)
                }),
            );
        }

        Commands::Get { key } => match stash.get(&key) {
            Some(value) => {
                output(
                    format,
                    &serde_json::json!({
                        "key": key,
                        "value": value
                    }),
                );
            }
            None => not_found(format, &key),
        },

        Commands::GetAll { key } => match stash.get_all(&key) {
            Some(values) => {
                output(
                    format,
                    &serde_json::json!({
                        "key": key,
                        "count": values.len(),
                        "values": values
                    }),
                );
            }
            None => not_found(format, &key),
        },

        _ => bail!("unsupported command for this stash"),
    }
    Ok(())
}

fn not_found(format: OutputFormat, key: &str) -> ! {
    output(
        format,
        &serde_json::json!({
            "status": "error",
            "message": format!("Key not found: {}", key)
        }),
    );
    std::process::exit(1);
}

fn output(format: OutputFormat, value: &serde_json::Value) {
    match format {
        OutputFormat::Json => println!("{}", value),
        OutputFormat::Text => println!("{:#}", value),
    }
}
