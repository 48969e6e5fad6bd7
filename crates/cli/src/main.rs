//! aggcmd CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load the JSON config named by `--config`.
//! 2. **Wire observability**: configure `tracing-subscriber` with an
//!    `EnvFilter` (`RUST_LOG`, default `info`) and, with `--log-json`, a JSON
//!    formatter. Logs go to stderr; results go to stdout.
//! 3. **Select the mode**:
//!    - without `--replies`, print the canonical command document the request
//!      builds (a dry run; nothing is submitted);
//!    - with `--replies`, construct a [`replay::ScriptedServer`] from the reply
//!      script, inject it into an [`operations::Database`], run the request,
//!      and print the normalized result.

mod config;
mod request;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{
    build_aggregate, build_group, build_map_reduce, AggregateOutcome, CollectionName, GroupPlan,
    ReadPreferenceDefaults,
};
use operations::{Database, MapReduceOutput};
use replay::{Script, ScriptedServer};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::request::{read_request, AggregateFile, GroupFile, MapReduceFile};

#[derive(Debug, Parser)]
#[command(name = "aggcmd", version, about = "Build and replay map/reduce, group and aggregate commands")]
struct Cli {
    /// JSON configuration file (database, collection, read preferences).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reply script; when given, the request is executed against it.
    #[arg(long, global = true)]
    replies: Option<PathBuf>,

    /// Collection to operate on; overrides the config file.
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    operation: Operation,
}

#[derive(Debug, Subcommand)]
enum Operation {
    /// Run a map/reduce request.
    MapReduce {
        #[arg(long)]
        request: PathBuf,
    },
    /// Run a group request.
    Group {
        #[arg(long)]
        request: PathBuf,
    },
    /// Run an aggregation pipeline request.
    Aggregate {
        #[arg(long)]
        request: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = CliConfig::load(cli.config.as_deref())?;
    let collection = config.collection_name(cli.collection.as_deref())?;

    let output = match cli.replies.as_deref() {
        None => dry_run(&config, &collection, &cli.operation)?,
        Some(replies) => replay(&config, collection, &cli.operation, replies).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Builds the command for a request without submitting it.
fn dry_run(
    config: &CliConfig,
    collection: &CollectionName,
    operation: &Operation,
) -> Result<serde_json::Value> {
    let defaults = ReadPreferenceDefaults::new(config.collection_read_preference, config.read_preference);
    info!(collection = %collection, "building command (dry run)");

    let output = match operation {
        Operation::MapReduce { request } => {
            let request = read_request::<MapReduceFile>(request)?.into_request()?;
            let command = build_map_reduce(collection, request, &defaults)?;
            json!({ "command": command.document, "readPreference": command.read_preference })
        }
        Operation::Group { request } => {
            let request = read_request::<GroupFile>(request)?.into_request()?;
            match build_group(collection, request, &defaults)? {
                GroupPlan::Command {
                    document,
                    read_preference,
                } => json!({ "command": document, "readPreference": read_preference }),
                GroupPlan::Evaluation { procedure } => {
                    json!({ "eval": commands::Value::Code(procedure) })
                }
            }
        }
        Operation::Aggregate { request } => {
            let request = read_request::<AggregateFile>(request)?.into_request()?;
            let command = build_aggregate(collection, request, &defaults)?;
            json!({ "command": command.document, "options": command.options.extra })
        }
    };
    Ok(output)
}

/// Executes a request against a scripted server and renders the result.
async fn replay(
    config: &CliConfig,
    collection: CollectionName,
    operation: &Operation,
    replies: &Path,
) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(replies)
        .with_context(|| format!("reading reply script {}", replies.display()))?;
    let server = Arc::new(Script::from_json(&text).map(ScriptedServer::new)?);

    let mut database = Database::new(config.database_name()?, server.clone(), server);
    if let Some(read_preference) = config.read_preference {
        database = database.with_read_preference(read_preference);
    }
    let mut collection = database.collection(collection);
    if let Some(read_preference) = config.collection_read_preference {
        collection = collection.with_read_preference(read_preference);
    }

    let output = match operation {
        Operation::MapReduce { request } => {
            let request = read_request::<MapReduceFile>(request)?.into_request()?;
            match collection.map_reduce(request).await? {
                MapReduceOutput::Inline {
                    results,
                    statistics,
                } => json!({ "results": results, "statistics": statistics }),
                MapReduceOutput::Collection {
                    collection,
                    statistics,
                } => json!({
                    "collection": {
                        "db": collection.database().name().as_str(),
                        "name": collection.name().as_str(),
                    },
                    "statistics": statistics,
                }),
            }
        }
        Operation::Group { request } => {
            let request = read_request::<GroupFile>(request)?.into_request()?;
            collection.group(request).await?.to_json()
        }
        Operation::Aggregate { request } => {
            let request = read_request::<AggregateFile>(request)?.into_request()?;
            match collection.aggregate(request).await? {
                AggregateOutcome::Results(results) => json!({ "results": results }),
                AggregateOutcome::ServerPipeline(pipeline) => json!({ "serverPipeline": pipeline }),
            }
        }
    };
    Ok(output)
}
