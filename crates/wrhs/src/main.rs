//! wrhs: the warehouse command line.
//!
//! Opens the store described by a warehouse.toml and runs one operation
//! against the registered models.
//!
//! # Usage
//!
//! ```text
//! wrhs --config warehouse.toml ensure
//! wrhs get BuildHead '{"env":"prod","name":"app","locale":"en-US"}'
//! wrhs find Build '{"conditions":{"env":"prod","name":"app","version":"1.0.0"},"fields":["locale"]}'
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use serde_json::Value;
use tracing::info;
use warehouse_models::{Adapter, WarehouseConfig, WarehouseModels};
use warehouse_store::Record;

#[derive(Parser)]
#[command(name = "wrhs", about = "Warehouse models command line")]
struct Cli {
    /// Path to warehouse.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create every table.
    Ensure,
    /// Drop every table and its items.
    Drop,
    /// Point-read one entity.
    Get {
        /// Entity name, e.g. `BuildHead`.
        model: String,
        /// Identifying attributes as a JSON object.
        data: String,
    },
    /// List a partition, one JSON record per line.
    Find {
        /// Entity name, e.g. `Build`.
        model: String,
        /// Conditions, or `{"conditions": {...}, "fields": [...]}`.
        query: String,
    },
    /// Write a default warehouse.toml to stdout.
    Scaffold {
        /// Database file for the redb backend.
        #[arg(long, default_value = "warehouse.redb")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wrhs=debug,warehouse=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Command::Scaffold { path } = &cli.command {
        print!("{}", WarehouseConfig::scaffold(path).to_toml_string()?);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => WarehouseConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => WarehouseConfig::default(),
    };
    let models = config.open_models()?;

    match cli.command {
        Command::Ensure => {
            models.ensure(&config.tables).await?;
            info!("all tables ensured");
        }
        Command::Drop => {
            models.drop().await?;
            info!("all tables dropped");
        }
        Command::Get { model, data } => run_get(&models, &model, &data).await?,
        Command::Find { model, query } => run_find(&models, &model, &query).await?,
        Command::Scaffold { .. } => {}
    }
    Ok(())
}

async fn run_get(models: &WarehouseModels, name: &str, data: &str) -> anyhow::Result<()> {
    let data = parse_record(data)?;
    match adapter(models, name)?.get(&data).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => bail!("{name} not found"),
    }
    Ok(())
}

async fn run_find(models: &WarehouseModels, name: &str, query: &str) -> anyhow::Result<()> {
    let query = parse_record(query)?;
    let mut items = adapter(models, name)?.find_all_stream(query);
    let mut count = 0usize;
    while let Some(item) = items.try_next().await? {
        println!("{}", serde_json::to_string(&item)?);
        count += 1;
    }
    info!(model = name, count, "partition listed");
    Ok(())
}

fn adapter<'a>(models: &'a WarehouseModels, name: &str) -> anyhow::Result<Adapter<'a>> {
    models.adapter(name).with_context(|| {
        format!(
            "unknown model `{name}`, expected one of: {}",
            models.names().join(", ")
        )
    })
}

fn parse_record(text: &str) -> anyhow::Result<Record> {
    match serde_json::from_str(text).context("argument is not valid JSON")? {
        Value::Object(record) => Ok(record),
        _ => bail!("argument must be a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warehouse_store::MemoryBackend;

    #[test]
    fn parse_record_requires_an_object() {
        assert!(parse_record(r#"{"name":"a"}"#).is_ok());
        assert!(parse_record("[1, 2]").is_err());
        assert!(parse_record("not json").is_err());
    }

    #[test]
    fn unknown_model_lists_known_ones() {
        let models = WarehouseModels::new(Arc::new(MemoryBackend::new()));
        let err = adapter(&models, "Nope").unwrap_err().to_string();
        assert!(err.contains("BuildHead"));
        assert!(adapter(&models, "ReleaseLineDep").is_ok());
    }

    #[test]
    fn cli_parses_find() {
        let cli =
            Cli::try_parse_from(["wrhs", "--config", "w.toml", "find", "Build", "{}"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("w.toml")));
        assert!(matches!(cli.command, Command::Find { model, .. } if model == "Build"));
    }
}
