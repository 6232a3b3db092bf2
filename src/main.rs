use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use routemeta::{
    CreateRequest, DeleteRequest, MetaRouter, Partition, Peer, RouteRequest, Router, RouterConfig,
    TableId, TableName,
};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_DATA_DIR: &str = "routemeta-data";

#[derive(Parser)]
#[command(name = "routemeta")]
#[command(about = "Inspect and edit a region route table on disk")]
struct Cli {
    /// Store directory (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Route a new table over the given peers
    Create {
        #[arg(long)]
        catalog: String,
        #[arg(long)]
        schema: String,
        #[arg(long)]
        table: String,
        /// Peers as `id=addr`, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        peers: Vec<String>,
        /// Partition column for `--bounds`
        #[arg(long, default_value = "id")]
        column: String,
        /// Upper partition bounds, comma separated; omit for one region
        #[arg(long, value_delimiter = ',')]
        bounds: Vec<String>,
        #[arg(long)]
        replicas: Option<usize>,
    },
    /// Show routes by name (`catalog.schema.table`) and/or id
    Route {
        #[arg(long = "name")]
        names: Vec<String>,
        #[arg(long = "id")]
        ids: Vec<u32>,
    },
    /// Remove a table's route
    Delete {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        id: Option<u32>,
    },
    /// List routed tables
    List,
    /// Snapshot the store and truncate its WAL
    Checkpoint,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => RouterConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => RouterConfig::new(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    } else if config.data_dir.is_none() {
        config.data_dir = Some(PathBuf::from(DEFAULT_DATA_DIR));
    }

    match cli.command {
        Command::Create {
            catalog,
            schema,
            table,
            peers,
            column,
            bounds,
            replicas,
        } => {
            if let Some(replicas) = replicas {
                config.replicas = replicas;
            }
            // `--name` splits at the first two dots, so only the table part may hold one.
            if catalog.contains('.') || schema.contains('.') {
                bail!("--catalog and --schema must not contain '.'");
            }
            let peers = parse_peers(&peers)?;
            let router = MetaRouter::open(config, peers)?;
            let partitions = if bounds.is_empty() {
                vec![Partition::default()]
            } else {
                bounds
                    .iter()
                    .map(|bound| Partition::single(column.as_str(), bound.as_str()))
                    .collect()
            };
            let req = CreateRequest::new(TableName::new(catalog, schema, table), partitions);
            print_json(&router.create(req).await.into_result()?)
        }
        Command::Route { names, ids } => {
            let router = MetaRouter::open(config, Vec::new())?;
            let req = RouteRequest {
                header: None,
                table_names: names
                    .iter()
                    .map(|name| TableName::parse(name))
                    .collect::<routemeta::Result<_>>()?,
                table_ids: ids.into_iter().map(TableId::new).collect(),
            };
            print_json(&router.route(req).await.into_result()?)
        }
        Command::Delete { name, id } => {
            if name.is_none() && id.is_none() {
                bail!("delete needs --name or --id");
            }
            let router = MetaRouter::open(config, Vec::new())?;
            let req = DeleteRequest {
                header: None,
                table_name: name.as_deref().map(TableName::parse).transpose()?,
                table_id: id.map(TableId::new),
            };
            print_json(&router.delete(req).await.into_result()?)
        }
        Command::List => {
            let router = MetaRouter::open(config, Vec::new())?;
            let tables: Vec<String> = router
                .manager()
                .list_tables()
                .await?
                .iter()
                .map(ToString::to_string)
                .collect();
            print_json(&tables)
        }
        Command::Checkpoint => {
            let router = MetaRouter::open(config, Vec::new())?;
            router.checkpoint().await?;
            eprintln!("Checkpoint written");
            Ok(())
        }
    }
}

fn parse_peers(raw: &[String]) -> Result<Vec<Peer>> {
    raw.iter()
        .map(|entry| {
            let (id, addr) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("Peer '{}' must look like id=addr", entry))?;
            let id = id
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid peer id in '{}'", entry))?;
            Ok(Peer::new(id, addr.trim()))
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
