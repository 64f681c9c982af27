//! `nlq-server`: HTTP API and command-line access to the query pipeline.
//!
//! Without seed data the server runs against an empty store, which is
//! mostly useful for probing the HTTP surface.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use nlq_server::network::{NetworkConfig, NetworkModule};
use nlq_server::service::{QueryService, ServerConfig};
use nlq_server::storage::{MemoryStore, NullStore, StorePool};
use nlq_server::traits::DocumentStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Natural-language queries over a document database.
#[derive(Parser)]
#[command(name = "nlq-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    store: StoreArgs,

    /// Log output format
    #[arg(long, global = true, env = "NLQ_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[derive(Args)]
struct StoreArgs {
    /// Database to serve
    #[arg(long, global = true, env = "NLQ_DATABASE", default_value = "test")]
    database: String,

    /// JSON file mapping collection names to arrays of documents
    #[arg(long, global = true, env = "NLQ_SEED")]
    seed: Option<PathBuf>,

    /// Documents sampled per collection for schema inference
    #[arg(long, global = true, env = "NLQ_SAMPLE_SIZE", default_value_t = 100)]
    sample_size: usize,

    /// Seconds allowed for sampling one collection
    #[arg(long, global = true, env = "NLQ_SCHEMA_TIMEOUT_SECS", default_value_t = 10)]
    schema_timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve(ServeArgs),

    /// Translate a request and print the query descriptor
    Translate {
        /// The request, e.g. "how many users are there"
        #[arg(required = true)]
        text: Vec<String>,

        /// Also execute the query and print the results
        #[arg(long)]
        execute: bool,
    },

    /// Infer and print the schema
    Schema {
        /// Only this collection
        #[arg(long)]
        collection: Option<String>,
    },
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "NLQ_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "NLQ_PORT", default_value_t = 8080)]
    port: u16,

    /// Allowed CORS origin, repeatable
    #[arg(long = "cors-origin", env = "NLQ_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Seconds before a request times out
    #[arg(long, env = "NLQ_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "NLQ_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn load_store(database: &str, seed: Option<&Path>) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let Some(path) = seed else {
        warn!(database, "no seed file given, serving an empty store");
        return Ok(Arc::new(NullStore::new(database)));
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let json = serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path.display()))?;
    let store = MemoryStore::from_json(database, json)?;
    info!(database, seed = %path.display(), "seed data loaded");
    Ok(Arc::new(store))
}

async fn build_service(args: &StoreArgs) -> anyhow::Result<Arc<QueryService>> {
    let pool = StorePool::new();
    pool.register(load_store(&args.database, args.seed.as_deref()).await?);
    let config = ServerConfig {
        database: args.database.clone(),
        sample_size: args.sample_size,
        schema_timeout: Duration::from_secs(args.schema_timeout_secs),
        ..ServerConfig::default()
    };
    let service = QueryService::new(config, Arc::new(pool));
    service.refresh_schema().await?;
    Ok(Arc::new(service))
}

async fn serve(service: Arc<QueryService>, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    let config = NetworkConfig {
        host: args.host,
        port: args.port,
        cors_origins: args.cors_origins,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        ..NetworkConfig::default()
    };
    let mut module = NetworkModule::new(config, service);
    module.start().await?;
    module
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let service = build_service(&cli.store).await?;
    match cli.command {
        None => serve(service, ServeArgs::default_from_env()).await,
        Some(Commands::Serve(args)) => serve(service, args).await,
        Some(Commands::Translate { text, execute }) => {
            let text = text.join(" ");
            let descriptor = service.translate(&text).await;
            if execute {
                print_json(&service.execute(descriptor).await?)
            } else {
                print_json(&descriptor)
            }
        }
        Some(Commands::Schema { collection }) => {
            print_json(&service.infer_schema(None, collection.as_deref()).await?)
        }
    }
}

impl ServeArgs {
    /// Serve options when no subcommand is given: defaults plus environment.
    fn default_from_env() -> Self {
        #[derive(Parser)]
        struct Only {
            #[command(flatten)]
            serve: ServeArgs,
        }
        Only::parse_from(["nlq-server"]).serve
    }
}
