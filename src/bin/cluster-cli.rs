use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use search_cluster_client::config::load_config;
use search_cluster_client::observability::{logging, metrics};
use search_cluster_client::{Cluster, ClusterRegistry, Error, Method, RequestOptions};

#[derive(Parser)]
#[command(name = "cluster-cli")]
#[command(about = "Query search clusters defined in a config file", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "clusters.toml")]
    config: PathBuf,

    /// Seconds to wait for in-flight requests on exit
    #[arg(long, default_value_t = 5)]
    grace: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured clusters
    Clusters,
    /// Show cluster health
    Health { cluster: String },
    /// Send a GET request
    Get {
        cluster: String,
        path: String,
        /// Query parameter as key=value, repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Send a request with a JSON body
    Send {
        cluster: String,
        #[arg(value_parser = parse_method)]
        method: Method,
        path: String,
        /// JSON body
        body: Option<String>,
    },
}

fn parse_method(s: &str) -> Result<Method, String> {
    match s.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::Get),
        "POST" => Ok(Method::Post),
        "PUT" => Ok(Method::Put),
        "DELETE" => Ok(Method::Delete),
        other => Err(format!("unsupported method '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let file = load_config(&cli.config)?;

    // Logging first so cluster startup is visible
    let _ = logging::init_logging(&file.observability);
    if file.observability.metrics_enabled {
        match file.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %file.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(path = %cli.config.display(), clusters = file.clusters.len(), "Loaded cluster configuration");
    let registry = ClusterRegistry::from_config(file)?;

    let outcome = run(&registry, cli.command).await;
    registry.stop_all(Duration::from_secs(cli.grace)).await;
    outcome
}

fn lookup(registry: &ClusterRegistry, name: &str) -> Result<Arc<Cluster>, Box<dyn std::error::Error>> {
    registry
        .get(name)
        .ok_or_else(|| format!("unknown cluster '{}'", name).into())
}

async fn run(registry: &ClusterRegistry, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Clusters => {
            for name in registry.names() {
                if let Some(cluster) = registry.get(&name) {
                    println!("{}\t{}", name, cluster.config().endpoint.url);
                }
            }
        }
        Commands::Health { cluster } => {
            let cluster = lookup(registry, &cluster)?;
            print_result(cluster.get("/_cluster/health", &[]).await)?;
        }
        Commands::Get { cluster, path, params } => {
            let cluster = lookup(registry, &cluster)?;
            let params: Vec<(&str, &str)> = params
                .iter()
                .map(|p| p.split_once('=').unwrap_or((p.as_str(), "")))
                .collect();
            print_result(cluster.get(&path, &params).await)?;
        }
        Commands::Send { cluster, method, path, body } => {
            let cluster = lookup(registry, &cluster)?;
            let body: Option<Value> = body.as_deref().map(serde_json::from_str).transpose()?;
            let result = cluster
                .request(method, &path, body.as_ref(), &[], &[], RequestOptions::default())
                .await;
            print_result(result)?;
        }
    }
    Ok(())
}

fn print_result(result: search_cluster_client::Result<search_cluster_client::Response>) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response.body)?);
            Ok(())
        }
        Err(Error::Http(e)) => {
            eprintln!("Error: cluster returned status {}", e.status);
            eprintln!("{}", e.raw);
            Err(Box::new(Error::Http(e)))
        }
        Err(e) => Err(Box::new(e)),
    }
}
