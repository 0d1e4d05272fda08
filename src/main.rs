//! fortune-cache - command-line front end for the caching subsystem
//!
//! Installs and activates response-store generations, serves single requests
//! through the strategy engine, and loads memoized backend data sets.

use std::io;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::filter::EnvFilter;

use fortune_cache::cli::{parse_dataset_arg, Cli, Command};
use fortune_cache::config::Config;
use fortune_cache::content::{ContentService, HttpDataSource};
use fortune_cache::intercept::{
    DiskStore, HttpFetcher, LifecycleManager, ResponseStore, StrategyEngine,
};

/// Sets up compact logging on stderr, preferring `RUST_LOG` over the config
fn init_tracing(config: &Config) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(io::stderr)
        .compact()
        .init();
}

/// Opens the on-disk response store
fn open_store(config: &Config) -> Result<Arc<DiskStore>, Box<dyn std::error::Error>> {
    let dir = config
        .store_dir()
        .ok_or("cannot determine a cache directory; set cache_dir in the config")?;
    Ok(Arc::new(DiskStore::with_dir(dir)))
}

fn lifecycle(
    config: &Config,
    store: Arc<DiskStore>,
) -> Result<LifecycleManager, Box<dyn std::error::Error>> {
    let fetcher = Arc::new(HttpFetcher::new(config.request_timeout())?);
    Ok(LifecycleManager::new(
        config.generation_names(),
        config.origin_url()?,
        fetcher,
        store,
    )
    .with_precache(config.precache.clone()))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Print errors with Display rather than the Debug form `main` would use
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .map_err(|e| format!("Failed to load config from {}: {}", path.display(), e))?,
        None => Config::default(),
    };
    init_tracing(&config);

    match cli.command {
        Command::Install => {
            let store = open_store(&config)?;
            let mut manager = lifecycle(&config, store)?;
            let report = manager.install().await?;
            for url in &report.stored {
                println!("stored  {}", url);
            }
            for (url, reason) in &report.failed {
                println!("failed  {} ({})", url, reason);
            }
        }
        Command::Activate => {
            let store = open_store(&config)?;
            let mut manager = lifecycle(&config, store)?;
            let deleted = manager.activate().await?;
            for generation in &deleted {
                println!("deleted {}", generation);
            }
            info!(version = %config.version, "version is now current");
        }
        Command::Fetch(args) => {
            let request = args.to_request()?;
            let store = open_store(&config)?;
            let names = config.generation_names();
            if !store.generations().await?.contains(&names.dynamic) {
                warn!(
                    version = %config.version,
                    "version is not active; responses will not be stored until it is activated"
                );
            }
            let fetcher = Arc::new(HttpFetcher::new(config.request_timeout())?);
            let (_publisher, generations) = watch::channel(names);
            let engine = StrategyEngine::new(config.classifier(), fetcher, store, generations);

            let strategy = engine.classify(&request);
            let response = engine.handle(&request).await;
            // The runtime is torn down on return; let background refreshes land first
            engine.drain().await;
            eprintln!(
                "{} {} ({} bytes{})",
                response.status,
                strategy,
                response.body.len(),
                if response.is_offline() { ", offline" } else { "" }
            );
            println!("{}", String::from_utf8_lossy(&response.body));
        }
        Command::Classify(args) => {
            let request = args.to_request()?;
            println!("{}", config.classifier().classify(&request));
        }
        Command::Generations => {
            let store = open_store(&config)?;
            let current = config.generation_names();
            for generation in store.generations().await? {
                let records = store.len(&generation).await?;
                let marker = if current.contains(&generation) { "*" } else { " " };
                println!("{} {} ({} records)", marker, generation, records);
            }
        }
        Command::Data { dataset } => {
            let set = parse_dataset_arg(&dataset)?;
            let source = HttpDataSource::new(config.backend_url.clone(), config.request_timeout())?;
            let mut service = ContentService::new(source);
            let value = service.load(set).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
