//! Slim Cache - fetch URLs through a TTL response cache
//!
//! A command-line front end over the cache library: issue requests through
//! the gatekeeper and inspect or maintain the chosen storage backend.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use slim_cache::cli::{CacheConfig, Cli, Command};
use slim_cache::gatekeeper::{Gatekeeper, RequestOptions};
use slim_cache::http::{HttpClient, Request};
use slim_cache::storage::{open_backend, Storage};
use slim_cache::CacheHelper;

/// Installs the stderr log subscriber, honouring `RUST_LOG`
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slim_cache=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Issues `repeat` GET requests for `request` and prints each response
async fn fetch(
    storage: Arc<dyn Storage>,
    config: &CacheConfig,
    request: Request,
    options: RequestOptions,
    repeat: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let gatekeeper = Gatekeeper::new(HttpClient::new()).with_backend(config.backend, storage);

    for _ in 0..repeat {
        let served = gatekeeper.handle(&request, &options).await?;
        if let Some(e) = &served.store_error {
            eprintln!("warning: response not cached: {}", e);
        }

        println!("{} ({}) {}", served.response.status, served.origin, request.url);
        println!("{}", String::from_utf8_lossy(&served.response.body));
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();
    let config = CacheConfig::from_cli(&cli)?;
    let storage = open_backend(config.backend, &config.storage)?;

    match cli.command {
        Command::Fetch {
            url,
            no_cache,
            ttl,
            repeat,
        } => {
            let mut options = if no_cache {
                RequestOptions::bypass()
            } else {
                RequestOptions::cached().on(config.backend)
            };
            options.ttl_minutes = ttl;
            fetch(storage, &config, Request::get(url), options, repeat).await?;
        }
        Command::Keys => {
            for key in CacheHelper::new(storage).keys().await? {
                println!("{}", key);
            }
        }
        Command::Clear => {
            CacheHelper::new(storage).clear().await?;
            println!("Cleared {} cache '{}'", config.backend, config.storage.namespace);
        }
        Command::Sweep => {
            let removed = CacheHelper::new(storage).sweep().await?;
            println!("Removed {} expired entries", removed);
        }
    }

    Ok(())
}
