//! imgload: fetch, cache and inspect images from the command line.

mod cli;
mod error;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use imgload_config::Config;
use imgload_fetch::transport::HttpTransport;
use imgload_fetch::{Cache, Response, Service};
use imgload_storage::StorageBackend;
use imgload_storage::backend::LocalBackend;
use std::collections::{HashMap, HashSet};
use std::process::ExitCode;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(policy) = cli.policy {
        config.cache.policy = policy;
    }
    tracing::debug!(?config, "Configuration loaded");
    match cli.command {
        Command::Fetch { urls } => fetch(&shared_service(&config)?, urls).await,
        Command::Clear => {
            let cleared = shared_service(&config)?.clear_cache().await;
            println!(
                "Cleared {} in memory, {} on disk ({} failed)",
                cleared.memory, cleared.disk_removed, cleared.disk_failed
            );
            Ok(if cleared.disk_failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        },
        Command::List => list(&config).await,
    }
}

/// The process-wide service, built once from configuration.
fn shared_service(config: &Config) -> Result<Service> {
    let cache = if config.cache.policy.uses_disk() {
        let directory = config.cache.directory().or_raise(|| ErrorKind::Cache)?;
        tracing::debug!(directory = %directory.display(), "Using disk cache");
        Cache::local(config.cache.policy, config.cache.memory_capacity, directory).or_raise(|| ErrorKind::Cache)?
    } else {
        Cache::new(config.cache.policy, config.cache.memory_capacity, None).or_raise(|| ErrorKind::Cache)?
    };
    let user_agent = config.http.user_agent.as_deref().unwrap_or(concat!("imgload/", env!("CARGO_PKG_VERSION")));
    let transport = HttpTransport::new(config.http.timeout(), user_agent).or_raise(|| ErrorKind::Transport)?;
    Ok(Service::new(Arc::new(transport), cache))
}

async fn fetch(service: &Service, urls: Vec<Url>) -> Result<ExitCode> {
    let mut seen = HashSet::new();
    let urls: Vec<Url> = urls.into_iter().filter(|url| seen.insert(url.clone())).collect();

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let listener = Arc::new(move |response: &Response| {
        _ = sender.send(response.clone());
    });
    // Registered before any load starts, so no response can be missed.
    let subscription = service.subscribe(&listener);
    let tasks: Vec<_> = urls.iter().cloned().map(|url| service.spawn_load(url)).collect();
    futures::future::join_all(tasks).await;
    drop(subscription);
    drop(listener);

    let mut responses = HashMap::new();
    while let Some(response) = receiver.recv().await {
        responses.insert(response.url.clone(), response);
    }
    let mut failed = false;
    for url in &urls {
        match responses.get(url).map(|response| &response.result) {
            Some(Ok(artifact)) => println!("{url}\t{}x{}", artifact.width(), artifact.height()),
            Some(Err(error)) => {
                failed = true;
                println!("{url}\tfailed: {error}");
            },
            None => {
                failed = true;
                println!("{url}\tno response");
            },
        }
    }
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

async fn list(config: &Config) -> Result<ExitCode> {
    if !config.cache.policy.uses_disk() {
        exn::bail!(ErrorKind::NoDiskCache(config.cache.policy));
    }
    let directory = config.cache.directory().or_raise(|| ErrorKind::List)?;
    let backend = LocalBackend::new("disk", &directory).or_raise(|| ErrorKind::List)?;
    let mut entries = backend.list().await.or_raise(|| ErrorKind::List)?;
    entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.key.cmp(&b.key)));
    for entry in &entries {
        let modified = entry.modified.format(&Rfc3339).unwrap_or_else(|_| entry.modified.to_string());
        println!("{}\t{}\t{}", entry.key, entry.size, modified);
    }
    tracing::info!(entries = entries.len(), directory = %directory.display(), "Listed disk cache");
    Ok(ExitCode::SUCCESS)
}
