use clap::Parser;
use mockwire::config::MockSettings;
use mockwire::model::load_definitions;
use mockwire::repository::{
    InMemoryResponseRepository, InMemoryServiceRepository, InMemoryServiceStateRepository,
};
use mockwire::server::MockService;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// REST mock dispatch engine: serve canned responses for virtualized
/// services.
#[derive(Parser, Debug)]
#[command(name = "mockwire", version, about)]
struct Args {
    /// Mock definition files (JSON or YAML), each holding services and
    /// responses.
    #[arg(long = "definitions", required = true)]
    definitions: Vec<PathBuf>,

    /// Address to bind the HTTP listener on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let settings = MockSettings::from_env();

    let mut services = Vec::new();
    let mut responses = Vec::new();
    for path in &args.definitions {
        let definitions = load_definitions(path)?;
        services.extend(definitions.services);
        responses.extend(definitions.responses);
    }
    tracing::info!(
        services = services.len(),
        responses = responses.len(),
        "Mock repositories populated"
    );

    let service = MockService::with_defaults(
        Arc::new(InMemoryServiceRepository::new(services)),
        Arc::new(InMemoryResponseRepository::new(responses)),
        Arc::new(InMemoryServiceStateRepository::new()),
        settings,
    )?;

    let engine = service
        .serve(&args.addr)
        .map_err(|e| anyhow::anyhow!("cannot bind {}: {e}", args.addr))?;
    tracing::info!(addr = %args.addr, "Mock engine started");
    engine
        .join()
        .map_err(|e| anyhow::anyhow!("server terminated abnormally: {e:?}"))?;
    Ok(())
}
