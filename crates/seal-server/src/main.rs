//! `field-seal` — service binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (OTEL + tracing).
//! 3. Set the master secret, if configured.
//! 4. Build the wipe registry.
//! 5. Load entity types from the schema directory into document repositories.
//! 6. Build the Axum router and start the HTTP server.

mod config;
mod documents;
mod schema;
mod server;
mod telemetry;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use seal_core::{MasterSecretHolder, RepositoryResolver, WipeRegistry};
use tracing::{info, warn};

use config::Config;
use documents::DocumentCollection;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let mut cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        "field-seal starting"
    );

    // -----------------------------------------------------------------------
    // 3. Master secret
    // -----------------------------------------------------------------------
    let master = Arc::new(MasterSecretHolder::new());
    match cfg.master_secret.take() {
        Some(secret) => master.set(secret)?,
        None => warn!("MASTER_SECRET not set; encryption endpoints will answer 503"),
    }

    // -----------------------------------------------------------------------
    // 4. Wipe registry
    // -----------------------------------------------------------------------
    let wipe = WipeRegistry::new(cfg.wipe()).context("failed to start wipe workers")?;
    info!(workers = wipe.workers(), "wipe registry ready");

    // -----------------------------------------------------------------------
    // 5. Document repositories
    // -----------------------------------------------------------------------
    let entities = match &cfg.schema_dir {
        Some(dir) => schema::load_dir(Path::new(dir)).await?,
        None => {
            warn!("SCHEMA_DIR not set; no document repositories registered");
            HashMap::new()
        }
    };
    let registry: HashMap<String, Arc<DocumentCollection>> = entities
        .into_iter()
        .map(|(entity, fields)| {
            let repo = Arc::new(DocumentCollection::new(entity.clone(), fields));
            (entity, repo)
        })
        .collect();
    info!(repositories = registry.len(), "document repositories registered");

    // -----------------------------------------------------------------------
    // 6. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(
        master,
        wipe,
        RepositoryResolver::new(registry),
        cfg.integrity_check_enabled,
        cfg.storage_threshold_bytes,
    );
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
