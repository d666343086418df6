//! Command dispatch

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use modelgate_api::{ApiServer, AuthGate};
use modelgate_core::{GateConfig, HyperParams, ModelHandle, ModelService, ModelStore, UntrainedRebuild};

use super::args::{Args, Command};
use crate::logging;

/// Load configuration, start logging, and run the selected command
pub async fn run(args: Args) -> Result<()> {
    let command = args.command();
    let mut config = GateConfig::load(args.config.as_deref())?;
    apply_overrides(&mut config, &command);

    logging::init(&config.logging)?;

    match command {
        Command::Serve { .. } => serve(config).await,
        Command::Init { input_width, force } => {
            let model = init_model(&config, input_width, force)?;
            info!(
                "Default model {} written to {}",
                model.id,
                config.model.artifact_path.display()
            );
            Ok(())
        }
    }
}

/// Apply command-line flags on top of the loaded configuration
pub fn apply_overrides(config: &mut GateConfig, command: &Command) {
    if let Command::Serve { host, port } = command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }
}

/// Write the default artifact used at startup
pub fn init_model(config: &GateConfig, input_width: usize, force: bool) -> Result<ModelHandle> {
    let store = ModelStore::new(&config.model.artifact_path);
    store
        .init_default(input_width, HyperParams::default(), force)
        .context("Failed to write default model")
}

/// Load the default model and serve until shutdown
pub async fn serve(config: GateConfig) -> Result<()> {
    let store = ModelStore::new(&config.model.artifact_path);
    let service = ModelService::start(
        store,
        Arc::new(UntrainedRebuild::new()),
        config.model.dataset_path.clone(),
        config.model.task_retention(),
    )
    .await
    .with_context(|| {
        format!(
            "Failed to load default model from {}",
            config.model.artifact_path.display()
        )
    })?;

    if config.auth.tokens.is_empty() {
        warn!("No bearer tokens configured; every protected route will answer 401");
    }
    let gate = AuthGate::from_settings(&config.auth);

    let server = ApiServer::new(
        config.server.clone(),
        service,
        gate,
        config.model.shutdown_timeout(),
    );
    server.start().await
}
