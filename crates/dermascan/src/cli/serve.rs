//! The `dermascan serve` command: load everything, then serve HTTP.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use dermascan_core::{Config, ImageClassifier, KnowledgeBase, ModelHandle};

use crate::server::{self, AppState};

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides `server.host`)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides `server.port`)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Execute the serve command.
///
/// Startup is fail-fast: if the knowledge base or the model cannot be
/// loaded, no socket is bound.
pub async fn execute(args: ServeArgs, config: Config) -> anyhow::Result<()> {
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    let knowledge = KnowledgeBase::load(config.knowledge_path().as_deref())
        .context("Failed to load knowledge base")?;
    tracing::info!("Knowledge base: {} entries", knowledge.len());

    tracing::info!("Loading model {} ({})", config.model.repo, config.model.revision);
    let model = ModelHandle::initialize(&config)
        .await
        .with_context(|| format!("Failed to load model {}", config.model.repo))?;

    let (width, height) = model.preprocess_config().output_dims(1024, 1024);
    tracing::debug!("Model input for a 1024x1024 upload: {}x{}", width, height);

    let unmatched = knowledge.unmatched(model.labels());
    if !unmatched.is_empty() {
        tracing::warn!(
            "{} of {} model labels have no knowledge base entry and will use \"Unknown\": {:?}",
            unmatched.len(),
            model.labels().len(),
            unmatched
        );
    }

    let state = AppState::new(Arc::new(model), knowledge, &config.limits);
    let app = server::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}
