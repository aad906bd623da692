use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kubeadm_operator::config::OperatorConfig;
use kubeadm_operator::controller::Controller;
use kubeadm_operator::manifest;
use kubeadm_operator::reconcile::Reconciler;
use kubeadm_operator::server::{AppState, build_router};
use kubeadm_operator::store::{FileStore, MemoryStore, ObjectStore};
use kubeadm_operator::worker::{Dispatcher, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kubeadm_operator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = OperatorConfig::from_env().context("reading configuration")?;

    match &config.state_dir {
        Some(dir) => {
            let store = FileStore::open(dir)
                .with_context(|| format!("opening state directory {}", dir.display()))?;
            run(config, Arc::new(store)).await
        }
        None => {
            warn!("No state directory configured, state is kept in memory only");
            run(config, Arc::new(MemoryStore::new())).await
        }
    }
}

async fn run<S: ObjectStore>(config: OperatorConfig, store: Arc<S>) -> anyhow::Result<()> {
    if let Some(dir) = &config.manifest_dir {
        let manifests = manifest::load_dir(dir)?;
        let summary = manifest::apply(&*store, manifests).await?;
        info!(
            created = summary.created.len(),
            existing = summary.existing.len(),
            "Applied cluster manifests"
        );
    }

    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(Dispatcher::new_with_shutdown(
        Reconciler::new(Arc::clone(&store)),
        WorkerConfig::default().with_resync_interval(config.resync_interval),
        shutdown.clone(),
    ));

    let controller = Controller::new(Arc::clone(&store), Arc::clone(&dispatcher));
    let controller_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = controller.run(shutdown.clone()).await {
                error!(error = %e, "Controller failed, shutting down");
                shutdown.cancel();
            }
        }
    });

    let app = build_router(AppState::new(store));
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("serving HTTP")?;

    dispatcher.shutdown_all().await;
    controller_task.await?;
    info!("Shut down cleanly");
    Ok(())
}

/// Resolves on ctrl-c, or when something else cancels `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for ctrl-c");
            }
            info!("Received ctrl-c, shutting down");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
