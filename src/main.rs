use std::io;
use std::process::ExitCode;

use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bisect_queue::config::ServerConfig;
use bisect_queue::persistence::{SnapshotError, try_load_snapshot};
use bisect_queue::server::{AppState, ServedQueue, build_router};
use bisect_queue::types::ChangeRecord;

/// Errors that stop the service from starting or keep it from running.
#[derive(Debug, Error)]
enum StartupError {
    #[error("failed to load queue snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bisect_queue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(ServerConfig::from_env()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let snapshot_path = config.snapshot_path();

    let queue = match &snapshot_path {
        Some(path) => match try_load_snapshot::<ChangeRecord>(path)? {
            Some(snapshot) => {
                let queue = snapshot.restore().map_err(SnapshotError::from)?;
                info!(
                    path = %path.display(),
                    queued = queue.batches().len(),
                    waiting = queue.awaiting().len(),
                    "Restored queue from snapshot"
                );
                queue
            }
            None => {
                info!(path = %path.display(), "No snapshot found, starting empty");
                ServedQueue::new()
            }
        },
        None => {
            info!("No state directory configured, queue is not persisted");
            ServedQueue::new()
        }
    };

    let app = build_router(AppState::new(queue, snapshot_path));

    let addr = config.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(StartupError::Serve)
}
