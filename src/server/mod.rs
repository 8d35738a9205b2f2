//! REST serving of a loaded artifact.
//!
//! The route table is built once at assembly time; only the route matching
//! the artifact's capability is mounted, plus `/health`.

pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::artifact::ArtifactKind;
use crate::error::{Error, Result};
use state::ServerState;

/// Build the route table for the artifact held by `state`.
pub fn build_router(state: ServerState) -> Router {
    let router = match state.artifact.kind() {
        ArtifactKind::Pipeline => {
            Router::new().route("/predict", post(routes::predict::predict))
        }
        ArtifactKind::Recommender => {
            Router::new().route("/recommend", post(routes::recommend::recommend))
        }
        ArtifactKind::Extension => Router::new().route("/extend", post(routes::extend::extend)),
    };
    router.route("/health", get(health)).with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// A constructed REST server.
///
/// `start` binds the listener and begins serving; `stop` cancels the accept
/// loop, drains in-flight requests up to the grace deadline, then
/// force-terminates.
pub struct RestServer {
    state: ServerState,
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
    local_addr: Option<SocketAddr>,
}

impl RestServer {
    pub fn new(state: ServerState, addr: SocketAddr) -> Self {
        Self {
            state,
            addr,
            shutdown: CancellationToken::new(),
            task: None,
            local_addr: None,
        }
    }

    /// Bind the listener and begin accepting requests.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.task.is_some() {
            return Err(Error::Transport("server already started".into()));
        }

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| Error::Transport(format!("cannot bind {}: {}", self.addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Transport(e.to_string()))?;
        self.local_addr = Some(local_addr);

        let router = build_router(self.state.clone());
        let token = self.shutdown.clone();
        info!(addr = %local_addr, model = self.state.artifact.name(), "REST server listening");

        self.task = Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
                .map_err(|e| Error::Transport(e.to_string()))
        }));

        Ok(local_addr)
    }

    /// Stop accepting, drain in-flight requests up to `grace`, then abort.
    pub async fn stop(&mut self, grace: Duration) -> Result<()> {
        self.shutdown.cancel();
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(Error::Transport(format!("server task failed: {}", e))),
            Err(_) => {
                warn!("drain deadline exceeded, force-terminating REST server");
                task.abort();
                Ok(())
            }
        }
    }

    /// The bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}
