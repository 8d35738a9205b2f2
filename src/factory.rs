//! Service assembly.
//!
//! The factory is the single place where artifact, cache pool, and transport
//! are wired together. It loads the artifact first and constructs nothing
//! else on loader failure; the returned service has not been started.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::artifact::{ArtifactKind, ArtifactLoader, FsLoader};
use crate::cache::CachePool;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::rpc::handler::{DataHandler, DefaultDataHandler};
use crate::rpc::RpcServer;
use crate::server::state::ServerState;
use crate::server::RestServer;

/// The services the factory can assemble.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    #[default]
    PredictionRest,
    PredictionRpc,
    RecommendationRest,
    ExtensionRest,
}

impl ServiceKind {
    /// The artifact capability this service kind requires.
    pub fn artifact_kind(self) -> ArtifactKind {
        match self {
            ServiceKind::PredictionRest | ServiceKind::PredictionRpc => ArtifactKind::Pipeline,
            ServiceKind::RecommendationRest => ArtifactKind::Recommender,
            ServiceKind::ExtensionRest => ArtifactKind::Extension,
        }
    }
}

/// Top-level assembly point wiring artifact, cache, and transport together.
pub struct ServiceFactory {
    loader: Arc<dyn ArtifactLoader>,
    data_handler: Arc<dyn DataHandler>,
}

impl ServiceFactory {
    pub fn new() -> Self {
        Self {
            loader: Arc::new(FsLoader::new()),
            data_handler: Arc::new(DefaultDataHandler),
        }
    }

    /// Substitute the artifact loader (e.g. a remote-store loader).
    pub fn with_loader(mut self, loader: Arc<dyn ArtifactLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Substitute the RPC data handler for custom tensor/feature formats.
    pub fn with_data_handler(mut self, handler: Arc<dyn DataHandler>) -> Self {
        self.data_handler = handler;
        self
    }

    /// Load the artifact and construct the service for `kind`.
    ///
    /// Loader failure aborts assembly with [`Error::ArtifactLoad`]; no
    /// partial service is returned and no port is touched.
    pub async fn build(&self, kind: ServiceKind, settings: Settings) -> Result<Service> {
        let credentials = settings.get_credentials();
        let handle = self
            .loader
            .load(&settings.artifact.location, credentials.as_ref())
            .await?;

        if handle.kind() != kind.artifact_kind() {
            return Err(Error::ArtifactLoad(format!(
                "artifact at '{}' provides a {:?} capability, but a {:?} service requires {:?}",
                settings.artifact.location,
                handle.kind(),
                kind,
                kind.artifact_kind(),
            )));
        }

        let handle = match &settings.artifact.name {
            Some(name) => handle.with_name(name.clone()),
            None => handle,
        };
        let artifact = Arc::new(handle);
        info!(model = artifact.name(), kind = ?kind, "artifact loaded");

        let addr = settings.server.listen_addr()?;
        match kind {
            ServiceKind::PredictionRpc => Ok(Service::Rpc(RpcServer::new(
                artifact,
                Arc::clone(&self.data_handler),
                settings.rpc.workers,
                addr,
            ))),
            ServiceKind::PredictionRest
            | ServiceKind::RecommendationRest
            | ServiceKind::ExtensionRest => {
                let cache = match (kind, &settings.cache.servers) {
                    (ServiceKind::RecommendationRest, Some(_)) => {
                        let pool = CachePool::connect(&settings.cache)?;
                        info!(pool_size = pool.size(), "cache pool constructed");
                        Some(Arc::new(pool))
                    }
                    _ => None,
                };
                let state = ServerState::new(artifact, cache, settings.cache.ttl());
                Ok(Service::Rest(RestServer::new(state, addr)))
            }
        }
    }
}

impl Default for ServiceFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// A constructed, not-yet-running service.
pub enum Service {
    Rest(RestServer),
    Rpc(RpcServer),
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Rest(_) => f.debug_tuple("Rest").finish(),
            Service::Rpc(_) => f.debug_tuple("Rpc").finish(),
        }
    }
}

impl Service {
    /// Bind and begin serving.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        match self {
            Service::Rest(server) => server.start().await,
            Service::Rpc(server) => server.start().await,
        }
    }

    /// Stop accepting, drain up to `grace`, then force-terminate.
    pub async fn stop(&mut self, grace: Duration) -> Result<()> {
        match self {
            Service::Rest(server) => server.stop(grace).await,
            Service::Rpc(server) => server.stop(grace).await,
        }
    }

    /// The bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Service::Rest(server) => server.local_addr(),
            Service::Rpc(server) => server.local_addr(),
        }
    }

    /// Serve until an interrupt signal arrives, then drain and stop.
    pub async fn run_until_interrupt(mut self, grace: Duration) -> Result<()> {
        self.start().await?;
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| Error::Transport(format!("failed to listen for interrupt: {}", e)))?;
        info!("interrupt received, draining");
        self.stop(grace).await
    }
}
