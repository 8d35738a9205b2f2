//! gRPC serving of a loaded prediction artifact.
//!
//! One unary method, `Inference/Classify`, dispatched onto a fixed-size
//! worker pool. A failed call always produces an error reply; the
//! connection is never dropped on a per-call failure.

pub mod handler;

pub mod proto {
    tonic::include_proto!("modelgate");
}

use proto::inference_server::{Inference, InferenceServer};
use proto::{ClassificationReply, ClassificationRequest};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::artifact::ArtifactHandle;
use crate::error::{Error, Result};
use handler::DataHandler;

/// The gRPC inference service: decode, invoke, encode.
pub struct InferenceService {
    artifact: Arc<ArtifactHandle>,
    handler: Arc<dyn DataHandler>,
    workers: Semaphore,
}

impl InferenceService {
    pub fn new(
        artifact: Arc<ArtifactHandle>,
        handler: Arc<dyn DataHandler>,
        workers: usize,
    ) -> Self {
        Self {
            artifact,
            handler,
            workers: Semaphore::new(workers),
        }
    }
}

#[tonic::async_trait]
impl Inference for InferenceService {
    async fn classify(
        &self,
        request: Request<ClassificationRequest>,
    ) -> std::result::Result<Response<ClassificationReply>, Status> {
        // Worker pool: at most `workers` calls run the artifact concurrently;
        // excess calls queue here.
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|_| Status::unavailable("service shutting down"))?;

        let request = request.into_inner();
        let features = self.handler.decode(&request).map_err(Status::from)?;

        let artifact = Arc::clone(&self.artifact);
        let output = tokio::task::spawn_blocking(move || artifact.predict(&features))
            .await
            .map_err(|e| Status::internal(format!("worker failed: {}", e)))?
            .map_err(Status::from)?;

        let reply = self
            .handler
            .encode(self.artifact.name(), output)
            .map_err(Status::from)?;
        Ok(Response::new(reply))
    }
}

/// A constructed RPC server.
///
/// `start` binds the port and begins accepting; `stop` cancels the accept
/// loop, lets in-flight calls drain up to the grace deadline, then
/// force-terminates.
pub struct RpcServer {
    artifact: Arc<ArtifactHandle>,
    handler: Arc<dyn DataHandler>,
    workers: usize,
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
    local_addr: Option<SocketAddr>,
}

impl RpcServer {
    pub fn new(
        artifact: Arc<ArtifactHandle>,
        handler: Arc<dyn DataHandler>,
        workers: usize,
        addr: SocketAddr,
    ) -> Self {
        Self {
            artifact,
            handler,
            workers,
            addr,
            shutdown: CancellationToken::new(),
            task: None,
            local_addr: None,
        }
    }

    /// Bind the port and begin accepting calls.
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

        let service = InferenceService::new(
            Arc::clone(&self.artifact),
            Arc::clone(&self.handler),
            self.workers,
        );
        let token = self.shutdown.clone();
        info!(
            addr = %local_addr,
            model = self.artifact.name(),
            workers = self.workers,
            "RPC server listening"
        );

        self.task = Some(tokio::spawn(async move {
            Server::builder()
                .add_service(InferenceServer::new(service))
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    token.cancelled_owned(),
                )
                .await
                .map_err(Error::from)
        }));

        Ok(local_addr)
    }

    /// Stop accepting new calls, drain in-flight calls up to `grace`, then
    /// force-terminate.
    pub async fn stop(&mut self, grace: Duration) -> Result<()> {
        self.shutdown.cancel();
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(Error::Transport(format!("server task failed: {}", e))),
            Err(_) => {
                warn!("drain deadline exceeded, force-terminating RPC server");
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
