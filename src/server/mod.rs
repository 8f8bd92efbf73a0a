//! Local daemon hosting the retrieval engine behind a Unix socket.

pub mod protocol;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Notify, RwLock};

use crate::error::{AppError, DaemonError};
use crate::models::{Config, QueryResponse};
use crate::server::protocol::{
    ClearedResponse, Request, Response, StatusResponse, UploadResponse, encode_response,
    read_frame,
};
use crate::services::answer::{SharedSynthesizer, answer_or_apology, create_synthesizer};
use crate::services::embedding::{SharedProvider, create_provider};
use crate::services::metrics::{MetricsStore, RequestKind};
use crate::services::retrieval::RetrievalOrchestrator;

/// State shared by every connection task.
struct ServerState {
    config: Config,
    engine: RetrievalOrchestrator,
    synthesizer: SharedSynthesizer,
    metrics: Option<Mutex<MetricsStore>>,
    started: Instant,
    last_request: RwLock<Instant>,
    requests_served: AtomicU64,
    shutdown: Notify,
}

pub struct DaemonServer {
    socket_path: PathBuf,
    pid_path: PathBuf,
    state: Arc<ServerState>,
}

impl DaemonServer {
    pub fn new(config: Config) -> Result<Self, AppError> {
        config.validate()?;

        let provider = create_provider(&config.embedding)?;
        tracing::info!(
            provider = provider.name(),
            dimension = provider.dimension(),
            "embedding provider bound"
        );

        let synthesizer = create_synthesizer(&config)?;
        let metrics = open_metrics(&config);

        Ok(Self::with_components(config, provider, synthesizer, metrics))
    }

    pub fn with_components(
        config: Config,
        provider: SharedProvider,
        synthesizer: SharedSynthesizer,
        metrics: Option<MetricsStore>,
    ) -> Self {
        let engine = RetrievalOrchestrator::new(provider, &config.chunking, &config.retrieval);
        let now = Instant::now();
        Self {
            socket_path: config.socket_path(),
            pid_path: config.pid_path(),
            state: Arc::new(ServerState {
                config,
                engine,
                synthesizer,
                metrics: metrics.map(Mutex::new),
                started: now,
                last_request: RwLock::new(now),
                requests_served: AtomicU64::new(0),
                shutdown: Notify::new(),
            }),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn run(&self) -> Result<(), std::io::Error> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        std::fs::write(&self.pid_path, std::process::id().to_string())?;

        let idle_timeout = self.state.config.daemon.idle_timeout_secs;
        tracing::info!(
            socket = %self.socket_path.display(),
            idle_timeout_secs = idle_timeout,
            "daemon listening"
        );

        let idle_timeout = (idle_timeout > 0).then(|| Duration::from_secs(idle_timeout));
        let check_interval = Duration::from_secs(10);

        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let state = Arc::clone(&self.state);
                            tokio::spawn(async move {
                                if let Err(e) = state.handle_connection(stream).await {
                                    tracing::debug!(error = %e, "connection closed with error");
                                }
                            });
                        }
                        Err(e) => tracing::warn!(error = %e, "accept failed"),
                    }
                }
                _ = self.state.shutdown.notified() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(check_interval) => {
                    if let Some(timeout) = idle_timeout
                        && self.state.last_request.read().await.elapsed() > timeout
                    {
                        tracing::info!("idle timeout reached, shutting down");
                        break;
                    }
                }
                _ = terminate.recv() => {
                    tracing::info!("received SIGTERM, shutting down");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received SIGINT, shutting down");
                    break;
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.socket_path);
        let _ = std::fs::remove_file(&self.pid_path);
        tracing::info!("daemon stopped");
    }
}

impl ServerState {
    async fn handle_connection(&self, mut stream: UnixStream) -> Result<(), DaemonError> {
        while let Some(payload) = read_frame(&mut stream).await? {
            *self.last_request.write().await = Instant::now();

            let response = match serde_json::from_slice::<Request>(&payload) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => Response::error("invalid_request", format!("invalid request: {}", e)),
            };
            self.requests_served.fetch_add(1, Ordering::Relaxed);

            let frame = encode_response(&response)?;
            stream
                .write_all(&frame)
                .await
                .map_err(|e| DaemonError::SocketError(e.to_string()))?;

            if matches!(response, Response::ShutdownAck) {
                self.shutdown.notify_one();
                break;
            }
        }
        Ok(())
    }

    async fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::Shutdown => Response::ShutdownAck,

            Request::Status => Response::Status(self.status().await),

            Request::Upload(req) => {
                let start = Instant::now();
                let result = self.engine.ingest_file(Path::new(&req.path)).await;
                self.record(RequestKind::Upload, start, result.is_ok());
                match result {
                    Ok(ingested) => Response::Upload(UploadResponse {
                        message: "Document uploaded and processed successfully".to_string(),
                        filename: ingested.filename,
                        chunks_created: ingested.chunks_created,
                        status: "success".to_string(),
                    }),
                    Err(e) => {
                        tracing::warn!(path = %req.path, kind = e.kind(), error = %e, "upload failed");
                        e.into()
                    }
                }
            }

            Request::Query(req) => {
                let start = Instant::now();
                let result = self.engine.query(&req.query, req.k).await;
                let response = match result {
                    Ok(retrieved) => {
                        let answer = answer_or_apology(
                            self.synthesizer.as_ref(),
                            &req.query,
                            &retrieved.context,
                            retrieved.sources.len(),
                        )
                        .await;
                        Response::Query(QueryResponse {
                            query: req.query,
                            context: retrieved.context,
                            answer,
                            sources: retrieved.sources,
                        })
                    }
                    Err(e) => e.into(),
                };
                self.record(RequestKind::Query, start, !matches!(response, Response::Error(_)));
                response
            }

            Request::ListDocuments => Response::Documents(self.engine.documents().await),

            Request::Clear => {
                let start = Instant::now();
                self.engine.clear().await;
                self.record(RequestKind::Clear, start, true);
                Response::Cleared(ClearedResponse {
                    message: "All documents cleared successfully".to_string(),
                })
            }
        }
    }

    async fn status(&self) -> StatusResponse {
        let index = self.engine.status().await;
        let idle_secs = self.last_request.read().await.elapsed().as_secs();
        let metrics = self.metrics.as_ref().and_then(|m| {
            m.lock()
                .ok()
                .map(|store| store.get_summary(self.config.metrics.retention_days))
        });

        StatusResponse {
            running: true,
            provider: index.provider,
            dimension: index.dimension,
            answer_synthesizer: self.synthesizer.name().to_string(),
            vector_store: index.vector_store,
            documents: index.documents,
            passages: index.passages,
            uptime_secs: self.started.elapsed().as_secs(),
            idle_secs,
            requests_served: self.requests_served.load(Ordering::Relaxed),
            metrics,
        }
    }

    fn record(&self, kind: RequestKind, start: Instant, success: bool) {
        if let Some(metrics) = &self.metrics
            && let Ok(store) = metrics.lock()
        {
            store.record(kind, start.elapsed().as_millis() as u64, success);
        }
    }
}

fn open_metrics(config: &Config) -> Option<MetricsStore> {
    if !config.metrics.enabled {
        return None;
    }
    let path = Config::metrics_db_path()?;
    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        tracing::warn!(error = %e, "failed to create metrics directory");
        return None;
    }

    match MetricsStore::open(&path) {
        Ok(store) => {
            let removed = store.cleanup(config.metrics.retention_days);
            tracing::info!(
                retention_days = config.metrics.retention_days,
                purged = removed,
                "metrics enabled"
            );
            Some(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to open metrics database");
            None
        }
    }
}

pub async fn run_daemon(config: Config) -> Result<(), AppError> {
    let server = DaemonServer::new(config)?;
    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::protocol::{QueryRequest, UploadRequest, read_message, write_message};
    use crate::services::answer::StubSynthesizer;
    use crate::services::embedding::mock::MockProvider;

    fn server(socket: PathBuf) -> DaemonServer {
        let mut config = Config::default();
        config.daemon.socket_path = Some(socket);
        DaemonServer::with_components(
            config,
            MockProvider::shared(64),
            Arc::new(StubSynthesizer),
            MetricsStore::open_in_memory().ok(),
        )
    }

    #[tokio::test]
    async fn test_query_before_upload_is_no_index() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path().join("d.sock"));

        let response = server
            .state
            .handle_request(Request::Query(QueryRequest {
                query: "What is AI?".to_string(),
                k: None,
            }))
            .await;
        match response {
            Response::Error(e) => assert_eq!(e.kind, "no_index"),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_query_list_clear() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("ai.txt");
        std::fs::write(&doc, "Artificial intelligence is a field of computer science.").unwrap();
        let server = server(dir.path().join("d.sock"));
        let state = &server.state;

        let response = state
            .handle_request(Request::Upload(UploadRequest {
                path: doc.to_string_lossy().to_string(),
            }))
            .await;
        match response {
            Response::Upload(r) => {
                assert_eq!(r.filename, "ai.txt");
                assert_eq!(r.chunks_created, 1);
                assert_eq!(r.status, "success");
            }
            other => panic!("unexpected response: {other:?}"),
        }

        let response = state
            .handle_request(Request::Query(QueryRequest {
                query: "What is AI?".to_string(),
                k: Some(1),
            }))
            .await;
        match response {
            Response::Query(r) => {
                assert_eq!(r.sources.len(), 1);
                assert!(r.answer.contains("I found 1 relevant sections"));
                assert!(r.context.starts_with("[Source: ai.txt]"));
            }
            other => panic!("unexpected response: {other:?}"),
        }

        match state.handle_request(Request::ListDocuments).await {
            Response::Documents(list) => assert_eq!(list.total_documents, 1),
            other => panic!("unexpected response: {other:?}"),
        }

        match state.handle_request(Request::Status).await {
            Response::Status(s) => {
                assert_eq!(s.vector_store, "ready");
                assert_eq!(s.passages, 1);
                let metrics = s.metrics.unwrap();
                assert_eq!(metrics.uploads, 1);
                assert_eq!(metrics.queries, 1);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        assert!(matches!(
            state.handle_request(Request::Clear).await,
            Response::Cleared(_)
        ));
        match state.handle_request(Request::Status).await {
            Response::Status(s) => assert_eq!(s.vector_store, "empty"),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsupported_upload() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("photo.png");
        std::fs::write(&image, [0u8; 8]).unwrap();
        let server = server(dir.path().join("d.sock"));

        match server
            .state
            .handle_request(Request::Upload(UploadRequest {
                path: image.to_string_lossy().to_string(),
            }))
            .await
        {
            Response::Error(e) => {
                assert_eq!(e.kind, "unsupported_format");
                assert!(e.message.contains("Supported: .pdf, .docx, .txt"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_serves_over_socket_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("d.sock");
        let server = server(socket.clone());
        let pid_path = socket.with_extension("pid");

        let handle = tokio::spawn(async move { server.run().await });

        let mut stream = None;
        for _ in 0..100 {
            if let Ok(s) = UnixStream::connect(&socket).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let mut stream = stream.expect("daemon did not start");
        assert!(pid_path.exists());

        write_message(&mut stream, &Request::Ping).await.unwrap();
        let response: Option<Response> = read_message(&mut stream).await.unwrap();
        assert!(matches!(response, Some(Response::Pong)));

        write_message(&mut stream, &Request::Shutdown).await.unwrap();
        let response: Option<Response> = read_message(&mut stream).await.unwrap();
        assert!(matches!(response, Some(Response::ShutdownAck)));

        handle.await.unwrap().unwrap();
        assert!(!socket.exists());
        assert!(!pid_path.exists());
    }
}
