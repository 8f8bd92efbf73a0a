//! Client side of the daemon protocol.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tokio::net::UnixStream;

use crate::error::DaemonError;
use crate::models::{Config, DocumentList, QueryResponse};
use crate::server::protocol::{
    ClearedResponse, QueryRequest, Request, Response, StatusResponse, UploadRequest,
    UploadResponse, read_message, write_message,
};

pub struct DaemonClient {
    socket_path: PathBuf,
    auto_start: bool,
}

impl DaemonClient {
    pub fn new(config: &Config) -> Self {
        Self {
            socket_path: config.socket_path(),
            auto_start: config.daemon.auto_start,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_running(&self) -> bool {
        self.socket_path.exists()
            && std::os::unix::net::UnixStream::connect(&self.socket_path).is_ok()
    }

    pub async fn ensure_running(&self) -> Result<(), DaemonError> {
        if self.is_running() {
            return Ok(());
        }

        if !self.auto_start {
            return Err(DaemonError::NotRunning);
        }

        self.spawn_daemon()?;
        self.wait_for_ready().await
    }

    fn spawn_daemon(&self) -> Result<(), DaemonError> {
        let exe = std::env::current_exe().map_err(|e| DaemonError::SpawnError(e.to_string()))?;
        tracing::debug!(exe = %exe.display(), "starting daemon");

        Command::new(&exe)
            .args(["serve", "--daemon"])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| DaemonError::SpawnError(e.to_string()))?;

        Ok(())
    }

    async fn wait_for_ready(&self) -> Result<(), DaemonError> {
        let max_wait = Duration::from_secs(60);
        let check_interval = Duration::from_millis(100);
        let start = std::time::Instant::now();

        while start.elapsed() < max_wait {
            if self.is_running() && self.ping().await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(check_interval).await;
        }

        Err(DaemonError::Timeout)
    }

    async fn connect(&self) -> Result<UnixStream, DaemonError> {
        UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| DaemonError::ConnectionFailed(e.to_string()))
    }

    async fn send_request(&self, request: Request) -> Result<Response, DaemonError> {
        let mut stream = self.connect().await?;
        write_message(&mut stream, &request).await?;

        match read_message::<Response, _>(&mut stream).await? {
            Some(Response::Error(e)) => Err(DaemonError::Remote {
                kind: e.kind,
                message: e.message,
            }),
            Some(response) => Ok(response),
            None => Err(DaemonError::ProtocolError(
                "daemon closed the connection".to_string(),
            )),
        }
    }

    pub async fn ping(&self) -> Result<(), DaemonError> {
        match self.send_request(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn status(&self) -> Result<StatusResponse, DaemonError> {
        match self.send_request(Request::Status).await? {
            Response::Status(s) => Ok(s),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn shutdown(&self) -> Result<(), DaemonError> {
        match self.send_request(Request::Shutdown).await? {
            Response::ShutdownAck => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Upload a file. The path is made absolute since the daemon has its own working directory.
    pub async fn upload(&self, path: &Path) -> Result<UploadResponse, DaemonError> {
        self.ensure_running().await?;

        let absolute = std::path::absolute(path)?;
        let request = Request::Upload(UploadRequest {
            path: absolute.to_string_lossy().to_string(),
        });

        match self.send_request(request).await? {
            Response::Upload(r) => Ok(r),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn query(&self, query: &str, k: Option<usize>) -> Result<QueryResponse, DaemonError> {
        self.ensure_running().await?;

        let request = Request::Query(QueryRequest {
            query: query.to_string(),
            k,
        });

        match self.send_request(request).await? {
            Response::Query(r) => Ok(r),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn list_documents(&self) -> Result<DocumentList, DaemonError> {
        self.ensure_running().await?;

        match self.send_request(Request::ListDocuments).await? {
            Response::Documents(list) => Ok(list),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn clear(&self) -> Result<ClearedResponse, DaemonError> {
        self.ensure_running().await?;

        match self.send_request(Request::Clear).await? {
            Response::Cleared(r) => Ok(r),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> DaemonError {
    DaemonError::ProtocolError(format!("unexpected response: {:?}", response))
}

pub fn stop_daemon(config: &Config) -> Result<(), DaemonError> {
    let pid_path = config.pid_path();
    if !pid_path.exists() {
        return Err(DaemonError::NotRunning);
    }

    let pid_str = std::fs::read_to_string(&pid_path)?;
    let pid: i32 = pid_str
        .trim()
        .parse()
        .map_err(|_| DaemonError::ProtocolError("invalid pid file".to_string()))?;

    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid), Signal::SIGTERM)
            .map_err(|e| DaemonError::SocketError(e.to_string()))?;
    }

    tracing::info!(pid, "sent SIGTERM to daemon");
    let _ = std::fs::remove_file(&pid_path);
    let _ = std::fs::remove_file(config.socket_path());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::server::DaemonServer;
    use crate::services::answer::StubSynthesizer;
    use crate::services::embedding::mock::MockProvider;

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.daemon.socket_path = Some(dir.join("docqa.sock"));
        config.daemon.auto_start = false;
        config
    }

    #[tokio::test]
    async fn test_not_running_without_auto_start() {
        let dir = tempfile::tempdir().unwrap();
        let client = DaemonClient::new(&config(dir.path()));
        assert!(!client.is_running());
        assert!(matches!(
            client.list_documents().await,
            Err(DaemonError::NotRunning)
        ));
    }

    #[test]
    fn test_stop_without_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            stop_daemon(&config(dir.path())),
            Err(DaemonError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_round_trip_against_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let doc = dir.path().join("ml.txt");
        std::fs::write(&doc, "Machine learning lets computers learn from data.").unwrap();

        let server = DaemonServer::with_components(
            config.clone(),
            MockProvider::shared(32),
            Arc::new(StubSynthesizer),
            None,
        );
        let handle = tokio::spawn(async move { server.run().await });

        let client = DaemonClient::new(&config);
        for _ in 0..100 {
            if client.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let err = client.query("machine learning", None).await.unwrap_err();
        assert!(matches!(err, DaemonError::Remote { ref kind, .. } if kind == "no_index"));

        let uploaded = client.upload(&doc).await.unwrap();
        assert_eq!(uploaded.filename, "ml.txt");

        let answer = client.query("machine learning", Some(5)).await.unwrap();
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(client.list_documents().await.unwrap().total_documents, 1);

        client.clear().await.unwrap();
        assert_eq!(client.status().await.unwrap().vector_store, "empty");

        client.shutdown().await.unwrap();
        handle.await.unwrap().unwrap();
    }
}
