//! Wire format between the CLI and the daemon: a 4-byte big-endian length
//! followed by one JSON document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{DaemonError, RetrievalError};
use crate::models::{DocumentList, QueryResponse};
use crate::services::MetricsSummary;

/// Frames larger than this close the connection.
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Shutdown,
    Status,
    Upload(UploadRequest),
    Query(QueryRequest),
    ListDocuments,
    Clear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Path readable by the daemon process.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    ShutdownAck,
    Status(StatusResponse),
    Upload(UploadResponse),
    Query(QueryResponse),
    Documents(DocumentList),
    Cleared(ClearedResponse),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub provider: String,
    pub dimension: usize,
    pub answer_synthesizer: String,
    /// `ready` or `empty`
    pub vector_store: String,
    pub documents: usize,
    pub passages: usize,
    pub uptime_secs: u64,
    pub idle_secs: u64,
    pub requests_served: u64,
    pub metrics: Option<MetricsSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub chunks_created: usize,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearedResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable kind, e.g. `no_index`
    pub kind: String,
    pub message: String,
}

impl Response {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error(ErrorResponse {
            kind: kind.into(),
            message: message.into(),
        })
    }
}

impl From<RetrievalError> for Response {
    fn from(error: RetrievalError) -> Self {
        Response::error(error.kind(), error.to_string())
    }
}

pub fn encode_message(msg: &impl Serialize) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(msg)?;
    let len = (json.len() as u32).to_be_bytes();
    let mut buf = Vec::with_capacity(4 + json.len());
    buf.extend_from_slice(&len);
    buf.extend_from_slice(&json);
    Ok(buf)
}

/// Encode a response, replacing it with a `response_too_large` error when it
/// would not fit in one frame.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, DaemonError> {
    let encoded = encode_message(response).map_err(|e| DaemonError::ProtocolError(e.to_string()))?;
    let len = encoded.len() - 4;
    if len <= MAX_MESSAGE_SIZE {
        return Ok(encoded);
    }

    let fallback = Response::error(
        "response_too_large",
        format!(
            "response of {} bytes exceeds the {} byte limit; retry with a smaller k",
            len, MAX_MESSAGE_SIZE
        ),
    );
    encode_message(&fallback).map_err(|e| DaemonError::ProtocolError(e.to_string()))
}

pub fn decode_length(buf: &[u8; 4]) -> usize {
    u32::from_be_bytes(*buf) as usize
}

/// Read one frame's payload. `Ok(None)` means the peer closed the stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, DaemonError> {
    let mut len_buf = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut len_buf).await {
        return match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Ok(None),
            _ => Err(DaemonError::SocketError(e.to_string())),
        };
    }

    let len = decode_length(&len_buf);
    if len > MAX_MESSAGE_SIZE {
        return Err(DaemonError::ProtocolError(format!(
            "message of {} bytes exceeds limit of {}",
            len, MAX_MESSAGE_SIZE
        )));
    }

    let mut msg_buf = vec![0u8; len];
    reader
        .read_exact(&mut msg_buf)
        .await
        .map_err(|e| DaemonError::SocketError(e.to_string()))?;
    Ok(Some(msg_buf))
}

/// Read and decode one message. `Ok(None)` means the peer closed the stream.
pub async fn read_message<T, R>(reader: &mut R) -> Result<Option<T>, DaemonError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    match read_frame(reader).await? {
        Some(payload) => serde_json::from_slice(&payload)
            .map(Some)
            .map_err(|e| DaemonError::ProtocolError(e.to_string())),
        None => Ok(None),
    }
}

pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &impl Serialize,
) -> Result<(), DaemonError> {
    let encoded = encode_message(msg).map_err(|e| DaemonError::ProtocolError(e.to_string()))?;
    if encoded.len() - 4 > MAX_MESSAGE_SIZE {
        return Err(DaemonError::ProtocolError(format!(
            "message of {} bytes exceeds limit of {}",
            encoded.len() - 4,
            MAX_MESSAGE_SIZE
        )));
    }
    writer
        .write_all(&encoded)
        .await
        .map_err(|e| DaemonError::SocketError(e.to_string()))
}
