//! HTTP transport for the bulk-upload endpoint.
//!
//! Each chunk is POSTed as a JSON [`ChunkPayload`](bulkload_protocol::ChunkPayload)
//! with batch metadata and a SHA-256 body checksum in headers.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use tracing::debug;

use bulkload_protocol::{ApiErrorBody, ApiResponse};

use crate::error::TransportError;
use crate::transport::{ByteProgress, Delivery, Transport};
use crate::types::Chunk;

pub const BATCH_ID_HEADER: &str = "X-Batch-Id";
pub const CHUNK_INDEX_HEADER: &str = "X-Chunk-Index";
pub const CHECKSUM_HEADER: &str = "X-Chunk-Checksum";

/// Calculates the SHA-256 checksum of `data` as lowercase hex.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Posts chunks to a single endpoint URL.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport whose requests give up after `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_chunk(
        &self,
        chunk: &Chunk,
        progress: ByteProgress<'_>,
    ) -> Result<Delivery, TransportError> {
        let body = serde_json::to_vec(&chunk.to_payload())
            .map_err(|e| TransportError::rejected(format!("could not encode chunk: {e}")))?;
        let len = body.len() as u64;
        let checksum = checksum_bytes(&body);

        progress(0, len);

        let resp = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(BATCH_ID_HEADER, chunk.batch_id.as_str())
            .header(CHUNK_INDEX_HEADER, chunk.index.to_string())
            .header(CHECKSUM_HEADER, checksum)
            .body(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(request_error)?;
        debug!(chunk = chunk.index, status = status.as_u16(), "endpoint replied");

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let message = read_ack(&text)?;
        progress(len, len);
        Ok(Delivery {
            bytes_sent: len,
            message,
        })
    }
}

impl Transport for HttpTransport {
    fn transmit<'a>(
        &'a self,
        chunk: &'a Chunk,
        progress: ByteProgress<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Delivery, TransportError>> + Send + 'a>> {
        Box::pin(self.post_chunk(chunk, progress))
    }
}

fn request_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::timeout(e.to_string())
    } else {
        TransportError::network(e.to_string())
    }
}

/// Classifies a non-2xx reply.
fn status_error(status: StatusCode, body: &str) -> TransportError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.best_message().map(str::to_owned))
        .unwrap_or_else(|| match status.canonical_reason() {
            Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
            None => format!("HTTP {}", status.as_u16()),
        });

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            TransportError::timeout(message)
        }
        s if s.is_server_error() => TransportError::server(message),
        _ => TransportError::rejected(message),
    }
}

/// Reads a 2xx body. An empty body counts as an acknowledgement.
fn read_ack(body: &str) -> Result<String, TransportError> {
    if body.trim().is_empty() {
        return Ok(String::new());
    }
    let ack: ApiResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::server(format!("unreadable acknowledgement: {e}")))?;
    if !ack.success {
        let message = if ack.message.trim().is_empty() {
            "chunk rejected by endpoint".to_string()
        } else {
            ack.message
        };
        return Err(TransportError::rejected(message));
    }
    Ok(ack.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use bulkload_protocol::{ChunkPayload, Record};
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    struct Captured {
        head: String,
        body: Vec<u8>,
    }

    /// Reads one HTTP request: headers, then `Content-Length` bytes of body.
    async fn read_request(stream: &mut TcpStream) -> Captured {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut tmp).await.unwrap();
            if n == 0 {
                break buf.len();
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        let mut body = buf[header_end..].to_vec();
        while body.len() < content_length {
            let n = stream.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&tmp[..n]);
        }

        Captured { head, body }
    }

    /// Starts a mock endpoint that answers one request with `status` and
    /// `body`, handing the captured request back through the receiver.
    async fn mock_server(
        status: u16,
        body: &str,
    ) -> (String, oneshot::Receiver<Captured>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/api/BulkUpload");
        let body = body.to_string();
        let (tx, rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let captured = read_request(&mut stream).await;
                let _ = tx.send(captured);

                let resp = format!(
                    "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, rx, handle)
    }

    fn chunk() -> Chunk {
        Chunk {
            batch_id: "batch_1_0_abcdefg".into(),
            index: 4,
            total_chunks: 9,
            records: vec![Record {
                id: "rec_1_0".into(),
                tenant_id: "acme".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
                amount: 12.5,
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            }],
        }
    }

    fn transport(url: String) -> HttpTransport {
        HttpTransport::new(url, Duration::from_secs(5)).unwrap()
    }

    async fn send(t: &HttpTransport) -> (Result<Delivery, TransportError>, Vec<(u64, u64)>) {
        let seen = Mutex::new(Vec::new());
        let on_progress = |a: u64, b: u64| seen.lock().unwrap().push((a, b));
        let chunk = chunk();
        let result = t.transmit(&chunk, &on_progress).await;
        (result, seen.into_inner().unwrap())
    }

    #[test]
    fn checksum_is_sha256_hex() {
        assert_eq!(
            checksum_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn posts_payload_with_headers() {
        let (url, rx, handle) = mock_server(
            200,
            r#"{"success":true,"message":"stored","batchId":"batch_1_0_abcdefg","chunkIndex":4}"#,
        )
        .await;
        let t = transport(url);

        let (result, progress) = send(&t).await;
        let delivery = result.unwrap();
        assert_eq!(delivery.message, "stored");

        let captured = rx.await.unwrap();
        assert!(captured.head.starts_with("POST /api/BulkUpload"));
        let head = captured.head.to_ascii_lowercase();
        assert!(head.contains("x-batch-id: batch_1_0_abcdefg"));
        assert!(head.contains("x-chunk-index: 4"));
        assert!(head.contains(&format!(
            "x-chunk-checksum: {}",
            checksum_bytes(&captured.body)
        )));

        let payload: ChunkPayload = serde_json::from_slice(&captured.body).unwrap();
        assert_eq!(payload.chunk_index, 4);
        assert_eq!(payload.total_chunks, 9);
        assert_eq!(payload.tenant_id, "acme");
        assert_eq!(payload.records.len(), 1);

        let len = captured.body.len() as u64;
        assert_eq!(delivery.bytes_sent, len);
        assert_eq!(progress, vec![(0, len), (len, len)]);

        handle.abort();
    }

    #[tokio::test]
    async fn empty_success_body_is_accepted() {
        let (url, _rx, handle) = mock_server(200, "").await;
        let (result, _) = send(&transport(url)).await;
        assert_eq!(result.unwrap().message, "");
        handle.abort();
    }

    #[tokio::test]
    async fn server_error_uses_body_message() {
        let (url, _rx, handle) =
            mock_server(500, r#"{"message":"database unavailable"}"#).await;
        let (result, progress) = send(&transport(url)).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, FailureKind::Server);
        assert_eq!(err.message, "database unavailable");
        assert_eq!(progress.len(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn client_error_is_rejected_with_status_text() {
        let (url, _rx, handle) = mock_server(400, "not json").await;
        let (result, _) = send(&transport(url)).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, FailureKind::Rejected);
        assert_eq!(err.message, "HTTP 400 Bad Request");
        handle.abort();
    }

    #[tokio::test]
    async fn gateway_timeout_is_a_timeout() {
        let (url, _rx, handle) = mock_server(504, r#"{"title":"upstream slow"}"#).await;
        let (result, _) = send(&transport(url)).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
        assert_eq!(err.message, "upstream slow");
        handle.abort();
    }

    #[tokio::test]
    async fn success_false_is_rejected() {
        let (url, _rx, handle) =
            mock_server(200, r#"{"success":false,"message":"duplicate batch"}"#).await;
        let (result, _) = send(&transport(url)).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, FailureKind::Rejected);
        assert_eq!(err.message, "duplicate batch");
        handle.abort();
    }

    #[tokio::test]
    async fn unreadable_ack_is_a_server_error() {
        let (url, _rx, handle) = mock_server(200, "<html>ok</html>").await;
        let (result, _) = send(&transport(url)).await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Server);
        handle.abort();
    }

    #[tokio::test]
    async fn silent_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let _ = read_request(&mut stream).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });

        let t = HttpTransport::new(format!("http://127.0.0.1:{port}/"), Duration::from_millis(200))
            .unwrap();
        let (result, _) = send(&t).await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Timeout);
        handle.abort();
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (result, _) = send(&transport(format!("http://127.0.0.1:{port}/"))).await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Network);
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            status_error(StatusCode::REQUEST_TIMEOUT, "").kind,
            FailureKind::Timeout
        );
        assert_eq!(
            status_error(StatusCode::BAD_GATEWAY, "").kind,
            FailureKind::Server
        );
        assert_eq!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, r#"{"error":"bad amount"}"#).message,
            "bad amount"
        );
    }
}
