//! HTTP client abstraction used by the aggregator.
//!
//! The aggregator only needs `GET url` and the response status, so the seam
//! is deliberately small. [`ReqwestClient`] is the default implementation;
//! tests substitute in-memory fakes.

use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// A failed fetch. Failures never reach the tally.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The response body could not be read to the end.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// A received HTTP response.
pub trait FetchResponse: Send + 'static {
    /// Numeric status code.
    fn status(&self) -> u16;

    /// Read the body to the end and release the connection.
    ///
    /// Returns the number of bytes discarded.
    fn drain(self) -> impl Future<Output = Result<u64, FetchError>> + Send;
}

/// The `GET` capability the aggregator depends on.
pub trait HttpClient: Send + Sync + 'static {
    /// Response type produced by this client.
    type Response: FetchResponse;

    /// Issue a `GET` request for `url`.
    fn get(&self, url: &str) -> impl Future<Output = Result<Self::Response, FetchError>> + Send;
}

/// Default request timeout for [`ReqwestClient::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `User-Agent` sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("statustally/", env!("CARGO_PKG_VERSION"));

/// Production HTTP client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a client with the default timeout and user agent.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_settings(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a client with a custom per-request timeout and `User-Agent`.
    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured reqwest client.
    #[allow(dead_code)] // For callers that configure the transport themselves
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl FetchResponse for reqwest::Response {
    fn status(&self) -> u16 {
        reqwest::Response::status(self).as_u16()
    }

    async fn drain(self) -> Result<u64, FetchError> {
        let mut body = self.bytes_stream();
        let mut discarded = 0u64;
        while let Some(chunk) = body.next().await {
            discarded += chunk?.len() as u64;
        }
        Ok(discarded)
    }
}

impl HttpClient for ReqwestClient {
    type Response = reqwest::Response;

    async fn get(&self, url: &str) -> Result<Self::Response, FetchError> {
        Ok(self.client.get(url).send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}/", addr)
    }

    /// Accept one request, answer 200 and hand back the raw request head.
    async fn serve_capturing() -> (String, tokio::sync::oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            socket.shutdown().await.ok();
        });

        (format!("http://{}/", addr), rx)
    }

    fn local_client() -> ReqwestClient {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        ReqwestClient::from_client(client)
    }

    #[tokio::test]
    async fn test_reqwest_client_reports_status_and_drains() {
        let url = serve_once("404 Not Found", "missing").await;
        let client = local_client();

        let response = tokio_test::assert_ok!(client.get(&url).await);
        assert_eq!(FetchResponse::status(&response), 404);

        let drained = tokio_test::assert_ok!(response.drain().await);
        assert_eq!(drained, 7);
    }

    #[tokio::test]
    async fn test_reqwest_client_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = local_client();
        let err = tokio_test::assert_err!(client.get(&format!("http://{}/", addr)).await);
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn test_reqwest_client_sends_configured_user_agent() {
        let (url, request) = serve_capturing().await;
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .user_agent("tally-check/1.0")
            .build()
            .unwrap();
        let client = ReqwestClient::from_client(client);

        let response = tokio_test::assert_ok!(client.get(&url).await);
        assert_eq!(FetchResponse::status(&response), 200);

        let request = request.await.unwrap().to_ascii_lowercase();
        assert!(request.contains("user-agent: tally-check/1.0"), "{}", request);
    }

    #[test]
    fn test_default_client_builds() {
        assert!(ReqwestClient::new().is_ok());
        assert!(ReqwestClient::with_settings(Duration::from_secs(1), "custom/2.0").is_ok());
        assert!(DEFAULT_USER_AGENT.starts_with("statustally/"));
    }
}
