//! HTTP client for proxy-API calls, size probes and streamed transfers

use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_LENGTH, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::AcquireError;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("Body of {declared} bytes exceeds ceiling of {ceiling} bytes")]
    TooLarge { declared: u64, ceiling: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HttpError>;

impl From<HttpError> for AcquireError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout(after) => AcquireError::Timeout(after),
            HttpError::TooLarge { declared, ceiling } => {
                AcquireError::SizeLimitExceeded { declared, ceiling }
            }
            HttpError::Io(e) => AcquireError::Io(e),
            other => AcquireError::UpstreamUnavailable(other.to_string()),
        }
    }
}

/// Shared reqwest client with browser-like defaults
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    read_timeout: Duration,
    chunk_size: usize,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let read_timeout = Duration::from_secs(config.read_timeout_secs);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(read_timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HttpError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            read_timeout,
            chunk_size: usize::try_from(config.chunk_size.as_u64()).unwrap_or(usize::MAX),
        })
    }

    /// GET `url` with query parameters and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(String, String)],
    ) -> Result<T> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        serde_json::from_slice(&body).map_err(|e| HttpError::InvalidBody(e.to_string()))
    }

    /// Header-only probe; returns the declared length when the server sends one
    pub async fn probe_length(&self, url: &str) -> Result<Option<u64>> {
        let request = self.client.head(url).header(ACCEPT_ENCODING, "identity");
        let response = self.send(request).await?;

        // reqwest reports a zero body size for HEAD, so read the header itself
        let declared = declared_length(&response);
        debug!(url, ?declared, "Probed remote size");
        Ok(declared)
    }

    /// Fetch a small body fully into memory
    pub async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        let response = self.send(self.client.get(url)).await?;
        response.bytes().await.map_err(|e| self.map_reqwest(e))
    }

    /// Stream `url` into `path`, refusing bodies above `ceiling`.
    ///
    /// Returns the number of bytes written. The caller owns `path` and is
    /// responsible for removing it when this fails.
    pub async fn stream_to_file(&self, url: &str, path: &Path, ceiling: Option<u64>) -> Result<u64> {
        debug!(url, path = %path.display(), "Starting transfer");

        let request = self.client.get(url).header(ACCEPT_ENCODING, "identity");
        let response = self.send(request).await?;

        if let (Some(declared), Some(ceiling)) = (declared_length(&response), ceiling) {
            if declared > ceiling {
                return Err(HttpError::TooLarge { declared, ceiling });
            }
        }

        let file = File::create(path).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_reqwest(e))?;
            written += chunk.len() as u64;
            if let Some(ceiling) = ceiling {
                if written > ceiling {
                    return Err(HttpError::TooLarge {
                        declared: written,
                        ceiling,
                    });
                }
            }
            writer.write_all(&chunk).await?;
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        debug!(url, bytes = written, "Transfer completed");
        Ok(written)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| self.map_reqwest(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16()));
        }

        Ok(response)
    }

    fn map_reqwest(&self, e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout(self.read_timeout)
        } else if e.is_redirect() {
            HttpError::TooManyRedirects
        } else {
            HttpError::RequestFailed(e.to_string())
        }
    }
}

fn declared_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::header, routing::get};
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_error_mapping_into_taxonomy() {
        let mapped: AcquireError = HttpError::TooLarge {
            declared: 10,
            ceiling: 5,
        }
        .into();
        assert!(matches!(
            mapped,
            AcquireError::SizeLimitExceeded {
                declared: 10,
                ceiling: 5
            }
        ));

        let mapped: AcquireError = HttpError::Status(503).into();
        assert!(matches!(mapped, AcquireError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_stream_to_file_writes_body() {
        let base = serve(Router::new().route("/file", get(|| async { "hello media" }))).await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.part");

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let written = client
            .stream_to_file(&format!("{}/file", base), &path, None)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello media");
    }

    #[tokio::test]
    async fn test_stream_to_file_enforces_ceiling() {
        let base = serve(Router::new().route("/file", get(|| async { "0123456789" }))).await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.part");

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let result = client
            .stream_to_file(&format!("{}/file", base), &path, Some(4))
            .await;

        assert!(matches!(result, Err(HttpError::TooLarge { ceiling: 4, .. })));
    }

    #[tokio::test]
    async fn test_probe_length_reads_header() {
        let app = Router::new().route(
            "/big",
            get(|| async { "x" }).head(|| async { [(header::CONTENT_LENGTH, "629145600")] }),
        );
        let base = serve(app).await;

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let declared = client.probe_length(&format!("{}/big", base)).await.unwrap();
        assert_eq!(declared, Some(629_145_600));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let app = Router::new().route(
            "/gone",
            get(|| async { (axum::http::StatusCode::NOT_FOUND, "nope") }),
        );
        let base = serve(app).await;

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let result = client.fetch_bytes(&format!("{}/gone", base)).await;
        assert!(matches!(result, Err(HttpError::Status(404))));
    }
}
