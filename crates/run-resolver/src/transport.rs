//! Moving bytes from a provider into the staging directory.
//!
//! Downloads stream into `<file>.partial` and are renamed on completion, so a
//! file that exists under its final name is always whole.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use wx_common::{AccessProtocol, FailureKind, ResolveError, ResolveResult, SourceEndpoint};

/// Why a single transfer failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("empty response from {0}")]
    Empty(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Attempt-log classification.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TransportError::Timeout => FailureKind::Timeout,
            TransportError::Http { status, .. } => FailureKind::Http(*status),
            TransportError::Network(_) | TransportError::Io(_) => FailureKind::Network,
            TransportError::Empty(_) => FailureKind::Incomplete,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if let Some(status) = err.status() {
            TransportError::Http {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Fetches one endpoint into a local file.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download `endpoint` to `dest`, returning the number of bytes written.
    async fn fetch(&self, endpoint: &SourceEndpoint, dest: &Path) -> Result<u64, TransportError>;
}

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Whole-request timeout
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("wx-resolver/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// reqwest-backed transport for grib-filter subsets and whole files.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpTransportConfig) -> ResolveResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ResolveError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        path: &Path,
    ) -> Result<u64, TransportError> {
        let mut file = File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, endpoint, dest), fields(url = %endpoint.address))]
    async fn fetch(&self, endpoint: &SourceEndpoint, dest: &Path) -> Result<u64, TransportError> {
        let temp_path = partial_path(dest);

        let response = self.client.get(&endpoint.address).send().await?;
        match response.status() {
            StatusCode::OK => {}
            status => {
                return Err(TransportError::Http {
                    status: status.as_u16(),
                    url: endpoint.address.clone(),
                });
            }
        }

        // NOMADS answers a missing grib-filter file with a 200 and an HTML body
        if endpoint.protocol == AccessProtocol::GribFilter {
            let is_html = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("text/html"));
            if is_html {
                return Err(TransportError::Http {
                    status: StatusCode::NOT_FOUND.as_u16(),
                    url: endpoint.address.clone(),
                });
            }
        }

        let written = match self.stream_to_file(response, &temp_path).await {
            Ok(n) => n,
            Err(e) => {
                fs::remove_file(&temp_path).await.ok();
                return Err(e);
            }
        };

        if written == 0 {
            fs::remove_file(&temp_path).await.ok();
            return Err(TransportError::Empty(endpoint.address.clone()));
        }

        fs::rename(&temp_path, dest).await?;
        debug!(path = %dest.display(), bytes = written, "Transfer complete");
        Ok(written)
    }
}
