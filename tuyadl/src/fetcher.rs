use crate::error::{Error, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Plain binary GET.
///
/// Failures are reported as [`Error::DownloadFailed`], with the HTTP status when the server
/// answered and without one for connection level problems.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::DownloadFailed {
                status: e.status(),
                message: check_reqwest_error(url, &e),
            })?;
        let status = response.status();

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            let message = match oss_error_code(&body) {
                Some(code) => format!("{} ({})", url, code),
                None => format!("{} ({})", url, status.canonical_reason().unwrap_or("error")),
            };

            return Err(Error::DownloadFailed {
                status: Some(status),
                message,
            });
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::DownloadFailed {
                status: e.status(),
                message: check_reqwest_error(url, &e),
            })?;
        Ok(data.to_vec())
    }
}

fn check_reqwest_error(url: &str, error: &reqwest::Error) -> String {
    if error.is_connect() {
        return format!("{url} (connection error)");
    } else if error.is_timeout() {
        return format!("{url} (timeout)");
    }

    match error.status() {
        Some(StatusCode::GATEWAY_TIMEOUT) => format!("{url} (gateway timeout)"),
        Some(StatusCode::SERVICE_UNAVAILABLE) => format!("{url} (service unavailable)"),
        Some(StatusCode::TOO_MANY_REQUESTS) => format!("{url} (too many requests)"),
        _ => format!("{url} ({error})"),
    }
}

#[derive(Deserialize)]
struct OssError {
    #[serde(rename = "Code")]
    code: String,
}

/// Object storage answers errors with an XML document carrying a `<Code>` element.
fn oss_error_code(body: &str) -> Option<String> {
    quick_xml::de::from_str::<OssError>(body)
        .ok()
        .map(|x| x.code.trim().to_owned())
        .filter(|x| !x.is_empty())
}

/// Downloads an envelope and rejects anything too short to hold one.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    retries: u8,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retries: 0,
        }
    }

    /// Extra attempts after a connection level failure. HTTP errors are never retried.
    pub fn retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut attempt = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                x = self.transport.get(url) => x,
            };

            match result {
                Ok(data) => {
                    tuya_envelope::check_len(data.len())?;
                    info!("Downloaded {} bytes", data.len());
                    return Ok(data);
                }
                Err(Error::DownloadFailed {
                    status: None,
                    message,
                }) if attempt < self.retries => {
                    attempt += 1;
                    debug!("Retrying download ({}/{}): {}", attempt, self.retries, message);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
