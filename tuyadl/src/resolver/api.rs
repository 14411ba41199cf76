use crate::payload::Credentials;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Doorbell snapshot signing endpoint. `{device_id}` is substituted.
pub const SIGNED_URL_PATH: &str = "/v1.0/devices/{device_id}/doorbells/pic-url";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("api request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("api responded with HTTP {}: {body}", .status.as_u16())]
    Status { status: StatusCode, body: String },

    #[error("api rejected the request: {0}")]
    Rejected(String),

    #[error("invalid api url: {0}")]
    InvalidUrl(String),
}

/// Everything the platform needs to locate one stored file.
#[derive(Clone, Copy, Debug)]
pub struct FileRequest<'a> {
    pub credentials: &'a Credentials,
    pub device_id: &'a str,
    pub bucket: &'a str,
    pub file_path: &'a str,
}

/// Platform calls that turn a stored file into a downloadable url.
///
/// `Ok(None)` means the platform answered but had no url to give.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn signed_url(&self, request: &FileRequest<'_>) -> Result<Option<String>, ApiError>;
    async fn file_url(&self, request: &FileRequest<'_>) -> Result<Option<String>, ApiError>;
}

#[derive(Serialize)]
struct FileBody<'a> {
    bucket: &'a str,
    #[serde(rename = "filePath")]
    file_path: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    success: Option<bool>,
    msg: Option<String>,
    result: Option<ApiResult>,
}

#[derive(Deserialize)]
struct ApiResult {
    url: Option<String>,
}

/// [`CloudApi`] over plain HTTP.
///
/// Request signing is not done here: the opaque [`Credentials`] are sent as-is as request
/// headers, so they must already carry whatever the gateway expects.
#[derive(Clone, Debug)]
pub struct HttpCloudApi {
    client: Client,
    base_url: Url,
    signed_url_path: String,
    file_url_path: Option<String>,
}

impl HttpCloudApi {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            signed_url_path: SIGNED_URL_PATH.to_owned(),
            file_url_path: None,
        }
    }

    pub fn signed_url_path<T: Into<String>>(mut self, path: T) -> Self {
        self.signed_url_path = path.into();
        self
    }

    /// Enable [`CloudApi::file_url`]. Without a path it always answers `Ok(None)`.
    pub fn file_url_path<T: Into<String>>(mut self, path: T) -> Self {
        self.file_url_path = Some(path.into());
        self
    }

    async fn request_url(
        &self,
        path: &str,
        request: &FileRequest<'_>,
    ) -> Result<Option<String>, ApiError> {
        let url = self
            .base_url
            .join(&path.replace("{device_id}", request.device_id))
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        debug!("POST {}", url);

        let mut builder = self.client.post(url).json(&FileBody {
            bucket: request.bucket,
            file_path: request.file_path,
        });

        for (key, value) in request.credentials.headers() {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();

        if status.is_client_error() || status.is_server_error() {
            return Err(ApiError::Status {
                status,
                body: response.text().await?,
            });
        }

        let response = response.json::<ApiResponse>().await?;

        if response.success == Some(false) {
            return Err(ApiError::Rejected(
                response.msg.unwrap_or_else(|| "unknown error".to_owned()),
            ));
        }

        Ok(response.result.and_then(|x| x.url))
    }
}

#[async_trait]
impl CloudApi for HttpCloudApi {
    async fn signed_url(&self, request: &FileRequest<'_>) -> Result<Option<String>, ApiError> {
        self.request_url(&self.signed_url_path, request).await
    }

    async fn file_url(&self, request: &FileRequest<'_>) -> Result<Option<String>, ApiError> {
        match &self.file_url_path {
            Some(path) => self.request_url(path, request).await,
            None => Ok(None),
        }
    }
}
