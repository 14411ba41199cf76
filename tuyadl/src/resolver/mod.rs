//! Ordered download url resolution.
//!
//! A [`Resolver`] walks a list of [`StrategyKind`]s in order and stops at the first strategy
//! that yields a url. Api failures and empty answers are declines, never errors. Only when
//! every strategy declines does resolution fail, with all the reasons attached.

mod api;

pub use api::{ApiError, CloudApi, FileRequest, HttpCloudApi, SIGNED_URL_PATH};

use crate::{
    error::{Error, Result},
    payload::{Credentials, MediaReference},
    region::Region,
};
use log::{debug, info, warn};
use reqwest::Url;
use serde::Serialize;
use std::{fmt, str::FromStr, sync::Arc};
use tokio_util::sync::CancellationToken;

/// Region assumed by the last resort strategy.
pub const FALLBACK_REGION: Region = Region::EuCentral1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StrategyKind {
    #[serde(rename = "signed-url")]
    SignedUrlApi,
    #[serde(rename = "file-url")]
    DeviceFileUrlApi,
    #[serde(rename = "direct")]
    DirectRegionUrl,
    #[serde(rename = "fallback")]
    FallbackGuessUrl,
}

impl StrategyKind {
    /// Api strategies first, guessing last.
    pub const DEFAULT_ORDER: [StrategyKind; 4] = [
        StrategyKind::SignedUrlApi,
        StrategyKind::DeviceFileUrlApi,
        StrategyKind::DirectRegionUrl,
        StrategyKind::FallbackGuessUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignedUrlApi => "signed-url",
            Self::DeviceFileUrlApi => "file-url",
            Self::DirectRegionUrl => "direct",
            Self::FallbackGuessUrl => "fallback",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "signed-url" | "signed" => Self::SignedUrlApi,
            "file-url" | "file" => Self::DeviceFileUrlApi,
            "direct" | "region" => Self::DirectRegionUrl,
            "fallback" | "guess" => Self::FallbackGuessUrl,
            x => {
                return Err(format!(
                    "unknown strategy '{}' (expected signed-url, file-url, direct or fallback)",
                    x
                ));
            }
        })
    }
}

/// Why a strategy did not produce a url.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Decline {
    pub strategy: StrategyKind,
    pub reason: String,
}

impl Decline {
    pub fn new<T: Into<String>>(strategy: StrategyKind, reason: T) -> Self {
        Self {
            strategy,
            reason: reason.into(),
        }
    }
}

/// Successful resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub url: String,
    pub strategy: StrategyKind,
    /// Strategies tried before the winner.
    pub declines: Vec<Decline>,
}

impl Resolution {
    /// True when the url was guessed and may well be wrong for a private bucket.
    pub fn is_guess(&self) -> bool {
        self.strategy == StrategyKind::FallbackGuessUrl
    }
}

/// One url source, carrying the inputs it needs.
#[derive(Clone, Debug)]
pub enum Strategy {
    SignedUrlApi {
        credentials: Credentials,
        device_id: String,
        bucket: String,
        file_path: String,
    },
    DeviceFileUrlApi {
        credentials: Credentials,
        device_id: String,
        bucket: String,
        file_path: String,
    },
    DirectRegionUrl {
        bucket: String,
        file_path: String,
        region: Region,
    },
    FallbackGuessUrl {
        bucket: String,
        file_path: String,
    },
}

impl Strategy {
    pub fn new(kind: StrategyKind, reference: &MediaReference) -> Self {
        let bucket = reference.bucket.clone();
        let file_path = reference.file_path.clone();

        match kind {
            StrategyKind::SignedUrlApi => Self::SignedUrlApi {
                credentials: reference.credentials.clone(),
                device_id: reference.device_id.clone(),
                bucket,
                file_path,
            },
            StrategyKind::DeviceFileUrlApi => Self::DeviceFileUrlApi {
                credentials: reference.credentials.clone(),
                device_id: reference.device_id.clone(),
                bucket,
                file_path,
            },
            StrategyKind::DirectRegionUrl => Self::DirectRegionUrl {
                bucket,
                file_path,
                region: reference.region.clone(),
            },
            StrategyKind::FallbackGuessUrl => Self::FallbackGuessUrl { bucket, file_path },
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::SignedUrlApi { .. } => StrategyKind::SignedUrlApi,
            Self::DeviceFileUrlApi { .. } => StrategyKind::DeviceFileUrlApi,
            Self::DirectRegionUrl { .. } => StrategyKind::DirectRegionUrl,
            Self::FallbackGuessUrl { .. } => StrategyKind::FallbackGuessUrl,
        }
    }

    /// Produce a url, or the reason this strategy declines.
    pub async fn attempt(&self, api: Option<&dyn CloudApi>) -> std::result::Result<String, String> {
        let url = match self {
            Self::SignedUrlApi {
                credentials,
                device_id,
                bucket,
                file_path,
            }
            | Self::DeviceFileUrlApi {
                credentials,
                device_id,
                bucket,
                file_path,
            } => {
                let Some(api) = api else {
                    return Err("no api client configured".to_owned());
                };

                if device_id.is_empty() {
                    return Err("device id is not set".to_owned());
                }

                let request = FileRequest {
                    credentials,
                    device_id,
                    bucket,
                    file_path,
                };
                let response = if let Self::SignedUrlApi { .. } = self {
                    api.signed_url(&request).await
                } else {
                    api.file_url(&request).await
                };

                response
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| "api returned no url".to_owned())?
            }
            Self::DirectRegionUrl {
                bucket,
                file_path,
                region,
            } => {
                let host = region
                    .storage_host()
                    .ok_or_else(|| format!("no storage host known for region '{}'", region))?;
                bucket_url(bucket, host, file_path)?
            }
            Self::FallbackGuessUrl { bucket, file_path } => {
                let host = FALLBACK_REGION
                    .storage_host()
                    .ok_or_else(|| "fallback region has no storage host".to_owned())?;
                bucket_url(bucket, host, file_path)?
            }
        };

        let url = url.trim();

        if url.is_empty() {
            return Err("empty url".to_owned());
        }

        Ok(url.to_owned())
    }
}

/// `https://{bucket}.{host}/{file_path}` with leading slashes of the path removed.
pub fn bucket_url(bucket: &str, host: &str, file_path: &str) -> std::result::Result<String, String> {
    if bucket.is_empty() {
        return Err("bucket is empty".to_owned());
    }

    let url = format!(
        "https://{}.{}/{}",
        bucket,
        host,
        file_path.trim_start_matches('/')
    );
    Url::parse(&url).map_err(|e| format!("invalid url {}: {}", url, e))?;
    Ok(url)
}

/// Runs strategies in order, one at a time.
#[derive(Clone, Default)]
pub struct Resolver {
    api: Option<Arc<dyn CloudApi>>,
}

impl Resolver {
    pub fn new(api: Option<Arc<dyn CloudApi>>) -> Self {
        Self { api }
    }

    pub async fn resolve(
        &self,
        reference: &MediaReference,
        order: &[StrategyKind],
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let strategies = order
            .iter()
            .map(|x| Strategy::new(*x, reference))
            .collect::<Vec<_>>();
        self.resolve_strategies(&strategies, cancel).await
    }

    pub async fn resolve_strategies(
        &self,
        strategies: &[Strategy],
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let mut declines = Vec::new();

        for strategy in strategies {
            let kind = strategy.kind();
            debug!("Trying {} strategy", kind);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                x = strategy.attempt(self.api.as_deref()) => x,
            };

            match outcome {
                Ok(url) => {
                    if kind == StrategyKind::FallbackGuessUrl {
                        warn!(
                            "Using a guessed {} url, private buckets will likely refuse it: {}",
                            FALLBACK_REGION, url
                        );
                    } else {
                        info!("Resolved url using {} strategy: {}", kind, url);
                    }

                    return Ok(Resolution {
                        url,
                        strategy: kind,
                        declines,
                    });
                }
                Err(reason) => {
                    debug!("{} strategy declined: {}", kind, reason);
                    declines.push(Decline { strategy: kind, reason });
                }
            }
        }

        Err(Error::NoStrategySucceeded { declines })
    }
}
