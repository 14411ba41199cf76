//! Resolve, download, split and decrypt one media file.

use crate::{
    error::Result,
    fetcher::{Fetcher, HttpTransport, Transport},
    payload::MediaReference,
    region::Region,
    resolver::{CloudApi, Resolution, Resolver, StrategyKind},
};
use base64::Engine;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tuya_envelope::{Algorithm, EnvelopeParser};

/// Where a decrypted file came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MediaMetadata {
    pub resolved_url: String,
    pub strategy: StrategyKind,
    pub bucket: String,
    pub file_path: String,
    pub region: Region,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptedMedia {
    /// Plaintext with padding removed (JPEG, MP4, ...).
    pub data: Vec<u8>,
    pub metadata: MediaMetadata,
}

impl DecryptedMedia {
    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    api: Option<Arc<dyn CloudApi>>,
    transport: Arc<dyn Transport>,
    strategies: Vec<StrategyKind>,
    parser: EnvelopeParser,
    retries: u8,
}

impl PipelineBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            api: None,
            transport,
            strategies: StrategyKind::DEFAULT_ORDER.to_vec(),
            parser: EnvelopeParser::new(),
            retries: 0,
        }
    }

    pub fn api(mut self, api: Arc<dyn CloudApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Order in which url strategies are tried.
    pub fn strategies(mut self, strategies: Vec<StrategyKind>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Reject envelopes whose header does not start with `magic`.
    pub fn header_magic(mut self, magic: [u8; 4]) -> Self {
        self.parser = self.parser.magic(magic);
        self
    }

    pub fn retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            resolver: Resolver::new(self.api),
            fetcher: Fetcher::new(self.transport).retries(self.retries),
            strategies: self.strategies,
            parser: self.parser,
        }
    }
}

/// Stateless orchestrator; one [`Pipeline`] can serve any number of concurrent calls.
#[derive(Clone)]
pub struct Pipeline {
    resolver: Resolver,
    fetcher: Fetcher,
    strategies: Vec<StrategyKind>,
    parser: EnvelopeParser,
}

impl Pipeline {
    pub fn builder(transport: Arc<dyn Transport>) -> PipelineBuilder {
        PipelineBuilder::new(transport)
    }

    /// Pipeline downloading over HTTP with `client`.
    pub fn http(client: reqwest::Client) -> PipelineBuilder {
        PipelineBuilder::new(Arc::new(HttpTransport::new(client)))
    }

    pub async fn resolve(
        &self,
        reference: &MediaReference,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        self.resolver
            .resolve(reference, &self.strategies, cancel)
            .await
    }

    pub async fn process(
        &self,
        reference: &MediaReference,
        cancel: &CancellationToken,
    ) -> Result<DecryptedMedia> {
        if let Err(e) = Algorithm::from_key_len(reference.key.len()) {
            warn!("AES key length is unusual, decryption will fail: {}", e);
        }

        let resolution = self.resolve(reference, cancel).await?;
        let data = self.fetcher.fetch(&resolution.url, cancel).await?;
        let envelope = self.parser.parse(&data)?;
        let data = envelope.decrypt(&reference.key)?;
        info!("Decrypted {} bytes", data.len());

        Ok(DecryptedMedia {
            data,
            metadata: MediaMetadata {
                resolved_url: resolution.url,
                strategy: resolution.strategy,
                bucket: reference.bucket.clone(),
                file_path: reference.file_path.clone(),
                region: reference.region.clone(),
            },
        })
    }
}
