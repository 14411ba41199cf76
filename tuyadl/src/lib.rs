//! Resolve, download and decrypt the camera snapshots and clips that Tuya devices reference
//! in their IoT events.
//!
//! A [`Pipeline`] takes a [`MediaReference`], finds a working download url by trying url
//! strategies in order, downloads the envelope and decrypts it with
//! [`tuya_envelope`].
//!
//! ```no_run
//! use tuyadl::{MediaReference, Payload, Pipeline, Region};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let payload = Payload::decode(r#"{"bucket":"b1","files":[["/img/a.jpg","0123456789abcdef"]]}"#)?;
//! let reference = MediaReference::new(payload, "dev1".into(), Region::EuCentral1, Default::default());
//! let pipeline = Pipeline::http(reqwest::Client::new()).build();
//! let media = pipeline.process(&reference, &CancellationToken::new()).await?;
//! println!("{} via {}", media.metadata.resolved_url, media.metadata.strategy);
//! # Ok(())
//! # }
//! ```

mod commands;
mod error;
mod fetcher;
mod logger;
mod payload;
mod pipeline;
mod region;
pub mod resolver;

#[doc(hidden)]
pub use commands::{Args, Commands};
pub use error::{Error, ErrorKind, Result};
pub use fetcher::{Fetcher, HttpTransport, Transport};
#[doc(hidden)]
pub use logger::Logger;
pub use payload::{Credentials, MediaReference, Payload};
pub use pipeline::{DecryptedMedia, MediaMetadata, Pipeline, PipelineBuilder};
pub use region::Region;
pub use reqwest;
pub use tuya_envelope;
