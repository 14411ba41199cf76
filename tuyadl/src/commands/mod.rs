mod decrypt;
mod open;
mod resolve;

pub use decrypt::Decrypt;
pub use open::Open;
pub use resolve::Resolve;

use crate::{
    payload::{Credentials, MediaReference, Payload},
    pipeline::{Pipeline, PipelineBuilder},
    region::Region,
    resolver::{HttpCloudApi, SIGNED_URL_PATH, StrategyKind},
};
use anyhow::{Result, bail};
use clap::{ArgAction, ColorChoice, Parser, Subcommand};
use log::{LevelFilter, warn};
use reqwest::{Client, Url};
use std::{path::Path, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Download and decrypt camera snapshots and clips referenced by Tuya IoT events.
#[derive(Debug, Clone, Parser)]
#[command(version, author = "clitic <clitic21@gmail.com>", about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// When to output colored text.
    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }

        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Decrypt(Decrypt),
    Open(Open),
    Resolve(Resolve),
}

/// Event payload and everything needed to locate its file.
#[derive(Debug, Clone, clap::Args)]
pub struct Source {
    /// Event payload as JSON, base64 encoded JSON, or a path to a file holding either.
    #[arg(required = true, value_name = "JSON|BASE64|PATH")]
    pub input: String,

    /// Id of the device that uploaded the file.
    #[arg(short, long, env = "TUYA_DEVICE_ID", default_value = "")]
    pub device_id: String,

    /// Data center region of the storage bucket.
    #[arg(short, long, env = "TUYA_REGION", default_value = "eu-central-1")]
    pub region: Region,

    /// Url strategies to try, in order.
    /// Possible values: signed-url, file-url, direct, fallback.
    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_value = "signed-url,file-url,direct,fallback"
    )]
    pub strategy: Vec<StrategyKind>,

    /// Base url of the platform api gateway.
    /// Api strategies decline when this is not set.
    #[arg(long, help_heading = "Api Options", env = "TUYA_API_URL")]
    pub api_url: Option<Url>,

    /// Path of the signed url endpoint. `{device_id}` is substituted.
    #[arg(long, help_heading = "Api Options", default_value = SIGNED_URL_PATH)]
    pub signed_url_path: String,

    /// Path of the device file url endpoint. `{device_id}` is substituted.
    #[arg(long, help_heading = "Api Options")]
    pub file_url_path: Option<String>,

    /// Credential headers sent with api requests, already signed.
    /// This option can be used multiple times.
    #[arg(short = 'H', long = "header", help_heading = "Api Options", value_name = "KEY:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Timeout in seconds for each api request and download.
    #[arg(long, help_heading = "Client Options", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,
}

impl Source {
    pub fn reference(&self) -> Result<MediaReference> {
        let input = if Path::new(&self.input).is_file() {
            std::fs::read_to_string(&self.input)?
        } else {
            self.input.clone()
        };

        if !self.region.is_known() {
            warn!("Unknown region '{}', direct bucket urls will be skipped", self.region);
        }

        Ok(MediaReference::new(
            Payload::decode(&input)?,
            self.device_id.clone(),
            self.region.clone(),
            Credentials::new(self.headers.clone()),
        ))
    }

    pub fn client(&self) -> Result<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(self.timeout))
            .build()?)
    }

    pub fn pipeline(&self) -> Result<PipelineBuilder> {
        let client = self.client()?;
        let mut builder = Pipeline::http(client.clone()).strategies(self.strategy.clone());

        if let Some(api_url) = &self.api_url {
            let mut api =
                HttpCloudApi::new(client, api_url.clone()).signed_url_path(&self.signed_url_path);

            if let Some(path) = &self.file_url_path {
                api = api.file_url_path(path);
            }

            builder = builder.api(Arc::new(api));
        }

        Ok(builder)
    }
}

fn parse_header(value: &str) -> Result<(String, String)> {
    if let Some((k, v)) = value.split_once(':') {
        Ok((k.trim().to_owned(), v.trim().to_owned()))
    } else {
        bail!("Expected 'KEY:VALUE' but found '{}'.", value);
    }
}

fn parse_magic(value: &str) -> Result<[u8; 4]> {
    let bytes = hex::decode(value.trim().trim_start_matches("0x"))?;

    match <[u8; 4]>::try_from(bytes.as_slice()) {
        Ok(x) => Ok(x),
        Err(_) => bail!("Expected 4 bytes (8 hex chars) but found {} bytes.", bytes.len()),
    }
}

/// Token cancelled on the first Ctrl+C.
fn ctrl_c_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, cancelling.");
            token.cancel();
        }
    });

    cancel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("access_token: abc").unwrap(),
            ("access_token".to_owned(), "abc".to_owned())
        );
        assert!(parse_header("nope").is_err());
    }

    #[test]
    fn test_parse_magic() {
        assert_eq!(parse_magic("54555941").unwrap(), *b"TUYA");
        assert_eq!(parse_magic("0x00000001").unwrap(), [0, 0, 0, 1]);
        assert!(parse_magic("0001").is_err());
        assert!(parse_magic("zz").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "tuyadl",
            "-v",
            "decrypt",
            r#"{"bucket":"b1","files":[["/img/a.jpg","0123456789abcdef"]]}"#,
            "--region",
            "us-west-1",
            "--strategy",
            "direct,fallback",
            "-H",
            "access_token:abc",
        ])
        .unwrap();

        assert_eq!(args.log_level(), LevelFilter::Debug);

        let Commands::Decrypt(decrypt) = args.command else {
            panic!("expected decrypt command");
        };
        assert_eq!(decrypt.source.region, Region::UsWest1);
        assert_eq!(
            decrypt.source.strategy,
            vec![StrategyKind::DirectRegionUrl, StrategyKind::FallbackGuessUrl]
        );

        let reference = decrypt.source.reference().unwrap();
        assert_eq!(reference.bucket, "b1");
        assert_eq!(reference.credentials.headers().len(), 1);
    }

    #[test]
    fn test_timeout_must_be_positive() {
        let input = r#"{"bucket":"b1","files":[["/img/a.jpg","0123456789abcdef"]]}"#;
        assert!(Args::try_parse_from(["tuyadl", "resolve", input, "--timeout", "0"]).is_err());

        let args = Args::try_parse_from(["tuyadl", "resolve", input, "--timeout", "5"]).unwrap();
        let Commands::Resolve(resolve) = args.command else {
            panic!("expected resolve command");
        };
        assert_eq!(resolve.source.timeout, 5);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        assert!(
            Args::try_parse_from(["tuyadl", "resolve", "{}", "--strategy", "cache"]).is_err()
        );
    }
}
