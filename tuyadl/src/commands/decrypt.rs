use super::{Source, ctrl_c_token, parse_magic};
use crate::payload::MediaReference;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use log::{info, warn};
use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Resolve, download and decrypt the file referenced by an event payload.
#[derive(Debug, Clone, Args)]
pub struct Decrypt {
    #[command(flatten)]
    pub source: Source,

    /// Path of the decrypted file.
    /// By default the file name from the payload is used in the current directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the decrypted file as base64 to stdout instead of writing it.
    #[arg(long, conflicts_with = "output")]
    pub base64: bool,

    /// Print url, strategy, bucket, file path and region as json to stdout.
    #[arg(long)]
    pub json: bool,

    /// Expected first 4 header bytes in hex. By default the header is not checked.
    #[arg(long, help_heading = "Decrypt Options", value_name = "HEX", value_parser = parse_magic)]
    pub header_magic: Option<[u8; 4]>,

    /// Extra attempts when the download fails before the server answers.
    #[arg(long, help_heading = "Client Options", default_value_t = 0)]
    pub retry_count: u8,
}

impl Decrypt {
    pub async fn execute(self) -> Result<()> {
        let reference = self.source.reference()?;
        let mut builder = self.source.pipeline()?.retries(self.retry_count);

        if let Some(magic) = self.header_magic {
            builder = builder.header_magic(magic);
        }

        let pipeline = builder.build();
        let cancel = ctrl_c_token();
        let media = match pipeline.process(&reference, &cancel).await {
            Ok(x) => x,
            Err(e) if e.is_access_denied() && self.source.api_url.is_none() => {
                warn!(
                    "Storage refused the download, set {} and credential headers so that signed urls can be requested.",
                    "--api-url".bold()
                );
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        if self.base64 {
            println!("{}", media.base64());
        } else {
            let output = match self.output {
                Some(x) => x,
                None => default_output(&reference),
            };

            tokio::fs::write(&output, &media.data).await?;
            info!(
                "Saved {} bytes to {}",
                media.data.len(),
                output.to_string_lossy().bold()
            );
        }

        if self.json {
            let mut stdout = std::io::stdout();
            serde_json::to_writer(&mut stdout, &media.metadata)?;
            writeln!(stdout)?;
        }

        Ok(())
    }
}

/// Bare file name taken from the payload, never a path outside the current directory.
fn default_output(reference: &MediaReference) -> PathBuf {
    reference
        .file_name()
        .and_then(|x| Path::new(x).file_name())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("decrypted.bin"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        payload::{Credentials, Payload},
        region::Region,
    };

    fn reference(file_path: &str) -> MediaReference {
        let mut reference = MediaReference::new(
            Payload::decode(r#"{"bucket":"b1","files":[["/img/a.jpg","0123456789abcdef"]]}"#)
                .unwrap(),
            String::new(),
            Region::default(),
            Credentials::default(),
        );
        reference.file_path = file_path.to_owned();
        reference
    }

    #[test]
    fn test_default_output() {
        assert_eq!(default_output(&reference("/img/a.jpg")), PathBuf::from("a.jpg"));
        assert_eq!(default_output(&reference("..\\..\\x.jpg")), PathBuf::from("x.jpg"));
        assert_eq!(default_output(&reference("/img/..")), PathBuf::from("decrypted.bin"));
        assert_eq!(default_output(&reference("/img/")), PathBuf::from("decrypted.bin"));

        for path in ["/a/b.jpg", "c\\d.mp4", "/e/../f"] {
            let output = default_output(&reference(path));
            assert_eq!(output.components().count(), 1, "{}", path);
        }
    }
}
