use super::parse_magic;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use log::info;
use std::path::PathBuf;
use tuya_envelope::{Algorithm, EnvelopeParser};

/// Decrypt an envelope which is already on disk.
#[derive(Debug, Clone, Args)]
pub struct Open {
    /// Encrypted file as downloaded from storage.
    #[arg(required = true)]
    pub input: PathBuf,

    /// Key from the event payload, used as its UTF-8 bytes.
    #[arg(short, long, required = true)]
    pub key: String,

    /// Path of the decrypted file.
    /// By default the input path with `.dec` appended is used.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Expected first 4 header bytes in hex. By default the header is not checked.
    #[arg(long, value_name = "HEX", value_parser = parse_magic)]
    pub header_magic: Option<[u8; 4]>,
}

impl Open {
    pub async fn execute(self) -> Result<()> {
        let data = tokio::fs::read(&self.input).await?;
        let mut parser = EnvelopeParser::new();

        if let Some(magic) = self.header_magic {
            parser = parser.magic(magic);
        }

        let envelope = parser.parse(&data)?;
        let algorithm = Algorithm::from_key_len(self.key.len())?;
        info!(
            "Decrypting {} bytes using {}",
            envelope.ciphertext.len(),
            algorithm.to_string().bold()
        );

        let decrypted = envelope.decrypt(self.key.as_bytes())?;
        let output = self.output.unwrap_or_else(|| {
            let mut path = self.input.clone().into_os_string();
            path.push(".dec");
            path.into()
        });

        tokio::fs::write(&output, &decrypted).await?;
        info!(
            "Saved {} bytes to {}",
            decrypted.len(),
            output.to_string_lossy().bold()
        );
        Ok(())
    }
}
