use super::{Source, ctrl_c_token};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Only resolve the download url of the file referenced by an event payload.
#[derive(Debug, Clone, Args)]
pub struct Resolve {
    #[command(flatten)]
    pub source: Source,

    /// Print the resolution, including declined strategies, as json.
    #[arg(long)]
    pub json: bool,
}

impl Resolve {
    pub async fn execute(self) -> Result<()> {
        let reference = self.source.reference()?;
        let pipeline = self.source.pipeline()?.build();
        let resolution = pipeline.resolve(&reference, &ctrl_c_token()).await?;

        if self.json {
            serde_json::to_writer(std::io::stdout(), &resolution)?;
            println!();
        } else {
            for decline in &resolution.declines {
                eprintln!(
                    "{} {}: {}",
                    "Declined".yellow().bold(),
                    decline.strategy,
                    decline.reason
                );
            }

            eprintln!(
                "{} {}",
                "Strategy".green().bold(),
                resolution.strategy.to_string().bold()
            );
            println!("{}", resolution.url);
        }

        Ok(())
    }
}
