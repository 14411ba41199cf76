use clap::{ColorChoice, Parser};
use colored::Colorize;
use std::{
    io::{IsTerminal, stderr},
    process,
};
use tuyadl::{Args, Commands, Logger};

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Auto => colored::control::set_override(stderr().is_terminal()),
        ColorChoice::Never => colored::control::set_override(false),
    }

    Logger::init(args.log_level());

    match args.command {
        Commands::Decrypt(args) => args.execute().await?,
        Commands::Open(args) => args.execute().await?,
        Commands::Resolve(args) => args.execute().await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".bold().red(), e);
        process::exit(1);
    }
}
