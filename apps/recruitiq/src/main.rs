use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{load_settings, AppContext};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::Mutex,
};
use tracing_subscriber::EnvFilter;

mod commands;
mod picker;
mod prompt;
mod shell;

use prompt::{InputLines, TerminalPrompt};
use shell::Shell;

#[derive(Parser, Debug)]
#[command(about = "Score a resume against a job description")]
struct Args {
    /// Settings file; defaults to ./recruitiq.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(args.config.as_deref());
    let input: InputLines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let prompt = Arc::new(TerminalPrompt::new(Arc::clone(&input)));
    let ctx = AppContext::init(settings, prompt.clone())
        .context("failed to start; check recruitiq.toml or RECRUITIQ_* variables")?;

    Shell::new(ctx, prompt, input).run().await
}
