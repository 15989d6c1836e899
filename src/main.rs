//! CLI entry point for the cdp-download diagnostics tool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cdp_download::{Archiver, DevToolsProbe, DownloadConfig};
use clap::Parser;
use tracing::{debug, info};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let (config_path, config) = load_config(args.config.as_deref())?;

    match args.command {
        Command::Probe { endpoint } => run_probe(&endpoint).await,
        Command::Archive { file, archive_root } => {
            let root = archive_root.unwrap_or_else(|| config.archive_root.clone());
            run_archive(&file, root).await
        }
        Command::Config => {
            print_config(config_path.as_deref(), &config);
            Ok(())
        }
    }
}

/// Loads the explicit config file, or the default one when present.
fn load_config(explicit: Option<&Path>) -> Result<(Option<PathBuf>, DownloadConfig)> {
    if let Some(path) = explicit {
        let config = DownloadConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?;
        return Ok((Some(path.to_path_buf()), config));
    }

    let loaded = DownloadConfig::load_default().context("loading default config")?;
    let path = loaded.loaded_from_file.then_some(loaded.path).flatten();
    Ok((path, loaded.config))
}

async fn run_probe(endpoint: &str) -> Result<()> {
    let probe = DevToolsProbe::new()?;
    let version = probe.probe(endpoint).await?;

    println!("browser: {}", version.browser);
    println!("protocol: {}", version.protocol_version);
    if let Some(ws) = &version.web_socket_debugger_url {
        println!("websocket: {ws}");
    }

    if !version.supports_download_events() {
        bail!(
            "{} does not report download events over DevTools",
            version.browser
        );
    }
    println!("download events: supported");
    Ok(())
}

async fn run_archive(file: &Path, root: PathBuf) -> Result<()> {
    let archiver = Archiver::new(root);
    let archived = archiver
        .archive(file)
        .await
        .with_context(|| format!("archiving {}", file.display()))?;

    info!(bytes = archived.size, "file archived");
    println!("{}", archived.path().display());
    Ok(())
}

fn print_config(path: Option<&Path>, config: &DownloadConfig) {
    match path {
        Some(path) => println!("# config file: {}", path.display()),
        None => println!("# config file: none (defaults)"),
    }
    println!("timeout_ms = {}", config.timeout.as_millis());
    println!("polling_interval_ms = {}", config.polling_interval.as_millis());
    println!("archive_root = {:?}", config.archive_root.display().to_string());
}
