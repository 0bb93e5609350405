//! `license-notices` — resolve the license text of every NuGet dependency and
//! write a third-party notices file.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and initialise logging.
//! 2. Load configuration ([`config::load_config`]).
//! 3. Collect dependency records: `--input` JSON, or `.nuspec` discovery ([`nuspec`]).
//! 4. Resolve each dependency's license concurrently ([`license::LicenseService`]).
//! 5. Write the notices file or JSON ([`report`]).
//! 6. Exit `0` when every dependency has a license text, `1` otherwise.

mod cli;
mod config;
mod fetch;
mod license;
mod models;
mod nuspec;
mod report;
mod resolver;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, OutputFormat};
use config::load_config;
use fetch::UrlFetcher;
use license::{LicenseCache, LicenseService};
use models::{DependencyRecord, ResolvedLicense, ResolverOptions};
use resolver::ResolverRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());

    let config = load_config(&path, cli.config.as_deref())?;
    let options = resolver_options(&cli, &config);
    tracing::debug!(
        timeout = ?options.timeout,
        follow_redirects = options.follow_redirects,
        "resolver options"
    );

    let records = load_records(&cli, &path)?;
    if records.is_empty() {
        eprintln!("No packages found in {}", path.display());
        std::process::exit(1);
    }

    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()?;
    let service = Arc::new(LicenseService::new(
        ResolverRegistry::with_defaults(client)?,
        UrlFetcher::new(&options)?,
        Arc::new(LicenseCache::new()),
    ));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling outstanding lookups");
            on_interrupt.cancel();
        }
    });

    let licenses = resolve_all(&service, &records, &options, &cancel, &cli).await?;
    tracing::debug!(entries = service.cache().len(), "license cache");

    let output = cli.output.clone().unwrap_or_else(|| config.output.path.clone());
    match cli.format {
        OutputFormat::Text => {
            report::notices::write(&licenses, &output)?;
            report::terminal::render(&licenses, &path, Some(&output), cli.verbose > 0, cli.quiet);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&licenses)?);
        }
    }

    if licenses.iter().any(|l| !l.is_resolved()) {
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// CLI flags (and `GITHUB_TOKEN`) take precedence over the config file.
fn resolver_options(cli: &Cli, config: &config::Config) -> ResolverOptions {
    let mut options = config.resolver.to_options();
    if let Some(secs) = cli.timeout {
        options.timeout = Duration::from_secs(secs);
    }
    if cli.no_follow_redirects {
        options.follow_redirects = false;
    }
    if let Some(token) = cli.github_token.clone().filter(|t| !t.is_empty()) {
        options.github_token = Some(token);
    }
    options
}

fn load_records(cli: &Cli, path: &Path) -> Result<Vec<DependencyRecord>> {
    match &cli.input {
        Some(input) => read_input(input),
        None => Ok(nuspec::discover_packages(path)?),
    }
}

fn read_input(input: &Path) -> Result<Vec<DependencyRecord>> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", input.display()))
}

async fn resolve_all(
    service: &Arc<LicenseService>,
    records: &[DependencyRecord],
    options: &ResolverOptions,
    cancel: &CancellationToken,
    cli: &Cli,
) -> Result<Vec<ResolvedLicense>> {
    let pb = if !cli.quiet && cli.format == OutputFormat::Text {
        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let results: Vec<_> = stream::iter(records)
        .map(|record| {
            let service = Arc::clone(service);
            let token = cancel.child_token();
            let pb = pb.clone();
            async move {
                let result = service.resolve_license(record, options, &token).await;
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                result.map(|license| ResolvedLicense::new(record, license.as_deref()))
            }
        })
        .buffered(cli.jobs.max(1))
        .collect()
        .await;

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    results
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .context("license resolution interrupted")
}
