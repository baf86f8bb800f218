use std::time::Duration;

use clap::Parser;
use indicatif::ProgressBar;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    cli::Cli,
    config::Config,
    error::SyncError,
    normalize::normalize,
    output::Format,
    region::RuleSet,
    report::Report,
    source::{fetch_all, zotero::ZoteroClient},
};

mod cli;
mod config;
mod error;
mod item;
mod normalize;
mod output;
mod region;
mod report;
mod source;

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(&args);

    let report = Config::from_cli(&args).and_then(|config| run(&config, args.quiet));
    match report {
        Ok(report) => {
            if !args.quiet {
                report.write_to(&mut std::io::stderr())?;
            }
            Ok(())
        }
        Err(e) => {
            if e.is_fetch() {
                error!("sync aborted while fetching, outputs left untouched: {e}");
            } else {
                error!("sync aborted, outputs left untouched: {e}");
            }
            Err(e.into())
        }
    }
}

fn init_tracing(args: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// One full sync: fetch, clean, tag, order, render everything, then write.
fn run(config: &Config, quiet: bool) -> Result<Report, SyncError> {
    let rules = match &config.rules {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::default(),
    };

    let client = ZoteroClient::new(config)?;
    info!(
        group = %config.group_id,
        collection = %config.collection_key,
        url = %client.items_url(),
        "fetching collection"
    );

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    progress.enable_steady_tick(Duration::from_millis(120));
    let raw = fetch_all(&client, config.page_size, config.page_delay, &progress);
    progress.finish_and_clear();
    let raw = raw?;
    info!(items = raw.len(), "fetched collection");
    if raw.is_empty() {
        warn!("collection is empty, writing an empty publication list");
    }

    let mut normalized = normalize(&raw);
    rules.assign(&mut normalized.publications);
    output::sort(&mut normalized.publications);
    info!(
        publications = normalized.publications.len(),
        duplicates = normalized.duplicates,
        skipped = normalized.children,
        warnings = normalized.warnings.len(),
        "normalized"
    );

    // Render every target before writing any, so a render failure leaves all files alone.
    let rendered = config
        .outputs
        .iter()
        .map(|path| {
            output::render(&normalized.publications, Format::from_path(path))
                .map(|contents| (path, contents))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut outcomes = Vec::with_capacity(rendered.len());
    for (path, contents) in rendered {
        let outcome = output::write_if_changed(path, &contents)?;
        info!(path = %path.display(), ?outcome, "output");
        outcomes.push((path.clone(), outcome));
    }

    Ok(Report::new(raw.len(), &normalized, &rules, outcomes))
}
