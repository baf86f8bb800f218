use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::{
    cli::{Cli, DEFAULT_OUTPUT},
    error::SyncError,
    source::MAX_PAGE_SIZE,
};

/// Settings for a single run, validated up front so that nothing touches the network or the
/// output file when something is missing.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub group_id: String,
    pub collection_key: String,
    pub api_base: Url,
    pub page_size: usize,
    pub page_delay: Duration,
    pub timeout: Duration,
    pub outputs: Vec<PathBuf>,
    pub rules: Option<PathBuf>,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self, SyncError> {
        let api_key = required(cli.api_key.as_deref(), "ZOTERO_API_KEY", "--api-key")?;
        let group_id = required(cli.group_id.as_deref(), "ZOTERO_GROUP_ID", "--group-id")?;
        let collection_key = required(
            cli.collection_key.as_deref(),
            "ZOTERO_COLLECTION_KEY",
            "--collection-key",
        )?;

        let api_base = Url::parse(cli.api_base.trim())
            .map_err(|e| SyncError::config(format!("invalid API base `{}`: {e}", cli.api_base)))?;
        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(SyncError::config(format!(
                "API base must be an http(s) URL, got `{api_base}`"
            )));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&cli.page_size) {
            return Err(SyncError::config(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                cli.page_size
            )));
        }
        if cli.timeout_secs == 0 {
            return Err(SyncError::config("timeout must be at least one second"));
        }

        let mut outputs = cli.outputs.clone();
        if outputs.is_empty() {
            outputs.push(PathBuf::from(DEFAULT_OUTPUT));
        }
        if let Some(dir) = &cli.output_dir {
            outputs = outputs
                .into_iter()
                .map(|p| if p.is_absolute() { p } else { dir.join(p) })
                .collect();
        }
        let mut seen = Vec::new();
        outputs.retain(|p| {
            let fresh = !seen.contains(p);
            seen.push(p.clone());
            fresh
        });

        Ok(Config {
            api_key,
            group_id,
            collection_key,
            api_base,
            page_size: cli.page_size,
            page_delay: Duration::from_millis(cli.page_delay_ms),
            timeout: Duration::from_secs(cli.timeout_secs),
            outputs,
            rules: cli.rules.clone(),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("group_id", &self.group_id)
            .field("collection_key", &self.collection_key)
            .field("api_base", &self.api_base.as_str())
            .field("page_size", &self.page_size)
            .field("page_delay", &self.page_delay)
            .field("timeout", &self.timeout)
            .field("outputs", &self.outputs)
            .field("rules", &self.rules)
            .finish()
    }
}

fn required(value: Option<&str>, env: &str, flag: &str) -> Result<String, SyncError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(SyncError::config(format!(
            "{env} is not set (use the {env} environment variable or {flag})"
        ))),
    }
}
