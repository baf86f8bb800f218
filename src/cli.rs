use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const DEFAULT_API_BASE: &str = "https://api.zotero.org";
pub const DEFAULT_OUTPUT: &str = "_data/publications.yml";

/// Pull a Zotero group collection and write it as a data file for the site generator.
///
/// Every option can also be given through the environment variable shown next to it, which is
/// how the scheduled job passes its secrets.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Zotero API key
    #[arg(long, env = "ZOTERO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Numeric id of the Zotero group library
    #[arg(long, env = "ZOTERO_GROUP_ID")]
    pub group_id: Option<String>,

    /// Key of the collection inside the group
    #[arg(long, env = "ZOTERO_COLLECTION_KEY")]
    pub collection_key: Option<String>,

    /// Output file; the extension (.yml, .json, .csv) picks the format. Repeat the flag for
    /// several files; the environment variable holds a single path.
    #[arg(short, long = "output", value_name = "PATH", env = "PUBSYNC_OUTPUT")]
    pub outputs: Vec<PathBuf>,

    /// Directory that relative output paths are resolved against
    #[arg(long, value_name = "DIR", env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// YAML file replacing the built-in region rules
    #[arg(long, value_name = "PATH", env = "PUBSYNC_RULES")]
    pub rules: Option<PathBuf>,

    /// Base URL of the Zotero web API
    #[arg(long, value_name = "URL", env = "ZOTERO_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Items requested per page (at most 100)
    #[arg(long, value_name = "N", env = "ZOTERO_PAGE_SIZE", default_value_t = 100)]
    pub page_size: usize,

    /// Pause between page requests when the server sends no Backoff header
    #[arg(long, value_name = "MS", env = "ZOTERO_PAGE_DELAY_MS", default_value_t = 500)]
    pub page_delay_ms: u64,

    /// Per-request timeout
    #[arg(long, value_name = "SECS", env = "ZOTERO_TIMEOUT_SECS", default_value_t = 15)]
    pub timeout_secs: u64,

    /// More logging; repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors, and skip the summary
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Default `tracing` filter for the chosen verbosity. `RUST_LOG` takes precedence.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
