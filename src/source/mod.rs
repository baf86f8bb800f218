use std::time::Duration;

use indicatif::ProgressBar;
use serde_json::Value;
use tracing::debug;

use crate::error::SyncError;

pub mod zotero;

/// Zotero refuses `limit` values above this.
pub const MAX_PAGE_SIZE: usize = 100;

/// One page of raw items plus the pacing hints the server attached to it.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<Value>,
    /// Size of the whole collection, when the server reports it.
    pub total: Option<usize>,
    /// Server-requested pause before the next request.
    pub backoff: Option<Duration>,
}

pub trait PageSource {
    fn fetch_page(&self, start: usize, limit: usize) -> Result<Page, SyncError>;
}

/// Pull every item from `source`, page by page, in server order.
///
/// A failing page fails the whole fetch; nothing fetched so far is returned.
pub fn fetch_all<S: PageSource>(
    source: &S,
    page_size: usize,
    delay: Duration,
    progress: &ProgressBar,
) -> Result<Vec<Value>, SyncError> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(SyncError::config(format!(
            "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
        )));
    }

    let mut items = Vec::new();
    loop {
        let start = items.len();
        progress.set_message(format!("fetching items {start}..{}", start + page_size));
        let page = source.fetch_page(start, page_size)?;
        let received = page.items.len();
        debug!(start, received, total = ?page.total, "fetched page");

        items.extend(page.items);
        if let Some(total) = page.total {
            progress.set_length(total as u64);
        }
        progress.set_position(items.len() as u64);

        let exhausted = received == 0
            || received < page_size
            || page.total.is_some_and(|total| items.len() >= total);
        if exhausted {
            break;
        }

        let pause = page.backoff.unwrap_or(delay);
        if !pause.is_zero() {
            if page.backoff.is_some() {
                debug!(seconds = pause.as_secs(), "server requested backoff");
            }
            std::thread::sleep(pause);
        }
    }
    Ok(items)
}
