//! Rendering the publication list for the site generator and writing it in place.

use std::cmp::Ordering;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::{error::SyncError, normalize::Publication};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Csv,
}

impl Format {
    /// Pick the format from the file extension. Anything unrecognised is YAML, which is what
    /// Jekyll's `_data` directory expects.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Format::Json,
            Some("csv") => Format::Csv,
            _ => Format::Yaml,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Format::Yaml => "YAML",
            Format::Json => "JSON",
            Format::Csv => "CSV",
        }
    }
}

/// What ends up in the data file, one entry per publication.
#[derive(Debug, Serialize)]
struct Entry<'a> {
    key: &'a str,
    title: &'a str,
    authors: &'a [String],
    year: Option<u16>,
    venue: Option<&'a str>,
    item_type: &'a str,
    doi: Option<&'a str>,
    issn: Option<&'a str>,
    url: Option<&'a str>,
    region: &'a str,
    citation: &'a str,
}

impl<'a> From<&'a Publication> for Entry<'a> {
    fn from(p: &'a Publication) -> Self {
        Entry {
            key: &p.key,
            title: &p.title,
            authors: &p.authors,
            year: p.year,
            venue: p.venue.as_deref(),
            item_type: &p.item_type,
            doi: p.doi.as_deref(),
            issn: p.issn.as_deref(),
            url: p.url.as_deref(),
            region: &p.region,
            citation: &p.citation,
        }
    }
}

const CSV_HEADER: &[&str] = &[
    "key",
    "title",
    "authors",
    "year",
    "venue",
    "item_type",
    "doi",
    "issn",
    "url",
    "region",
    "citation",
];

/// Newest first, undated last, then by title. Falls back to the dedup key and item key so that
/// no two records ever compare equal.
pub fn display_order(a: &Publication, b: &Publication) -> Ordering {
    let year = |p: &Publication| p.year.map_or(0, |y| i32::from(y) + 1);
    year(b)
        .cmp(&year(a))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.dedup_key.cmp(&b.dedup_key))
        .then_with(|| a.key.cmp(&b.key))
}

pub fn sort(publications: &mut [Publication]) {
    publications.sort_by(display_order);
}

pub fn render(publications: &[Publication], format: Format) -> Result<String, SyncError> {
    let entries: Vec<Entry<'_>> = publications.iter().map(Entry::from).collect();
    let render_err = |message: String| SyncError::Render {
        format: format.name(),
        message,
    };

    match format {
        Format::Yaml => serde_yaml::to_string(&entries).map_err(|e| render_err(e.to_string())),
        Format::Json => serde_json::to_string_pretty(&entries)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| render_err(e.to_string())),
        Format::Csv => {
            let mut wtr = csv::Writer::from_writer(Vec::new());
            wtr.write_record(CSV_HEADER)
                .map_err(|e| render_err(e.to_string()))?;
            for e in &entries {
                let authors = e.authors.join("; ");
                let year = e.year.map(|y| y.to_string()).unwrap_or_default();
                wtr.write_record([
                    e.key,
                    e.title,
                    authors.as_str(),
                    year.as_str(),
                    e.venue.unwrap_or_default(),
                    e.item_type,
                    e.doi.unwrap_or_default(),
                    e.issn.unwrap_or_default(),
                    e.url.unwrap_or_default(),
                    e.region,
                    e.citation,
                ])
                .map_err(|e| render_err(e.to_string()))?;
            }
            let bytes = wtr
                .into_inner()
                .map_err(|e| render_err(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| render_err(e.to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Replace `path` with `contents` unless it already holds exactly those bytes.
///
/// The new content goes to a temporary file in the same directory which is then renamed over
/// the target, so readers see either the old file or the new one.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<WriteOutcome, SyncError> {
    match fs::read(path) {
        Ok(existing) if existing == contents.as_bytes() => return Ok(WriteOutcome::Unchanged),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(SyncError::write(path, e)),
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| SyncError::write(&dir, e))?;

    // The temp file is created owner-only; the replacement keeps the old file's mode.
    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| SyncError::write(&dir, e))?;
    if let Some(permissions) = permissions {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| SyncError::write(tmp.path(), e))?;
    }
    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| SyncError::write(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| SyncError::write(path, e.error))?;
    Ok(WriteOutcome::Written)
}

/// Mode for a data file that did not exist before: readable by the site build.
#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
