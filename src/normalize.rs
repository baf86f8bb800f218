//! Cleaning and deduplication of raw API items.
//!
//! Everything here is a pure function of its input: the same page contents always produce the
//! same records, warnings and counts, in the same order.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::item::{Creator, Item};
use crate::region::UNASSIGNED;

pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_AUTHORS: &str = "Unknown";
pub const NO_DATE: &str = "n.d.";

/// A publication after cleaning. `region` starts out unassigned and is filled in by the
/// classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub key: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<u16>,
    pub venue: Option<String>,
    pub item_type: String,
    pub doi: Option<String>,
    pub issn: Option<String>,
    pub url: Option<String>,
    pub citation: String,
    pub dedup_key: String,
    pub region: String,
}

/// A record that needed a field defaulted. The record is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationWarning {
    pub key: String,
    pub message: String,
}

impl fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.key.is_empty() { "<no key>" } else { &self.key };
        write!(f, "item {key}: {}", self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub publications: Vec<Publication>,
    pub warnings: Vec<NormalizationWarning>,
    pub duplicates: usize,
    pub children: usize,
}

pub fn normalize(raw: &[Value]) -> Normalized {
    let mut out = Normalized::default();
    let mut seen = HashSet::new();

    for value in raw {
        let mut problems = Vec::new();
        let item = Item::from_api(value, &mut problems);

        if item.is_child() {
            debug!(key = %item.key, item_type = item.item_type.as_str(), "skipping child item");
            out.children += 1;
            continue;
        }

        let publication = clean(&item, &mut problems);

        if !seen.insert(publication.dedup_key.clone()) {
            debug!(key = %publication.key, title = %publication.title, "dropping duplicate");
            out.duplicates += 1;
            continue;
        }

        for message in problems {
            let warning = NormalizationWarning {
                key: item.key.clone(),
                message,
            };
            warn!("{warning}");
            out.warnings.push(warning);
        }
        out.publications.push(publication);
    }

    out
}

fn clean(item: &Item, problems: &mut Vec<String>) -> Publication {
    let (title, titled) = match item.title.as_deref().map(strip_markup) {
        Some(t) if !t.is_empty() => (t, true),
        _ => {
            problems.push(format!("missing title, using \"{UNTITLED}\""));
            (UNTITLED.to_string(), false)
        }
    };

    let authors: Vec<String> = item
        .creators
        .iter()
        .map(|c| match c {
            Creator::Split { first, last } => {
                strip_markup(&format!("{} {}", first.trim(), last.trim()))
            }
            Creator::Single(name) => strip_markup(name),
        })
        .filter(|a| !a.is_empty())
        .collect();

    let year = item.date.as_deref().and_then(extract_year);
    let venue = item
        .venue
        .as_deref()
        .map(strip_markup)
        .filter(|v| !v.is_empty());
    let doi = item.doi.as_deref().and_then(clean_doi);
    let url = item
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .or_else(|| doi.as_ref().map(|d| format!("https://doi.org/{d}")));
    let issn = item
        .issn
        .as_deref()
        .map(normalize_ws)
        .filter(|i| !i.is_empty());

    let citation = citation(&authors, year, &title, venue.as_deref());
    // Defaulted titles are not comparable; key those records by item key too.
    let dedup_key = if titled {
        dedup_key(&title, year)
    } else {
        format!("{}#{}", dedup_key(&title, year), item.key)
    };

    Publication {
        key: item.key.clone(),
        title,
        authors,
        year,
        venue,
        item_type: item.item_type.as_str().to_string(),
        doi,
        issn,
        url,
        citation,
        dedup_key,
        region: UNASSIGNED.to_string(),
    }
}

/// `"<title>|<year>"` with the title lowercased and whitespace runs collapsed.
pub fn dedup_key(title: &str, year: Option<u16>) -> String {
    let title = normalize_ws(title).to_lowercase();
    match year {
        Some(y) => format!("{title}|{y}"),
        None => format!("{title}|-"),
    }
}

fn citation(authors: &[String], year: Option<u16>, title: &str, venue: Option<&str>) -> String {
    let who = if authors.is_empty() {
        UNKNOWN_AUTHORS.to_string()
    } else {
        authors.join(", ")
    };
    let when = year.map_or_else(|| NO_DATE.to_string(), |y| y.to_string());
    let mut out = format!("{who} ({when}). {}", with_period(title));
    if let Some(v) = venue {
        out.push(' ');
        out.push_str(&with_period(v));
    }
    out
}

fn with_period(s: &str) -> String {
    if s.ends_with(['.', '?', '!']) {
        s.to_string()
    } else {
        format!("{s}.")
    }
}

/// First standalone run of four ASCII digits. Digits from other scripts are not years.
pub fn extract_year(s: &str) -> Option<u16> {
    static YRE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([0-9]{4})\b").unwrap());
    YRE.captures_iter(s)
        .filter_map(|c| c.get(1))
        .find_map(|m| m.as_str().parse().ok())
}

/// Strip a DOI of the resolver and scheme prefixes people paste into Zotero.
pub fn clean_doi(s: &str) -> Option<String> {
    let mut d = s.trim();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
        "DOI:",
    ] {
        if let Some(rest) = d.strip_prefix(prefix) {
            d = rest.trim_start();
            break;
        }
    }
    if d.is_empty() { None } else { Some(d.to_string()) }
}

/// Remove tags, decode character entities and collapse whitespace.
///
/// Only things shaped like an element tag go; a bare `<` or `>` in running text ("<10 cm")
/// is kept.
pub fn strip_markup(s: &str) -> String {
    static TAG_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9]*(?:\s[^<>]*)?/?>").unwrap());
    let without_tags = TAG_RE.replace_all(s, "");
    normalize_ws(&decode_entities(&without_tags))
}

fn decode_entities(s: &str) -> String {
    static ENTITY_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").unwrap());
    ENTITY_RE
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or(body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '–',
        "mdash" => '—',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "okina" => 'ʻ',
        _ => return None,
    })
}

pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}
