use std::io::{self, Write};
use std::path::PathBuf;

use owo_colors::{OwoColorize, Stream};

use crate::{
    normalize::{Normalized, Publication},
    output::WriteOutcome,
    region::RuleSet,
};

/// End-of-run numbers, printed to stderr once the outputs are in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub fetched: usize,
    pub kept: usize,
    pub duplicates: usize,
    pub children: usize,
    pub warnings: usize,
    pub years: Option<(u16, u16)>,
    pub regions: Vec<(String, usize)>,
    pub outputs: Vec<(PathBuf, WriteOutcome)>,
}

impl Report {
    pub fn new(
        fetched: usize,
        normalized: &Normalized,
        rules: &RuleSet,
        outputs: Vec<(PathBuf, WriteOutcome)>,
    ) -> Self {
        let pubs = &normalized.publications;
        let years = pubs
            .iter()
            .filter_map(|p| p.year)
            .fold(None, |acc: Option<(u16, u16)>, y| match acc {
                None => Some((y, y)),
                Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
            });

        Report {
            fetched,
            kept: pubs.len(),
            duplicates: normalized.duplicates,
            children: normalized.children,
            warnings: normalized.warnings.len(),
            years,
            regions: region_counts(pubs, rules),
            outputs,
        }
    }

    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        writeln!(
            w,
            "{} {}  {} {}  {} {}  {} {}",
            "✓".if_supports_color(Stream::Stderr, |t| t.green()),
            self.kept,
            "✗".if_supports_color(Stream::Stderr, |t| t.red()),
            self.duplicates,
            "⚠".if_supports_color(Stream::Stderr, |t| t.yellow()),
            self.warnings,
            "↳".if_supports_color(Stream::Stderr, |t| t.dimmed()),
            self.children,
        )?;
        writeln!(
            w,
            "  {} fetched, {} published, {} duplicates dropped, {} attachments/notes skipped",
            self.fetched, self.kept, self.duplicates, self.children
        )?;
        if let Some((lo, hi)) = self.years {
            writeln!(w, "  years covered: {lo} - {hi}")?;
        }

        if !self.regions.is_empty() {
            writeln!(w, "{}", "regions".if_supports_color(Stream::Stderr, |t| t.bold()))?;
            for (region, count) in &self.regions {
                writeln!(w, "  {region}: {count}")?;
            }
        }

        for (path, outcome) in &self.outputs {
            let label = match outcome {
                WriteOutcome::Written => "written",
                WriteOutcome::Unchanged => "unchanged",
            };
            writeln!(
                w,
                "{} {}",
                label.if_supports_color(Stream::Stderr, |t| t.cyan()),
                path.display()
            )?;
        }
        Ok(())
    }
}

/// Count per tag, in rule priority order, leaving out tags nobody got.
fn region_counts(pubs: &[Publication], rules: &RuleSet) -> Vec<(String, usize)> {
    rules
        .tags()
        .into_iter()
        .map(|tag| (tag.to_string(), pubs.iter().filter(|p| p.region == tag).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
}
