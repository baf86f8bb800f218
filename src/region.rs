use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::{error::SyncError, normalize::Publication};

pub const UNASSIGNED: &str = "Unassigned";

/// Built-in region table.
///
/// NOTE: Ordering is important here, as it signifies priority. A record mentioning both Guam and
/// the Pacific is tagged with the Mariana Archipelago because that rule comes first. Every entry is
/// a regular expression matched case-insensitively against the title and venue.
static DEFAULT_TABLE: &[(&str, &[&str])] = &[
    (
        "Hawaiian Archipelago",
        &[
            r"\bhawai",
            r"\bkahekili\b",
            r"\bmaui\b",
            r"\bo['ʻ‘]?ahu\b",
            r"\bkaua['ʻ‘]?i\b",
            r"\bmoloka['ʻ‘]?i\b",
            r"\blāna['ʻ‘]?i\b|\blana['ʻ‘]?i\b",
            r"\bbig island\b",
            r"\bnorthwestern hawaiian\b",
            r"\bpapah[aā]naumoku[aā]kea\b",
            r"\bfrench frigate shoals\b",
            r"\bmidway atoll\b",
        ],
    ),
    (
        "American Samoa",
        &[
            r"\bsamoa",
            r"\btutuila\b",
            r"\baunu['ʻ‘]?u\b",
            r"\bofu\b",
            r"\bolosega\b",
            r"\bta['ʻ‘]u\b",
            r"\bswains\b",
            r"\brose atoll\b",
        ],
    ),
    (
        "Mariana Archipelago",
        &[
            r"\bguam\b",
            r"\bmariana",
            r"\bsaipan\b",
            r"\btinian\b",
            r"\brota\b",
            r"\bcnmi\b",
        ],
    ),
    (
        "Pacific Remote Island Areas",
        &[
            r"\bpacific remote island",
            r"\bpria\b",
            r"\bwake (atoll|island)\b",
            r"\bbaker island\b",
            r"\bhowland\b",
            r"\bjarvis\b",
            r"\bpalmyra\b",
            r"\bkingman\b",
            r"\bjohnston atoll\b",
        ],
    ),
    ("Pacific-wide", &[r"\bpacific\b"]),
];

static DEFAULT_RULES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::from_table(DEFAULT_TABLE).expect("built-in region table is valid")
});

/// One region and the expression that selects it.
#[derive(Debug, Clone)]
pub struct Rule {
    region: String,
    matcher: Regex,
}

impl Rule {
    /// Match any of the given regular expressions.
    pub fn patterns<S: AsRef<str>>(region: &str, patterns: &[S]) -> Result<Self, SyncError> {
        let joined = patterns
            .iter()
            .map(|p| format!("(?:{})", p.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        if joined.is_empty() {
            return Err(SyncError::config(format!(
                "region rule `{region}` has no keywords or patterns"
            )));
        }
        let matcher = RegexBuilder::new(&joined)
            .case_insensitive(true)
            .build()
            .map_err(|e| SyncError::config(format!("invalid pattern for `{region}`: {e}")))?;
        Ok(Rule {
            region: region.to_string(),
            matcher,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

/// Escape a keyword and anchor it on word boundaries, but only on sides that start or end with
/// a word character (a `\b` next to punctuation would never match).
fn keyword_pattern(keyword: &str) -> String {
    let keyword = keyword.trim();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let lead = if keyword.starts_with(is_word) { r"\b" } else { "" };
    let trail = if keyword.ends_with(is_word) { r"\b" } else { "" };
    format!("{lead}{}{trail}", regex::escape(keyword))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    region: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
}

/// Ordered rules; the first rule whose expression matches decides the region.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        RuleSet { rules }
    }

    fn from_table(table: &[(&str, &[&str])]) -> Result<Self, SyncError> {
        let rules = table
            .iter()
            .map(|(region, patterns)| Rule::patterns(region, *patterns))
            .collect::<Result<_, _>>()?;
        Ok(RuleSet::new(rules))
    }

    /// Parse a YAML list of `{region, keywords, patterns}` entries, in priority order.
    pub fn from_yaml_str(s: &str) -> Result<Self, SyncError> {
        let specs: Vec<RuleSpec> = serde_yaml::from_str(s)
            .map_err(|e| SyncError::config(format!("invalid region rules: {e}")))?;
        let rules = specs
            .iter()
            .map(|spec| {
                if spec.region.trim().is_empty() || spec.region == UNASSIGNED {
                    return Err(SyncError::config(format!(
                        "invalid region name `{}`",
                        spec.region
                    )));
                }
                // An empty alternative would match every record.
                if spec.keywords.iter().chain(&spec.patterns).any(|k| k.trim().is_empty()) {
                    return Err(SyncError::config(format!(
                        "region rule `{}` has a blank keyword or pattern",
                        spec.region
                    )));
                }
                let mut patterns: Vec<String> =
                    spec.keywords.iter().map(|k| keyword_pattern(k)).collect();
                patterns.extend(spec.patterns.iter().cloned());
                Rule::patterns(&spec.region, &patterns)
            })
            .collect::<Result<_, _>>()?;
        Ok(RuleSet::new(rules))
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let s = std::fs::read_to_string(path).map_err(|e| {
            SyncError::config(format!("cannot read region rules {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&s)
    }

    /// First matching region for the title and venue, or [`UNASSIGNED`].
    pub fn classify(&self, title: &str, venue: Option<&str>) -> &str {
        let text = match venue {
            Some(v) => format!("{title} {v}"),
            None => title.to_string(),
        };
        self.rules
            .iter()
            .find(|r| r.matches(&text))
            .map_or(UNASSIGNED, Rule::region)
    }

    pub fn assign(&self, publications: &mut [Publication]) {
        for p in publications {
            p.region = self.classify(&p.title, p.venue.as_deref()).to_string();
        }
    }

    /// Every tag this rule set can produce, in priority order, ending with [`UNASSIGNED`].
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for r in &self.rules {
            if !tags.contains(&r.region()) {
                tags.push(r.region());
            }
        }
        tags.push(UNASSIGNED);
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guam_keyword_maps_to_custom_tag() {
        let rules = RuleSet::from_yaml_str("- region: Marianas\n  keywords: [Guam]\n").unwrap();
        assert_eq!(rules.classify("coral growth in guam", None), "Marianas");
        assert_eq!(rules.classify("Coral Growth in Guam", None), "Marianas");
        assert_eq!(rules.classify("Coral growth in Guampton", None), UNASSIGNED);
    }

    #[test]
    fn first_rule_wins() {
        let rules = RuleSet::default();
        assert_eq!(
            rules.classify("Reef fish of Guam and the wider Pacific", None),
            "Mariana Archipelago"
        );
        assert_eq!(
            rules.classify("Oceanography of the Pacific Remote Islands", None),
            "Pacific Remote Island Areas"
        );
        assert_eq!(rules.classify("Pacific island fisheries", None), "Pacific-wide");
    }

    #[test]
    fn default_table_covers_each_region() {
        let rules = RuleSet::default();
        let cases = [
            ("Benthic cover around O'ahu", "Hawaiian Archipelago"),
            ("Monk seals in Papahānaumokuākea", "Hawaiian Archipelago"),
            ("Coral bleaching in Hawaiʻi", "Hawaiian Archipelago"),
            ("Fish biomass at Tutuila", "American Samoa"),
            ("Reef surveys, Saipan and Tinian", "Mariana Archipelago"),
            ("Sharks of Palmyra Atoll", "Pacific Remote Island Areas"),
            ("Turtle tagging", UNASSIGNED),
        ];
        for (title, region) in cases {
            assert_eq!(rules.classify(title, None), region, "{title}");
        }
    }

    #[test]
    fn default_table_avoids_substring_false_positives() {
        let rules = RuleSet::default();
        assert_eq!(rules.classify("Rotation of fishing effort", None), UNASSIGNED);
        assert_eq!(rules.classify("In the wake of bleaching", None), UNASSIGNED);
        assert_eq!(rules.classify("Ahupuaa water quality", None), UNASSIGNED);
    }

    #[test]
    fn venue_is_searched_too() {
        let rules = RuleSet::default();
        assert_eq!(
            rules.classify("Growth rates of Porites", Some("Pacific Science")),
            "Pacific-wide"
        );
    }

    #[test]
    fn yaml_rules_keep_their_order() {
        let rules = RuleSet::from_yaml_str(
            r#"
- region: Marianas
  keywords: [Guam, "U.S."]
- region: Anywhere
  patterns: ['\bcoral']
"#,
        )
        .unwrap();
        assert_eq!(rules.tags(), vec!["Marianas", "Anywhere", UNASSIGNED]);
        assert_eq!(rules.classify("Coral growth in Guam", None), "Marianas");
        assert_eq!(rules.classify("Corals of the U.S.", None), "Marianas");
        assert_eq!(rules.classify("Corals elsewhere", None), "Anywhere");
    }

    #[test]
    fn bad_yaml_rules_are_configuration_errors() {
        for src in [
            "- region: X\n  patterns: ['(']\n",
            "- region: X\n",
            "- region: Unassigned\n  keywords: [a]\n",
            "- region: X\n  keywords: [Guam, '']\n",
            "- region: X\n  keywords: ['  ']\n",
            "- region: X\n  patterns: ['']\n",
            "- regoin: X\n",
            "not: [a list",
        ] {
            let err = RuleSet::from_yaml_str(src).unwrap_err();
            assert!(matches!(err, SyncError::Configuration(_)), "{src}: {err}");
        }
    }

    #[test]
    fn classify_is_total() {
        let rules = RuleSet::default();
        let tags = rules.tags();
        proptest::proptest!(|(title in "\\PC{0,64}", venue in proptest::option::of("\\PC{0,32}"))| {
            let region = rules.classify(&title, venue.as_deref());
            proptest::prop_assert!(tags.contains(&region));
        })
    }

    #[test]
    fn duplicate_guam_titles_collapse_and_tag_as_marianas() {
        let raw = vec![
            serde_json::json!({"key": "A", "data": {"title": "Coral Growth in Guam", "date": "2020"}}),
            serde_json::json!({"key": "B", "data": {"title": "coral growth in guam ", "date": "2020"}}),
        ];
        let mut out = crate::normalize::normalize(&raw);
        let rules = RuleSet::from_yaml_str("- region: Marianas\n  keywords: [Guam]\n").unwrap();
        rules.assign(&mut out.publications);
        assert_eq!(out.publications.len(), 1);
        assert_eq!(out.publications[0].key, "A");
        assert_eq!(out.publications[0].region, "Marianas");
    }
}
