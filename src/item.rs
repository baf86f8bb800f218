use serde_json::{Map, Value};

/// A bibliographic item as returned by the Zotero API, before any cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub item_type: ItemType,
    pub title: Option<String>,
    pub creators: Vec<Creator>,
    pub date: Option<String>,
    pub venue: Option<String>,
    pub doi: Option<String>,
    pub issn: Option<String>,
    pub url: Option<String>,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemType {
    Attachment,
    Note,
    Other(String),
}

impl ItemType {
    fn from_api(s: &str) -> Self {
        match s {
            "attachment" => ItemType::Attachment,
            "note" => ItemType::Note,
            other => ItemType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Attachment => "attachment",
            ItemType::Note => "note",
            ItemType::Other(s) => s,
        }
    }
}

/// Zotero stores creators either split into first/last name or as a single field
/// (institutions, mononyms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Creator {
    Split { first: String, last: String },
    Single(String),
}

/// Fields holding the container a work appeared in, by precedence.
const VENUE_FIELDS: &[&str] = &[
    "publicationTitle",
    "proceedingsTitle",
    "bookTitle",
    "institution",
    "university",
    "publisher",
    "websiteTitle",
];

impl Item {
    /// Parse one element of an API page. Never fails: fields with an unexpected shape are
    /// treated as absent and reported through `problems`.
    pub fn from_api(value: &Value, problems: &mut Vec<String>) -> Self {
        let empty = Map::new();
        let data = match value.get("data") {
            Some(Value::Object(d)) => d,
            Some(_) => {
                problems.push("`data` is not an object".to_string());
                &empty
            }
            None => {
                problems.push("missing `data` object".to_string());
                &empty
            }
        };

        let key = text(value.get("key"), "key", problems)
            .or_else(|| text(data.get("key"), "key", problems))
            .unwrap_or_default();
        let item_type = text(data.get("itemType"), "itemType", problems)
            .map(|t| ItemType::from_api(&t))
            .unwrap_or_else(|| ItemType::Other(String::new()));

        let venue = VENUE_FIELDS
            .iter()
            .find_map(|f| text(data.get(*f), f, problems));

        Item {
            key,
            item_type,
            title: text(data.get("title"), "title", problems),
            creators: creators(data.get("creators"), problems),
            date: text(data.get("date"), "date", problems),
            venue,
            doi: text(data.get("DOI"), "DOI", problems),
            issn: text(data.get("ISSN"), "ISSN", problems),
            url: text(data.get("url"), "url", problems),
            parent: text(data.get("parentItem"), "parentItem", problems),
        }
    }

    /// Attachments and notes hang under a parent item and are not publications themselves.
    pub fn is_child(&self) -> bool {
        matches!(self.item_type, ItemType::Attachment | ItemType::Note) || self.parent.is_some()
    }
}

/// A non-blank string field. Numbers are accepted as text; other shapes are reported.
fn text(value: Option<&Value>, field: &str, problems: &mut Vec<String>) -> Option<String> {
    match value? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        _ => {
            problems.push(format!("`{field}` has an unexpected type"));
            None
        }
    }
}

fn creators(value: Option<&Value>, problems: &mut Vec<String>) -> Vec<Creator> {
    let list = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(list)) => list,
        Some(_) => {
            problems.push("`creators` is not a list".to_string());
            return Vec::new();
        }
    };

    list.iter()
        .filter_map(|c| {
            let Value::Object(c) = c else {
                problems.push("creator entry is not an object".to_string());
                return None;
            };
            if let Some(name) = text(c.get("name"), "name", problems) {
                return Some(Creator::Single(name));
            }
            let first = text(c.get("firstName"), "firstName", problems).unwrap_or_default();
            let last = text(c.get("lastName"), "lastName", problems).unwrap_or_default();
            if first.trim().is_empty() && last.trim().is_empty() {
                None
            } else {
                Some(Creator::Split { first, last })
            }
        })
        .collect()
}
