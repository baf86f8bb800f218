#![allow(dead_code)]

use assert_cmd::Command;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{Value, json};

pub const API_KEY: &str = "test-key";
pub const GROUP_ID: &str = "123456";
pub const COLLECTION_KEY: &str = "ABCD2345";
pub const ITEMS_PATH: &str = "/groups/123456/collections/ABCD2345/items";

/// Mock Zotero API for one group collection.
pub struct Zotero {
    pub server: ServerGuard,
}

impl Zotero {
    pub fn new() -> Self {
        Zotero {
            server: Server::new(),
        }
    }

    pub fn base(&self) -> String {
        self.server.url()
    }

    /// Unregistered page request for `start`/`limit`: only matches when the client sends the
    /// API key and version headers. `total` goes out as `Total-Results`.
    pub fn page(&mut self, items: &[Value], start: usize, limit: usize, total: usize) -> Mock {
        let end = (start + limit).min(items.len());
        let body = Value::Array(items.get(start.min(end)..end).unwrap_or_default().to_vec());
        self.server
            .mock("GET", ITEMS_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("format".into(), "json".into()),
                Matcher::UrlEncoded("limit".into(), limit.to_string()),
                Matcher::UrlEncoded("start".into(), start.to_string()),
            ]))
            .match_header("Zotero-API-Key", API_KEY)
            .match_header("Zotero-API-Version", "3")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("Total-Results", &total.to_string())
            .with_body(body.to_string())
    }

    /// Every page the client walks through to fetch `items` with `limit`, each expected `hits`
    /// times.
    pub fn serve(&mut self, items: &[Value], limit: usize, hits: usize) -> Vec<Mock> {
        let mut starts: Vec<usize> = (0..items.len()).step_by(limit).collect();
        if starts.is_empty() {
            starts.push(0);
        }
        starts
            .into_iter()
            .map(|start| {
                self.page(items, start, limit, items.len())
                    .expect(hits)
                    .create()
            })
            .collect()
    }

    /// Answer every items request with `status`.
    pub fn fail(&mut self, status: usize, body: &str) -> Mock {
        self.server
            .mock("GET", ITEMS_PATH)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(body)
            .expect(1)
            .create()
    }

    /// Registers a catch-all that must never be hit.
    pub fn untouched(&mut self) -> Mock {
        self.server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::Any)
            .expect(0)
            .create()
    }
}

pub fn article(key: &str, title: &str, date: &str) -> Value {
    json!({
        "key": key,
        "version": 1,
        "data": {
            "key": key,
            "itemType": "journalArticle",
            "title": title,
            "creators": [{"creatorType": "author", "firstName": "Ana", "lastName": "Cruz"}],
            "date": date,
            "publicationTitle": "Coral Reefs",
            "DOI": "",
            "url": ""
        }
    })
}

/// The binary with every setting it reads from the environment cleared, so the caller's shell
/// cannot leak into a test.
pub fn pubsync() -> Command {
    let mut cmd = Command::cargo_bin("pubsync").expect("binary");
    for var in [
        "ZOTERO_API_KEY",
        "ZOTERO_GROUP_ID",
        "ZOTERO_COLLECTION_KEY",
        "ZOTERO_API_BASE",
        "ZOTERO_PAGE_SIZE",
        "ZOTERO_PAGE_DELAY_MS",
        "ZOTERO_TIMEOUT_SECS",
        "PUBSYNC_OUTPUT",
        "PUBSYNC_RULES",
        "OUTPUT_DIR",
        "RUST_LOG",
        "HTTP_PROXY",
        "HTTPS_PROXY",
        "ALL_PROXY",
        "http_proxy",
        "https_proxy",
        "all_proxy",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1").env("ZOTERO_PAGE_DELAY_MS", "0");
    cmd
}

/// [`pubsync`] pointed at `zotero` with valid credentials.
pub fn configured(zotero: &Zotero) -> Command {
    let mut cmd = pubsync();
    cmd.env("ZOTERO_API_KEY", API_KEY)
        .env("ZOTERO_GROUP_ID", GROUP_ID)
        .env("ZOTERO_COLLECTION_KEY", COLLECTION_KEY)
        .env("ZOTERO_API_BASE", zotero.base());
    cmd
}
