use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value;
use url::Url;

use crate::{
    config::Config,
    error::SyncError,
    source::{Page, PageSource},
};

const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const USER_AGENT: &str = concat!("pubsync/", env!("CARGO_PKG_VERSION"));

/// Items endpoint of one collection in a Zotero group library.
pub struct ZoteroClient {
    agent: ureq::Agent,
    items_url: Url,
    api_key: String,
}

impl ZoteroClient {
    pub fn new(config: &Config) -> Result<Self, SyncError> {
        let cfg = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(5).min(config.timeout)))
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build();
        Ok(ZoteroClient {
            agent: ureq::Agent::new_with_config(cfg),
            items_url: items_url(&config.api_base, &config.group_id, &config.collection_key)?,
            api_key: config.api_key.clone(),
        })
    }

    pub fn items_url(&self) -> &Url {
        &self.items_url
    }

    fn page_url(&self, start: usize, limit: usize) -> Url {
        let mut url = self.items_url.clone();
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("limit", &limit.to_string())
            .append_pair("start", &start.to_string());
        url
    }
}

impl PageSource for ZoteroClient {
    fn fetch_page(&self, start: usize, limit: usize) -> Result<Page, SyncError> {
        let url = self.page_url(start, limit);
        let mut res = self
            .agent
            .get(url.as_str())
            .header("Zotero-API-Key", &self.api_key)
            .header("Zotero-API-Version", "3")
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()?;

        let status = res.status().as_u16();
        let header = |name: &str| {
            res.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        };
        let total = header("Total-Results").and_then(|v| v.parse().ok());
        let backoff = header("Backoff")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        let body = res.body_mut().read_to_string()?;
        check_status(status, &self.items_url, &body)?;

        Ok(Page {
            items: parse_items(&body)?,
            total,
            backoff,
        })
    }
}

fn items_url(base: &Url, group_id: &str, collection_key: &str) -> Result<Url, SyncError> {
    let group = utf8_percent_encode(group_id.trim(), PATH_SEGMENT_ENCODE_SET);
    let collection = utf8_percent_encode(collection_key.trim(), PATH_SEGMENT_ENCODE_SET);
    let raw = format!(
        "{}/groups/{group}/collections/{collection}/items",
        base.as_str().trim_end_matches('/')
    );
    Url::parse(&raw).map_err(|e| SyncError::config(format!("invalid API URL {raw}: {e}")))
}

/// Map the HTTP status of a page response to the error kinds callers act on.
fn check_status(status: u16, url: &Url, body: &str) -> Result<(), SyncError> {
    let url = url.to_string();
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(SyncError::Authentication { status, url }),
        404 => Err(SyncError::NotFound { url }),
        429 => Err(SyncError::Fetch(format!("rate limited by {url} (HTTP 429)"))),
        _ => {
            let detail: String = body.trim().chars().take(200).collect();
            Err(SyncError::Fetch(format!("HTTP {status} from {url}: {detail}")))
        }
    }
}

fn parse_items(body: &str) -> Result<Vec<Value>, SyncError> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => Ok(items),
        _ => {
            let snippet: String = body.trim().chars().take(80).collect();
            Err(SyncError::Fetch(format!(
                "expected a JSON array of items, got: {snippet}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.zotero.org").unwrap()
    }

    #[test]
    fn items_url_has_group_and_collection() {
        let url = items_url(&base(), "123456", "ABCD2345").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.zotero.org/groups/123456/collections/ABCD2345/items"
        );
    }

    #[test]
    fn items_url_encodes_segments() {
        let url = items_url(&base(), "12 34", "a/b?c").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.zotero.org/groups/12%2034/collections/a%2Fb%3Fc/items"
        );
    }

    #[test]
    fn items_url_tolerates_trailing_slash_and_prefix() {
        let base = Url::parse("http://127.0.0.1:8080/zotero/").unwrap();
        let url = items_url(&base, "1", "C").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/zotero/groups/1/collections/C/items"
        );
    }

    #[test]
    fn status_mapping() {
        let url = base();
        assert!(check_status(200, &url, "").is_ok());
        assert!(matches!(
            check_status(403, &url, "Forbidden"),
            Err(SyncError::Authentication { status: 403, .. })
        ));
        assert!(matches!(
            check_status(401, &url, ""),
            Err(SyncError::Authentication { status: 401, .. })
        ));
        assert!(matches!(
            check_status(404, &url, "Not found"),
            Err(SyncError::NotFound { .. })
        ));
        for status in [429, 500, 503] {
            let err = check_status(status, &url, "Service Unavailable").unwrap_err();
            assert!(matches!(err, SyncError::Fetch(_)), "{status}");
        }
    }

    #[test]
    fn parse_items_requires_an_array() {
        assert_eq!(parse_items("[]").unwrap().len(), 0);
        assert_eq!(parse_items(r#"[{"key":"A"},{"key":"B"}]"#).unwrap().len(), 2);
        assert!(matches!(
            parse_items(r#"{"message":"oops"}"#),
            Err(SyncError::Fetch(_))
        ));
        assert!(matches!(parse_items("<html>"), Err(SyncError::Fetch(_))));
    }

    fn client(server: &mockito::ServerGuard) -> ZoteroClient {
        let config = Config {
            api_key: "k3y".to_string(),
            group_id: "123".to_string(),
            collection_key: "ABCD".to_string(),
            api_base: Url::parse(&server.url()).unwrap(),
            page_size: 2,
            page_delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
            outputs: Vec::new(),
            rules: None,
        };
        ZoteroClient::new(&config).unwrap()
    }

    #[test]
    fn fetch_page_reads_pacing_headers() {
        use mockito::Matcher;

        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/groups/123/collections/ABCD/items")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("format".into(), "json".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
                Matcher::UrlEncoded("start".into(), "4".into()),
            ]))
            .match_header("Zotero-API-Key", "k3y")
            .match_header("Zotero-API-Version", "3")
            .with_header("Total-Results", " 7 ")
            .with_header("Backoff", "3")
            .with_body(r#"[{"key":"A"},{"key":"B"}]"#)
            .expect(1)
            .create();

        let page = client(&server).fetch_page(4, 2).unwrap();
        mock.assert();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, Some(7));
        assert_eq!(page.backoff, Some(Duration::from_secs(3)));
    }

    #[test]
    fn fetch_page_without_pacing_headers() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/groups/123/collections/ABCD/items")
            .match_query(mockito::Matcher::Any)
            .with_header("Backoff", "soon")
            .with_body("[]")
            .create();

        let page = client(&server).fetch_page(0, 2).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, None);
        assert_eq!(page.backoff, None);
    }

    #[test]
    fn fetch_page_maps_rejected_key() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/groups/123/collections/ABCD/items")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_body("Forbidden")
            .create();

        let err = client(&server).fetch_page(0, 2).unwrap_err();
        assert!(matches!(err, SyncError::Authentication { status: 403, .. }), "{err}");
    }
}
