//! Revision history streaming and link introduction detection.

use crate::client::ApiClient;
use crate::error::Result;
use crate::paginate::{PageQuery, paginate};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use url::Url;

/// One revision of a page, held only while a scan looks at it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub timestamp: String,
    /// Empty when the editor is hidden or anonymized
    pub user: String,
    pub content: String,
}

impl Revision {
    /// Read a revision entry from a `prop=revisions` response.
    ///
    /// Missing fields become empty strings rather than errors.
    pub fn from_json(rev: &Value) -> Self {
        let text = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().to_string();

        let main_slot = rev.get("slots").and_then(|s| s.get("main"));
        let content = main_slot
            .and_then(|slot| slot.get("*").or_else(|| slot.get("content")))
            .or_else(|| rev.get("*"));

        Self {
            timestamp: text(rev.get("timestamp")),
            user: text(rev.get("user")),
            content: text(content),
        }
    }
}

/// Who first put a link on a page, and when
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Introduction {
    pub editor: Option<String>,
    pub timestamp: Option<String>,
}

impl Introduction {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.timestamp.is_some()
    }
}

/// Tracks link presence across consecutive revisions.
///
/// History starts in the "absent" state, so a link present in the very first
/// revision counts as introduced by it.
#[derive(Debug)]
pub struct IntroductionDetector<'a> {
    link: &'a str,
    previously_present: bool,
}

impl<'a> IntroductionDetector<'a> {
    pub fn new(link: &'a str) -> Self {
        Self {
            link,
            previously_present: false,
        }
    }

    /// Feed the next revision; returns true if it flips the link from absent to present
    pub fn observe(&mut self, revision: &Revision) -> bool {
        let present = revision.content.contains(self.link);
        let introduced = present && !self.previously_present;
        self.previously_present = present;
        introduced
    }
}

/// Single forward pass over `revisions` (oldest first).
///
/// Stops pulling from the stream as soon as the introduction is found, so
/// later history pages are never requested.
pub async fn detect_introduction<S>(revisions: S, link: &str) -> Introduction
where
    S: Stream<Item = Revision>,
{
    let mut revisions = std::pin::pin!(revisions);
    let mut detector = IntroductionDetector::new(link);

    while let Some(revision) = revisions.next().await {
        if detector.observe(&revision) {
            let editor = Some(revision.user).filter(|user| !user.is_empty());
            return Introduction {
                editor,
                timestamp: Some(revision.timestamp),
            };
        }
    }

    Introduction::absent()
}

fn revisions_in(page: &Value) -> Vec<Revision> {
    let pages: Vec<&Value> = match page.get("query").and_then(|q| q.get("pages")) {
        Some(Value::Object(by_id)) => by_id.values().collect(),
        Some(Value::Array(list)) => list.iter().collect(),
        _ => Vec::new(),
    };

    pages
        .into_iter()
        .filter_map(|p| p.get("revisions").and_then(Value::as_array))
        .flatten()
        .map(Revision::from_json)
        .collect()
}

/// Streams a page's history and runs introduction detection over it
#[derive(Debug, Clone)]
pub struct RevisionScanner {
    client: ApiClient,
    scans: Arc<AtomicUsize>,
}

impl RevisionScanner {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            scans: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Lazy oldest-to-newest revision stream for `title`
    pub fn revisions<'a>(&'a self, endpoint: Url, title: &str) -> impl Stream<Item = Revision> + Send + 'a {
        let query = PageQuery::new(endpoint, "rvcontinue")
            .param("prop", "revisions")
            .param("titles", title)
            .param("rvslots", "main")
            .param("rvprop", "timestamp|user|content")
            .param("rvdir", "newer")
            .param("rvlimit", "max");

        paginate(&self.client, query, revisions_in)
    }

    pub async fn scan(&self, site: &str, title: &str, link: &str) -> Result<Introduction> {
        let endpoint = self.client.endpoint(site)?;
        self.scans.fetch_add(1, Ordering::Relaxed);
        debug!("Scanning history of {}:{} for {}", site, title, link);

        let introduction = detect_introduction(self.revisions(endpoint, title), link).await;

        debug!("{}:{} -> {:?}", site, title, introduction);
        Ok(introduction)
    }

    /// Number of history scans started so far
    pub fn scans_performed(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;
    use futures::stream;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param, query_param_is_missing},
    };

    fn rev(timestamp: &str, user: &str, content: &str) -> Revision {
        Revision {
            timestamp: timestamp.to_string(),
            user: user.to_string(),
            content: content.to_string(),
        }
    }

    fn rev_json(timestamp: &str, user: &str, content: &str) -> Value {
        json!({
            "timestamp": timestamp,
            "user": user,
            "slots": {"main": {"contentmodel": "wikitext", "*": content}}
        })
    }

    fn scanner_for(server: &MockServer) -> RevisionScanner {
        RevisionScanner::new(
            ApiClient::new(ClientOptions {
                api_template: format!("{}/{{site}}/w/api.php", server.uri()),
                request_delay: Duration::ZERO,
                ..ClientOptions::default()
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_first_transition_wins() {
        let history = vec![
            rev("2020-01-01T00:00:00Z", "Carol", "no links here"),
            rev("2020-02-01T00:00:00Z", "Alice", "see https://target.com/a"),
            rev("2020-03-01T00:00:00Z", "Bob", "see https://target.com/a too"),
        ];

        let found = detect_introduction(stream::iter(history), "target.com").await;

        assert_eq!(found.editor.as_deref(), Some("Alice"));
        assert_eq!(found.timestamp.as_deref(), Some("2020-02-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_present_in_first_revision() {
        let history = vec![
            rev("2019-05-05T00:00:00Z", "Dave", "target.com from day one"),
            rev("2019-06-05T00:00:00Z", "Erin", "target.com still"),
        ];

        let found = detect_introduction(stream::iter(history), "target.com").await;

        assert_eq!(found.editor.as_deref(), Some("Dave"));
    }

    #[tokio::test]
    async fn test_readded_link_keeps_original_introducer() {
        let history = vec![
            rev("t1", "Alice", "target.com"),
            rev("t2", "Vandal", "blanked"),
            rev("t3", "Bob", "target.com restored"),
        ];

        let found = detect_introduction(stream::iter(history), "target.com").await;

        assert_eq!(found.editor.as_deref(), Some("Alice"));
        assert_eq!(found.timestamp.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_no_revisions_is_absent() {
        let found = detect_introduction(stream::iter(Vec::<Revision>::new()), "target.com").await;
        assert_eq!(found, Introduction::absent());
        assert!(!found.is_found());
    }

    #[tokio::test]
    async fn test_never_present_is_absent() {
        let history = vec![rev("t1", "Alice", "nothing"), rev("t2", "Bob", "still nothing")];
        let found = detect_introduction(stream::iter(history), "target.com").await;
        assert_eq!(found, Introduction::absent());
    }

    #[tokio::test]
    async fn test_hidden_editor_keeps_timestamp() {
        let history = vec![rev("t1", "", "target.com")];
        let found = detect_introduction(stream::iter(history), "target.com").await;

        assert_eq!(found.editor, None);
        assert_eq!(found.timestamp.as_deref(), Some("t1"));
        assert!(found.is_found());
    }

    #[tokio::test]
    async fn test_detection_is_repeatable() {
        let history = vec![
            rev("t1", "A", "x"),
            rev("t2", "B", "x target.com"),
            rev("t3", "C", "x"),
            rev("t4", "D", "target.com"),
        ];

        let first = detect_introduction(stream::iter(history.clone()), "target.com").await;
        for _ in 0..5 {
            let again = detect_introduction(stream::iter(history.clone()), "target.com").await;
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_detector_matches_literal_substring_only() {
        let mut detector = IntroductionDetector::new("https://Target.com");
        assert!(!detector.observe(&rev("t1", "A", "https://target.com")));
        assert!(detector.observe(&rev("t2", "B", "https://Target.com/x")));
        assert!(!detector.observe(&rev("t3", "C", "https://Target.com/x")));
    }

    #[test]
    fn test_revision_from_json_fallbacks() {
        let modern = Revision::from_json(&rev_json("t1", "Alice", "body"));
        assert_eq!(modern, rev("t1", "Alice", "body"));

        let formatv2 = Revision::from_json(&json!({
            "timestamp": "t2",
            "user": "Bob",
            "slots": {"main": {"content": "v2 body"}}
        }));
        assert_eq!(formatv2.content, "v2 body");

        let legacy = Revision::from_json(&json!({"timestamp": "t3", "*": "legacy body"}));
        assert_eq!(legacy, rev("t3", "", "legacy body"));

        let hidden = Revision::from_json(&json!({"timestamp": "t4", "userhidden": "", "texthidden": ""}));
        assert_eq!(hidden, rev("t4", "", ""));
    }

    #[tokio::test]
    async fn test_scan_example_page_over_two_history_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/en/w/api.php"))
            .and(query_param("prop", "revisions"))
            .and(query_param("titles", "Example"))
            .and(query_param("rvdir", "newer"))
            .and(query_param_is_missing("rvcontinue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "continue": {"rvcontinue": "20200201|2", "continue": "||"},
                "query": {"pages": {"42": {
                    "pageid": 42,
                    "title": "Example",
                    "revisions": [rev_json("2020-01-01T00:00:00Z", "Zed", "plain text")]
                }}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/en/w/api.php"))
            .and(query_param("rvcontinue", "20200201|2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": {"42": {
                    "pageid": 42,
                    "title": "Example",
                    "revisions": [
                        rev_json("2020-02-01T00:00:00Z", "Alice", "cite target.com"),
                        rev_json("2020-03-01T00:00:00Z", "Bob", "cite target.com again")
                    ]
                }}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scanner = scanner_for(&server);
        let found = scanner.scan("en", "Example", "target.com").await.unwrap();

        assert_eq!(found.editor.as_deref(), Some("Alice"));
        assert_eq!(found.timestamp.as_deref(), Some("2020-02-01T00:00:00Z"));
        assert_eq!(scanner.scans_performed(), 1);
    }

    #[tokio::test]
    async fn test_scan_stops_paging_after_introduction() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param_is_missing("rvcontinue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "continue": {"rvcontinue": "next"},
                "query": {"pages": {"1": {"revisions": [rev_json("t1", "Alice", "target.com")]}}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("rvcontinue", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"query": {"pages": {}}})))
            .expect(0)
            .mount(&server)
            .await;

        let scanner = scanner_for(&server);
        let found = scanner.scan("en", "Early", "target.com").await.unwrap();

        assert_eq!(found.editor.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_scan_missing_page_is_absent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": {"-1": {"ns": 0, "title": "Empty", "missing": ""}}}
            })))
            .mount(&server)
            .await;

        let scanner = scanner_for(&server);
        let found = scanner.scan("en", "Empty", "target.com").await.unwrap();

        assert_eq!(found, Introduction::absent());
    }
}
