//! Editor profile and recent contribution lookups.

use crate::client::ApiClient;
use crate::editors::EditorKey;
use crate::error::Result;
use crate::paginate::{PageQuery, paginate};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

pub const USER_PROPERTIES: &str =
    "blockinfo|cancreate|centralids|editcount|groupmemberships|groups|implicitgroups|registration|rights|emailable";
pub const CONTRIBUTION_PROPERTIES: &str = "ids|title|timestamp|comment|size|sizediff|tags|flags";

/// Largest `uclimit` the API grants regular clients
const MAX_CONTRIBUTION_BATCH: usize = 500;

pub const DEFAULT_CONTRIBUTION_CAP: usize = 10;

/// Profile attributes as returned upstream; empty when the editor is unknown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorProfile {
    pub key: EditorKey,
    pub attributes: Map<String, Value>,
}

/// One recent edit by an editor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub key: EditorKey,
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorMetadata {
    pub profile: EditorProfile,
    pub contributions: Vec<Contribution>,
}

fn first_user(page: &Value) -> Map<String, Value> {
    page.get("query")
        .and_then(|q| q.get("users"))
        .and_then(Value::as_array)
        .and_then(|users| users.first())
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn contributions_in(page: &Value) -> Vec<Map<String, Value>> {
    page.get("query")
        .and_then(|q| q.get("usercontribs"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).cloned().collect())
        .unwrap_or_default()
}

pub struct MetadataFetcher {
    client: ApiClient,
    contribution_cap: usize,
}

impl MetadataFetcher {
    pub fn new(client: ApiClient, contribution_cap: usize) -> Self {
        Self {
            client,
            contribution_cap,
        }
    }

    pub async fn profile(&self, key: &EditorKey) -> Result<EditorProfile> {
        let endpoint = self.client.endpoint(&key.site)?;
        let query = PageQuery::single(endpoint)
            .param("list", "users")
            .param("ususers", key.editor.as_str())
            .param("usprop", USER_PROPERTIES);

        let attributes = match self.client.get_json(&query.endpoint, &query.params).await {
            Ok(page) => first_user(&page),
            Err(e) => {
                error!("User info lookup failed for {}: {}", key, e);
                Map::new()
            }
        };

        Ok(EditorProfile {
            key: key.clone(),
            attributes,
        })
    }

    /// The most recent contributions, at most `contribution_cap`, in server order
    pub async fn contributions(&self, key: &EditorKey) -> Result<Vec<Contribution>> {
        let endpoint = self.client.endpoint(&key.site)?;
        let batch = self.contribution_cap.clamp(1, MAX_CONTRIBUTION_BATCH);
        let query = PageQuery::new(endpoint, "uccontinue")
            .param("list", "usercontribs")
            .param("ucuser", key.editor.as_str())
            .param("ucprop", CONTRIBUTION_PROPERTIES)
            .param("uclimit", batch.to_string());

        let contributions: Vec<Contribution> = paginate(&self.client, query, contributions_in)
            .take(self.contribution_cap)
            .map(|attributes| Contribution {
                key: key.clone(),
                attributes,
            })
            .collect()
            .await;

        debug!("{} -> {} contribution(s)", key, contributions.len());
        Ok(contributions)
    }

    pub async fn fetch(&self, key: &EditorKey) -> Result<EditorMetadata> {
        let profile = self.profile(key).await?;
        let contributions = self.contributions(key).await?;
        Ok(EditorMetadata {
            profile,
            contributions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param, query_param_is_missing},
    };

    fn fetcher_for(server: &MockServer, cap: usize) -> MetadataFetcher {
        let client = ApiClient::new(ClientOptions {
            api_template: format!("{}/{{site}}/w/api.php", server.uri()),
            request_delay: Duration::ZERO,
            ..ClientOptions::default()
        })
        .unwrap();
        MetadataFetcher::new(client, cap)
    }

    fn contribs(range: std::ops::Range<u64>) -> Value {
        Value::Array(
            range
                .map(|id| json!({"revid": id, "title": format!("Page {}", id), "timestamp": "t"}))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_profile_reads_first_user() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/en/w/api.php"))
            .and(query_param("list", "users"))
            .and(query_param("ususers", "Alice"))
            .and(query_param("usprop", USER_PROPERTIES))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"users": [{"userid": 7, "name": "Alice", "editcount": 1234, "groups": ["*", "user"]}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, 10);
        let profile = fetcher.profile(&EditorKey::new("en", "Alice")).await.unwrap();

        assert_eq!(profile.key, EditorKey::new("en", "Alice"));
        assert_eq!(profile.attributes["editcount"], 1234);
        assert_eq!(profile.attributes["groups"], json!(["*", "user"]));
    }

    #[tokio::test]
    async fn test_profile_failure_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, 10);
        let profile = fetcher.profile(&EditorKey::new("en", "Ghost")).await.unwrap();

        assert!(profile.attributes.is_empty());
    }

    #[tokio::test]
    async fn test_contributions_capped_across_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("list", "usercontribs"))
            .and(query_param("ucuser", "Alice"))
            .and(query_param("uclimit", "5"))
            .and(query_param_is_missing("uccontinue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "continue": {"uccontinue": "p2", "continue": "-||"},
                "query": {"usercontribs": contribs(0..3)}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("uccontinue", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "continue": {"uccontinue": "p3", "continue": "-||"},
                "query": {"usercontribs": contribs(3..6)}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("uccontinue", "p3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"usercontribs": contribs(6..9)}
            })))
            .expect(0)
            .mount(&server)
            .await;

        // Upstream returns short pages, so the cap is only reached on page two
        let fetcher = fetcher_for(&server, 5);
        let contributions = fetcher.contributions(&EditorKey::new("en", "Alice")).await.unwrap();

        let ids: Vec<u64> = contributions
            .iter()
            .filter_map(|c| c.attributes["revid"].as_u64())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(contributions.iter().all(|c| c.key == EditorKey::new("en", "Alice")));
    }

    #[tokio::test]
    async fn test_fewer_contributions_than_cap() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("list", "usercontribs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"usercontribs": contribs(0..2)}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, 10);
        let contributions = fetcher.contributions(&EditorKey::new("en", "Newbie")).await.unwrap();

        assert_eq!(contributions.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_combines_profile_and_contributions() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("list", "users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"users": [{"name": "Bob", "missing": ""}]}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("list", "usercontribs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"query": {"usercontribs": []}})))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, 10);
        let metadata = fetcher.fetch(&EditorKey::new("fr", "Bob")).await.unwrap();

        assert_eq!(metadata.profile.attributes["name"], "Bob");
        assert!(metadata.contributions.is_empty());
    }
}
