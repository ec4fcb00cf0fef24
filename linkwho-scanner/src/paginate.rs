//! Cursor-following pagination over the query API.
//!
//! A [`PageQuery`] describes one logical query; [`paginate`] turns it into a
//! lazy stream of items that fetches the next page only when the consumer
//! asks for more. Faults end the stream early and are logged, so callers
//! always see a (possibly partial) finite sequence.

use crate::client::ApiClient;
use crate::error::Result;
use async_stream::stream;
use futures::Stream;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// One logical paginated query against a site's endpoint
#[derive(Debug, Clone)]
pub struct PageQuery {
    pub endpoint: Url,
    pub params: Vec<(String, String)>,
    /// Key inside the `continue` object whose absence ends pagination.
    /// `None` for one-shot queries.
    pub continue_key: Option<&'static str>,
}

impl PageQuery {
    pub fn new(endpoint: Url, continue_key: &'static str) -> Self {
        Self {
            continue_key: Some(continue_key),
            ..Self::single(endpoint)
        }
    }

    /// A query answered by a single response, with no continuation
    pub fn single(endpoint: Url) -> Self {
        Self {
            endpoint,
            params: vec![
                ("action".to_string(), "query".to_string()),
                ("format".to_string(), "json".to_string()),
            ],
            continue_key: None,
        }
    }

    fn cursor(&self) -> &'static str {
        self.continue_key.unwrap_or("single")
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: String) {
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
    }

    fn apply_continuation(&mut self, continuation: &Map<String, Value>) {
        for (key, value) in continuation {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            self.set(key, value);
        }
    }
}

/// Returns the `continue` object if it carries the stream's continuation key
fn continuation_for(page: &Value, continue_key: &str) -> Option<Map<String, Value>> {
    page.get("continue")
        .and_then(Value::as_object)
        .filter(|c| c.contains_key(continue_key))
        .cloned()
}

/// Follow `query` across continuation pages, yielding whatever `extract`
/// pulls out of each page, in upstream order.
///
/// The stream is finite and not restartable: issue a fresh call to rescan.
pub fn paginate<'a, T, F>(
    client: &'a ApiClient,
    query: PageQuery,
    extract: F,
) -> impl Stream<Item = T> + Send + 'a
where
    T: Send + 'a,
    F: FnMut(&Value) -> Vec<T> + Send + 'a,
{
    let fetch = move |query: PageQuery| async move { client.get_json(&query.endpoint, &query.params).await };
    follow_pages(client.request_delay(), query, fetch, extract)
}

/// Pagination loop over any page source. `delay` is waited between pages,
/// never before the first or after the last.
fn follow_pages<'a, T, F, G, Fut>(
    delay: Duration,
    mut query: PageQuery,
    mut fetch: G,
    mut extract: F,
) -> impl Stream<Item = T> + Send + 'a
where
    T: Send + 'a,
    F: FnMut(&Value) -> Vec<T> + Send + 'a,
    G: FnMut(PageQuery) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Value>> + Send + 'a,
{
    stream! {
        let mut pages_fetched = 0usize;

        loop {
            if pages_fetched > 0 {
                tokio::time::sleep(delay).await;
            }

            let page = match fetch(query.clone()).await {
                Ok(page) => page,
                Err(e) => {
                    error!(
                        "Pagination of {} ({}) stopped after {} page(s): {}",
                        query.endpoint, query.cursor(), pages_fetched, e
                    );
                    break;
                }
            };
            pages_fetched += 1;

            if let Some(api_error) = page.get("error") {
                warn!(
                    "Upstream error from {} ({}): {}",
                    query.endpoint, query.cursor(), api_error
                );
                break;
            }

            let items = extract(&page);
            let continuation = query
                .continue_key
                .and_then(|key| continuation_for(&page, key));
            debug!(
                "Page {} of {} ({}) held {} item(s), more: {}",
                pages_fetched,
                query.endpoint,
                query.cursor(),
                items.len(),
                continuation.is_some()
            );

            for item in items {
                yield item;
            }

            match continuation {
                Some(continuation) => query.apply_continuation(&continuation),
                None => break,
            }
        }
    }
}
