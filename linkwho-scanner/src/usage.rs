//! External link usage crawling for one (site, domain) pair.

use crate::client::ApiClient;
use crate::editors::{EditorKey, EditorSet};
use crate::error::Result;
use crate::introductions::Introductions;
use crate::paginate::{PageQuery, paginate};
use crate::revisions::Introduction;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum batch size the usage query accepts for regular clients
pub const USAGE_BATCH_SIZE: usize = 500;

/// A page on `site` that links to `url`, which matched `domain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkUsage {
    pub site: String,
    pub domain: String,
    pub url: String,
    pub page_title: String,
    pub page_link: String,
    /// Introducing editor, empty when unknown
    pub user: String,
    /// Introduction timestamp, empty when unknown
    pub timestamp: String,
}

impl LinkUsage {
    pub fn new(site: &str, domain: &str, url: String, page_title: String, page_link: String) -> Self {
        Self {
            site: site.to_string(),
            domain: domain.to_string(),
            url,
            page_title,
            page_link,
            user: String::new(),
            timestamp: String::new(),
        }
    }

    pub fn with_introduction(mut self, introduction: &Introduction) -> Self {
        self.user = introduction.editor.clone().unwrap_or_default();
        self.timestamp = introduction.timestamp.clone().unwrap_or_default();
        self
    }

    /// The editor to look up later, if this usage has a named introducer
    pub fn editor_key(&self) -> Option<EditorKey> {
        (!self.user.is_empty()).then(|| EditorKey::new(self.site.as_str(), self.user.as_str()))
    }
}

/// Callback receiving each completed usage record
pub type UsageCallback = Arc<dyn Fn(LinkUsage) + Send + Sync>;

fn usage_items(page: &Value) -> Vec<(String, String)> {
    page.get("query")
        .and_then(|q| q.get("exturlusage"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    let field = |name: &str| item.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
                    (field("url"), field("title"))
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct LinkUsageCrawler {
    client: ApiClient,
    introductions: Arc<Introductions>,
    editors: Arc<EditorSet>,
    usage_callback: Option<UsageCallback>,
}

impl LinkUsageCrawler {
    pub fn new(client: ApiClient, introductions: Arc<Introductions>, editors: Arc<EditorSet>) -> Self {
        Self {
            client,
            introductions,
            editors,
            usage_callback: None,
        }
    }

    pub fn with_usage_callback(mut self, callback: UsageCallback) -> Self {
        self.usage_callback = Some(callback);
        self
    }

    /// Crawl every usage of `domain` on `site`, attributing each to its introducer.
    ///
    /// Returns the number of usage records emitted.
    pub async fn crawl(&self, site: &str, domain: &str) -> Result<usize> {
        info!("Starting exturlusage for {}:{}", site, domain);

        let endpoint = self.client.endpoint(site)?;
        let query = PageQuery::new(endpoint, "eucontinue")
            .param("list", "exturlusage")
            .param("euquery", domain)
            .param("eulimit", USAGE_BATCH_SIZE.to_string());

        let usages = paginate(&self.client, query, usage_items);
        let mut usages = std::pin::pin!(usages);
        let mut count = 0;

        while let Some((url, page_title)) = usages.next().await {
            let page_link = self.client.article_link(site, &page_title);
            let introduction = self.introductions.lookup(site, &page_title, &url).await;
            let record = LinkUsage::new(site, domain, url, page_title, page_link).with_introduction(&introduction);

            debug!("{}:{} {} -> {:?}", site, record.page_title, record.url, introduction.editor);

            if let Some(key) = record.editor_key() {
                self.editors.add(&key.site, &key.editor);
            }
            if let Some(ref callback) = self.usage_callback {
                callback(record);
            }

            count += 1;
        }

        info!("Completed {}:{} => {} URLs processed", site, domain, count);
        Ok(count)
    }
}
