use crate::error::{Result, ScanError};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_TEMPLATE: &str = "https://{site}.wikipedia.org/w/api.php";
pub const DEFAULT_ARTICLE_TEMPLATE: &str = "https://{site}.wikipedia.org/wiki/{title}";
pub const DEFAULT_USER_AGENT: &str = "linkwho/0.1 (https://github.com/trapdoorsec/linkwho)";

/// Options for building an [`ApiClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Endpoint URL with a `{site}` placeholder
    pub api_template: String,
    /// Page link URL with `{site}` and `{title}` placeholders
    pub article_template: String,
    pub timeout: Duration,
    /// Courtesy delay applied between consecutive pages of one query
    pub request_delay: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_template: DEFAULT_API_TEMPLATE.to_string(),
            article_template: DEFAULT_ARTICLE_TEMPLATE.to_string(),
            timeout: Duration::from_secs(30),
            request_delay: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Handle to the upstream query API.
///
/// Cloning is cheap and shares the underlying connection pool, so one client
/// is built at startup and handed to every component that needs it.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    api_template: String,
    article_template: String,
    request_delay: Duration,
}

impl ApiClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let http = Client::builder()
            .user_agent(options.user_agent)
            .timeout(options.timeout)
            .connect_timeout(options.timeout / 2)
            .pool_max_idle_per_host(16) // Connection pooling
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            http,
            api_template: options.api_template,
            article_template: options.article_template,
            request_delay: options.request_delay,
        })
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Resolve the API endpoint for a site
    pub fn endpoint(&self, site: &str) -> Result<Url> {
        let raw = self.api_template.replace("{site}", site);
        Url::parse(&raw).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Build the human-facing link to a page on a site
    pub fn article_link(&self, site: &str, title: &str) -> String {
        self.article_template
            .replace("{site}", site)
            .replace("{title}", &title.replace(' ', "_"))
    }

    /// Issue a single GET against `endpoint` and decode the JSON body.
    pub async fn get_json(&self, endpoint: &Url, params: &[(String, String)]) -> Result<Value> {
        debug!("GET {} {:?}", endpoint, params);

        let response = self
            .http
            .get(endpoint.clone())
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::StatusError {
                status: status.as_u16(),
                url: endpoint.to_string(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}
