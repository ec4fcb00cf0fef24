use crate::error::{CoreError, Result};
use linkwho_scanner::cache::DEFAULT_CAPACITY;
use linkwho_scanner::client::{DEFAULT_API_TEMPLATE, DEFAULT_ARTICLE_TEMPLATE, DEFAULT_USER_AGENT};
use linkwho_scanner::users::DEFAULT_CONTRIBUTION_CAP;
use linkwho_scanner::ClientOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const RESULTS_FILE: &str = "results.csv";
pub const USER_INFO_FILE: &str = "user_info_all.csv";
pub const USER_CONTRIBS_FILE: &str = "user_contributions_all.csv";
pub const UNIQUE_PAIRS_FILE: &str = "lang_user_unique.txt";

/// Options for configuring a run. Fixed once the run starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Max concurrent tasks in each phase
    pub workers: usize,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub contribution_cap: usize,
    pub cache_capacity: usize,
    pub api_template: String,
    pub article_template: String,
    pub user_agent: String,
    pub output_dir: PathBuf,
    pub show_progress_bars: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            request_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            contribution_cap: DEFAULT_CONTRIBUTION_CAP,
            cache_capacity: DEFAULT_CAPACITY,
            api_template: DEFAULT_API_TEMPLATE.to_string(),
            article_template: DEFAULT_ARTICLE_TEMPLATE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_dir: PathBuf::from("results"),
            show_progress_bars: false,
        }
    }
}

/// Where a run writes its outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub results: PathBuf,
    pub user_info: PathBuf,
    pub contributions: PathBuf,
    pub unique_pairs: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            results: dir.join(RESULTS_FILE),
            user_info: dir.join(USER_INFO_FILE),
            contributions: dir.join(USER_CONTRIBS_FILE),
            unique_pairs: dir.join(UNIQUE_PAIRS_FILE),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(CoreError::Config("workers must be at least 1".to_string()));
        }
        if self.contribution_cap == 0 {
            return Err(CoreError::Config("contribution limit must be at least 1".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(CoreError::Config("request timeout must be greater than zero".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(CoreError::Config("cache capacity must be at least 1".to_string()));
        }
        if !self.api_template.contains("{site}") {
            return Err(CoreError::Config(format!(
                "API URL template '{}' has no {{site}} placeholder",
                self.api_template
            )));
        }
        if !self.article_template.contains("{site}") || !self.article_template.contains("{title}") {
            return Err(CoreError::Config(format!(
                "article URL template '{}' needs {{site}} and {{title}} placeholders",
                self.article_template
            )));
        }
        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            api_template: self.api_template.clone(),
            article_template: self.article_template.clone(),
            timeout: self.request_timeout,
            request_delay: self.request_delay,
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths::in_dir(&self.output_dir)
    }
}
