use crate::cache::{IntroductionCache, IntroductionKey};
use crate::revisions::{Introduction, RevisionScanner};
use tracing::error;

/// Cached introduction lookups backed by revision scans
pub struct Introductions {
    cache: IntroductionCache,
    scanner: RevisionScanner,
}

impl Introductions {
    pub fn new(scanner: RevisionScanner, cache: IntroductionCache) -> Self {
        Self { cache, scanner }
    }

    /// Introducer of `link` on `title`, scanning history at most once per key
    pub async fn lookup(&self, site: &str, title: &str, link: &str) -> Introduction {
        let key = IntroductionKey::new(site, title, link);

        self.cache
            .get_or_compute(key, || async {
                match self.scanner.scan(site, title, link).await {
                    Ok(introduction) => introduction,
                    Err(e) => {
                        error!("History scan failed for {}:{}: {}", site, title, e);
                        Introduction::absent()
                    }
                }
            })
            .await
    }

    pub fn scans_performed(&self) -> usize {
        self.scanner.scans_performed()
    }

    pub fn cache(&self) -> &IntroductionCache {
        &self.cache
    }
}
