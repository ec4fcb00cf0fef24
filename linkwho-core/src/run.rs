//! Two-phase run orchestration.
//!
//! Phase one crawls every (site, domain) pair; phase two fetches metadata for
//! each distinct editor found. Both phases share one bounded worker budget
//! and isolate failures to the task that produced them.

use crate::config::{OutputPaths, RunConfig};
use crate::error::{CoreError, Result};
use crate::report::{RunSummary, TaskFailure};
use crate::sink::{self, UsageSink};
use chrono::Utc;
use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use linkwho_scanner::{
    ApiClient, EditorKey, EditorMetadata, EditorSet, IntroductionCache, Introductions, LinkUsage,
    LinkUsageCrawler, MetadataFetcher, RevisionScanner,
};
use std::any::Any;
use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Callback for reporting run progress
pub type RunProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

struct PhaseOutcome<T> {
    completed: Vec<T>,
    failures: Vec<TaskFailure>,
}

struct MetadataOutcome {
    profiles: usize,
    contributions: usize,
    failures: Vec<TaskFailure>,
}

fn notify(callback: &Option<RunProgressCallback>, message: String) {
    if let Some(callback) = callback {
        callback(message);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

fn phase_bar(enabled: bool, len: usize, message: &str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }

    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_message(message.to_string());
    Some(pb)
}

/// Run one task per item with at most `workers` in flight.
///
/// Errors and panics are logged with the task's label and collected; they
/// never cancel sibling tasks.
async fn run_bounded<I, T, E, L, F, Fut>(
    workers: usize,
    items: Vec<I>,
    label: L,
    progress_bar: Option<&ProgressBar>,
    task: F,
) -> PhaseOutcome<T>
where
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    L: Fn(&I) -> String,
    F: Fn(I) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for item in items {
        let name = label(&item);
        let work = task(item);
        let semaphore = semaphore.clone();

        tasks.spawn(async move {
            // Held for the whole task; the semaphore is never closed
            let _permit = semaphore.acquire_owned().await;
            let outcome = AssertUnwindSafe(work).catch_unwind().await;
            (name, outcome)
        });
    }

    let mut outcome = PhaseOutcome {
        completed: Vec::new(),
        failures: Vec::new(),
    };

    while let Some(joined) = tasks.join_next().await {
        let failure = match joined {
            Ok((_, Ok(Ok(value)))) => {
                outcome.completed.push(value);
                None
            }
            Ok((name, Ok(Err(e)))) => Some(TaskFailure {
                task: name,
                error: e.to_string(),
            }),
            Ok((name, Err(payload))) => Some(TaskFailure {
                task: name,
                error: format!("panicked: {}", panic_message(payload.as_ref())),
            }),
            Err(e) => Some(TaskFailure {
                task: "unknown".to_string(),
                error: e.to_string(),
            }),
        };

        if let Some(failure) = failure {
            error!("Worker error in {}: {}", failure.task, failure.error);
            outcome.failures.push(failure);
        }

        if let Some(pb) = progress_bar {
            pb.inc(1);
        }
    }

    outcome
}

async fn run_metadata_phase(
    config: &RunConfig,
    client: &ApiClient,
    keys: &BTreeSet<EditorKey>,
    paths: &OutputPaths,
    progress_callback: &Option<RunProgressCallback>,
) -> Result<MetadataOutcome> {
    if keys.is_empty() {
        info!("No editors found. Skipping metadata lookups.");
        sink::write_profiles(&paths.user_info, &[])?;
        sink::write_contributions(&paths.contributions, &[])?;
        return Ok(MetadataOutcome {
            profiles: 0,
            contributions: 0,
            failures: Vec::new(),
        });
    }

    notify(
        progress_callback,
        format!("Fetching profiles and contributions for {} editor(s)", keys.len()),
    );

    let fetcher = Arc::new(MetadataFetcher::new(client.clone(), config.contribution_cap));
    let bar = phase_bar(config.show_progress_bars, keys.len(), "editors");

    let phase = run_bounded(
        config.workers,
        keys.iter().cloned().collect(),
        |key: &EditorKey| key.to_string(),
        bar.as_ref(),
        |key: EditorKey| {
            let fetcher = fetcher.clone();
            async move { fetcher.fetch(&key).await }
        },
    )
    .await;

    if let Some(pb) = bar {
        pb.finish_with_message("editors done");
    }

    let mut metadata: Vec<EditorMetadata> = phase.completed;
    metadata.sort_by(|a, b| a.profile.key.cmp(&b.profile.key));

    let profiles: Vec<_> = metadata.iter().map(|m| m.profile.clone()).collect();
    let contributions: Vec<_> = metadata.into_iter().flat_map(|m| m.contributions).collect();

    info!("Writing user info to {}", paths.user_info.display());
    sink::write_profiles(&paths.user_info, &profiles)?;
    info!("Writing user contributions to {}", paths.contributions.display());
    sink::write_contributions(&paths.contributions, &contributions)?;

    Ok(MetadataOutcome {
        profiles: profiles.len(),
        contributions: contributions.len(),
        failures: phase.failures,
    })
}

fn output_list(paths: &OutputPaths, include_results: bool) -> Vec<String> {
    let mut outputs = Vec::new();
    if include_results {
        outputs.push(paths.results.display().to_string());
        outputs.push(paths.unique_pairs.display().to_string());
    }
    outputs.push(paths.user_info.display().to_string());
    outputs.push(paths.contributions.display().to_string());
    outputs
}

/// Execute a full run: crawl every (site, domain) pair, then look up every
/// distinct introducer.
pub async fn execute_run(
    config: RunConfig,
    sites: Vec<String>,
    domains: Vec<String>,
    progress_callback: Option<RunProgressCallback>,
) -> Result<RunSummary> {
    config.validate()?;
    if sites.is_empty() {
        return Err(CoreError::Config("no sites to crawl".to_string()));
    }
    if domains.is_empty() {
        return Err(CoreError::Config("no domains to search for".to_string()));
    }

    let started_at = Utc::now();
    let paths = config.output_paths();
    let client = ApiClient::new(config.client_options())?;

    let usage_sink = Arc::new(UsageSink::open(&paths.results)?);
    let introductions = Arc::new(Introductions::new(
        RevisionScanner::new(client.clone()),
        IntroductionCache::with_capacity(config.cache_capacity),
    ));
    let editors = Arc::new(EditorSet::new());
    let attributed = Arc::new(AtomicUsize::new(0));

    let crawler = {
        let usage_sink = usage_sink.clone();
        let attributed = attributed.clone();
        Arc::new(
            LinkUsageCrawler::new(client.clone(), introductions.clone(), editors.clone()).with_usage_callback(
                Arc::new(move |record: LinkUsage| {
                    if !record.user.is_empty() {
                        attributed.fetch_add(1, Ordering::Relaxed);
                    }
                    if let Err(e) = usage_sink.write(&record) {
                        error!("Failed to write usage row for {}:{}: {}", record.site, record.page_title, e);
                    }
                }),
            ),
        )
    };

    // Phase 1: every (site, domain) pair
    let pairs: Vec<(String, String)> = sites
        .iter()
        .flat_map(|site| domains.iter().map(move |domain| (site.clone(), domain.clone())))
        .collect();
    let pair_tasks = pairs.len();

    notify(
        &progress_callback,
        format!("Crawling {} (site, domain) pair(s) with {} workers", pair_tasks, config.workers),
    );
    info!("Starting concurrency for {} (site, domain) pairs", pair_tasks);

    let bar = phase_bar(config.show_progress_bars, pair_tasks, "pairs");
    let phase_one = run_bounded(
        config.workers,
        pairs,
        |(site, domain): &(String, String)| format!("{}:{}", site, domain),
        bar.as_ref(),
        |(site, domain): (String, String)| {
            let crawler = crawler.clone();
            async move { crawler.crawl(&site, &domain).await }
        },
    )
    .await;

    if let Some(pb) = bar {
        pb.finish_with_message("pairs done");
    }
    info!("All (site, domain) pairs have been processed.");

    // Phase 2: distinct editors
    let keys = editors.finalize();
    sink::write_editor_pairs(&paths.unique_pairs, &keys)?;
    info!("Found {} unique (site, editor) pairs.", keys.len());

    let metadata = run_metadata_phase(&config, &client, &keys, &paths, &progress_callback).await?;

    Ok(RunSummary {
        started_at,
        finished_at: Utc::now(),
        sites: sites.len(),
        domains: domains.len(),
        pair_tasks,
        failed_pair_tasks: phase_one.failures,
        usage_rows: usage_sink.rows_written(),
        attributed_rows: attributed.load(Ordering::Relaxed),
        revision_scans: introductions.scans_performed(),
        unique_editors: keys.len(),
        profiles: metadata.profiles,
        contributions: metadata.contributions,
        failed_editor_tasks: metadata.failures,
        outputs: output_list(&paths, true),
    })
}

/// Execute only the metadata phase for an existing set of editors, e.g. one
/// read back from a previous run's pairs file.
pub async fn execute_metadata(
    config: RunConfig,
    keys: BTreeSet<EditorKey>,
    progress_callback: Option<RunProgressCallback>,
) -> Result<RunSummary> {
    config.validate()?;

    let started_at = Utc::now();
    let paths = config.output_paths();
    let client = ApiClient::new(config.client_options())?;

    let metadata = run_metadata_phase(&config, &client, &keys, &paths, &progress_callback).await?;

    Ok(RunSummary {
        started_at,
        finished_at: Utc::now(),
        sites: 0,
        domains: 0,
        pair_tasks: 0,
        failed_pair_tasks: Vec::new(),
        usage_rows: 0,
        attributed_rows: 0,
        revision_scans: 0,
        unique_editors: keys.len(),
        profiles: metadata.profiles,
        contributions: metadata.contributions,
        failed_editor_tasks: metadata.failures,
        outputs: output_list(&paths, false),
    })
}
