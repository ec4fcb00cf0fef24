use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use linkwho_core::input::{read_domains, read_sites};
use linkwho_core::report::{generate_json_report, generate_text_report};
use linkwho_core::run::execute_metadata;
use linkwho_core::sink::read_editor_pairs;
use linkwho_core::{RunConfig, RunProgressCallback, RunSummary, execute_run};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

pub fn print_banner() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
    eprintln!(
        "{}  {}",
        "  LINKWHO".bright_white().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    eprintln!("  who put that link there?");
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}

/// Expand a leading `~` in a user supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

pub fn log_level(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (_, 2..) => Level::TRACE,
        (_, 1) => Level::DEBUG,
        (true, 0) => Level::WARN,
        (false, 0) => Level::INFO,
    }
}

/// Install the global subscriber. Logs go to stderr so JSON summaries stay clean.
pub fn init_tracing(verbose: u8, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbose, quiet))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build a run configuration from a subcommand's matches
pub fn config_from_args(args: &ArgMatches, show_progress_bars: bool) -> RunConfig {
    let defaults = RunConfig::default();

    RunConfig {
        workers: args.get_one::<usize>("threads").copied().unwrap_or(defaults.workers),
        request_delay: args
            .get_one::<u64>("delay-ms")
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(defaults.request_delay),
        request_timeout: args
            .get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(defaults.request_timeout),
        contribution_cap: args
            .get_one::<usize>("contrib-limit")
            .copied()
            .unwrap_or(defaults.contribution_cap),
        cache_capacity: args
            .try_get_one::<usize>("cache-capacity")
            .ok()
            .flatten()
            .copied()
            .unwrap_or(defaults.cache_capacity),
        api_template: args.get_one::<String>("api-url").cloned().unwrap_or(defaults.api_template),
        article_template: args
            .get_one::<String>("article-url")
            .cloned()
            .unwrap_or(defaults.article_template),
        user_agent: args.get_one::<String>("user-agent").cloned().unwrap_or(defaults.user_agent),
        output_dir: args
            .get_one::<String>("output-dir")
            .map(|dir| expand_path(dir))
            .unwrap_or(defaults.output_dir),
        show_progress_bars,
    }
}

fn wants_json(args: &ArgMatches) -> bool {
    args.get_one::<String>("format").is_some_and(|format| format == "json")
}

fn progress_printer(enabled: bool) -> Option<RunProgressCallback> {
    if !enabled {
        return None;
    }
    Some(Arc::new(|msg: String| {
        println!("{} {}", "→".blue(), msg);
    }))
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        let report = generate_json_report(summary).context("Failed to render JSON summary")?;
        println!("{}", report);
        return Ok(());
    }

    if summary.has_failures() {
        println!("\n{} Run finished with failed tasks\n", "⚠".yellow().bold());
    } else {
        println!("\n{} Run complete!\n", "✓".green().bold());
    }
    print!("{}", generate_text_report(summary));
    Ok(())
}

pub async fn handle_run(args: &ArgMatches, quiet: bool) -> Result<()> {
    let json = wants_json(args);
    let chatty = !quiet && !json;

    let sites_arg = args.get_one::<String>("sites").context("--sites is required")?;
    let domains_arg = args.get_one::<String>("domains").context("--domains is required")?;
    let sites_path = expand_path(sites_arg);
    let domains_path = expand_path(domains_arg);

    let sites = read_sites(&sites_path)
        .with_context(|| format!("Failed to load sites from {}", sites_path.display()))?;
    let domains = read_domains(&domains_path)
        .with_context(|| format!("Failed to load domains from {}", domains_path.display()))?;

    let config = config_from_args(args, chatty);

    if chatty {
        println!("\n🔗 Tracing {} domain(s) across {} site(s)", domains.len(), sites.len());
        println!("Workers: {}", config.workers);
        println!("Delay between pages: {} ms", config.request_delay.as_millis());
        println!("Output: {}\n", config.output_dir.display());
    }

    let summary = execute_run(config, sites, domains, progress_printer(chatty))
        .await
        .context("Run failed")?;

    print_summary(&summary, json)
}

pub async fn handle_users(args: &ArgMatches, quiet: bool) -> Result<()> {
    let json = wants_json(args);
    let chatty = !quiet && !json;

    let pairs_arg = args.get_one::<String>("pairs").context("--pairs is required")?;
    let pairs_path = expand_path(pairs_arg);
    let keys = read_editor_pairs(&pairs_path)
        .with_context(|| format!("Failed to read editor pairs from {}", pairs_path.display()))?;
    if keys.is_empty() {
        bail!("No editor pairs found in {}", pairs_path.display());
    }

    let config = config_from_args(args, chatty);

    if chatty {
        println!("\n👤 Looking up {} editor(s)", keys.len());
        println!("Workers: {}", config.workers);
        println!("Output: {}\n", config.output_dir.display());
    }

    let summary = execute_metadata(config, keys, progress_printer(chatty))
        .await
        .context("Metadata lookup failed")?;

    print_summary(&summary, json)
}
