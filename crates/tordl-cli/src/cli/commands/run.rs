//! `tordl run` – download a batch of URLs.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tordl_core::config::TordlConfig;
use tordl_core::control::CancelToken;
use tordl_core::events::{EventSink, FanoutSink, TracingSink};
use tordl_core::links;
use tordl_core::session::{DirectSessionProvider, SessionProvider};
use tordl_core::{BatchReport, Coordinator, DownloadResult, EngineConfig};

use super::check::{start_tor, tor_provider, verify_tor};
use super::install_interrupt_handler;
use crate::cli::progress::ConsoleProgress;
use crate::cli::RunArgs;

pub fn run_batch(cfg: &TordlConfig, args: &RunArgs) -> Result<()> {
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    let _tor = if args.direct { None } else { start_tor(cfg, &cancel)? };
    let provider: Arc<dyn SessionProvider> = if args.direct {
        tracing::warn!("direct mode: requests do not go through Tor");
        Arc::new(DirectSessionProvider::new())
    } else {
        let tor = tor_provider(cfg);
        verify_tor(cfg, &tor, &cancel)?;
        Arc::new(tor)
    };

    let engine = EngineConfig::from_config(cfg);
    let urls = collect_urls(cfg, args, provider.as_ref(), &engine)?;
    println!(
        "downloading {} file(s) into {} with up to {} at once",
        urls.len(),
        cfg.output_dir.display(),
        engine.worker_limit
    );

    let jobs = urls
        .iter()
        .map(|u| engine.job(u.as_str(), &cfg.output_dir))
        .collect();
    let events: Arc<dyn EventSink> = Arc::new(FanoutSink(vec![
        Box::new(TracingSink),
        Box::new(ConsoleProgress::new()),
    ]));
    let coordinator = Coordinator::new(engine, provider, events, cancel.clone());
    let report = coordinator.run(jobs);

    print_summary(&report);
    if cancel.is_cancelled() {
        bail!("interrupted; run again to resume partial files");
    }
    if report.failed() > 0 {
        bail!("{} of {} download(s) failed", report.failed(), report.len());
    }
    Ok(())
}

/// URLs from the command line, the links file, and the scraped page, in that order.
fn collect_urls(
    cfg: &TordlConfig,
    args: &RunArgs,
    provider: &dyn SessionProvider,
    engine: &EngineConfig,
) -> Result<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(path) = &cfg.links_file {
        urls.extend(links::load_links_file(path)?);
    }
    if let (Some(page), Some(pattern)) = (&args.scrape_url, &args.link_pattern) {
        let session = provider
            .get_session()
            .context("no session available for scraping")?;
        let scraped = links::scrape_links(&session, page, pattern, &engine.transport);
        provider.release(session);
        urls.extend(scraped?);
    }
    if urls.is_empty() {
        bail!("no URLs to download: pass URLs, --links-file, or --scrape-url with --link-pattern");
    }
    Ok(urls)
}

fn print_summary(report: &BatchReport) {
    println!("{}", "-".repeat(25));
    println!(
        "All downloads finished: {} completed, {} failed",
        report.completed(),
        report.failed()
    );
    if report.requeues > 0 || report.batch_restarts > 0 {
        println!(
            "  ({} requeue(s) after proxy failures, {} batch restart(s))",
            report.requeues, report.batch_restarts
        );
    }
    for (url, result) in report.iter() {
        match result {
            DownloadResult::Completed { path } => println!("  - {}: {}", url, path.display()),
            DownloadResult::Failed { kind, detail, .. } => {
                println!("  - {}: {} ({})", url, kind, detail)
            }
        }
    }
}
