//! Orchestrator: every chapter of a run under a chapter-level limit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use chapterscrape_artifacts::write_chapter;
use chapterscrape_browser::{BrowserEngine, ResourceFilter};
use chapterscrape_crawler::{
    ListingNavigator, ListingPatterns, ProfileExtractor, RetryPolicy, SectionCatalog,
};
use chapterscrape_shared::{Chapter, ChapterOutcome, Result, RunConfig, RunSummary};

use crate::progress::ProgressReporter;
use crate::worker::ChapterWorker;

/// Navigation attempts per profile.
const PROFILE_ATTEMPTS: u32 = 2;

pub struct Orchestrator {
    config: RunConfig,
    patterns: Arc<ListingPatterns>,
    worker: ChapterWorker,
}

impl Orchestrator {
    /// Build the full pipeline from validated run configuration.
    pub fn new(config: RunConfig) -> Result<Self> {
        Self::with_catalog(config, SectionCatalog::default())
    }

    /// Like [`Orchestrator::new`] with a custom section catalog.
    pub fn with_catalog(config: RunConfig, catalog: SectionCatalog) -> Result<Self> {
        let patterns = Arc::new(ListingPatterns::compile(&config.patterns)?);
        let navigator = ListingNavigator::new(Arc::clone(&patterns), config.timeouts.clone());
        let extractor = ProfileExtractor::new(
            catalog,
            RetryPolicy::new(PROFILE_ATTEMPTS, config.timeouts.retry_base()),
            &config.timeouts,
        );
        let worker = ChapterWorker::new(
            navigator,
            extractor,
            config.profile_concurrency,
            ResourceFilter::from_names(&config.blocked_resources),
        );

        Ok(Self {
            config,
            patterns,
            worker,
        })
    }

    /// Chapters passing the name filter, plus how many were filtered out.
    pub fn select<'a>(&self, chapters: &'a [Chapter]) -> (Vec<&'a Chapter>, usize) {
        let selected: Vec<&Chapter> = match &self.config.chapter_filter {
            Some(filter) => chapters.iter().filter(|c| filter.is_match(&c.name)).collect(),
            None => chapters.iter().collect(),
        };
        let filtered_out = chapters.len() - selected.len();
        (selected, filtered_out)
    }

    /// Scrape and write every selected chapter.
    ///
    /// Never fails as a whole: each chapter ends up written or skipped.
    #[instrument(skip_all, fields(chapters = chapters.len()))]
    pub async fn run<E: BrowserEngine>(
        &self,
        engine: &E,
        chapters: &[Chapter],
        progress: &dyn ProgressReporter,
    ) -> RunSummary {
        let started_at = Utc::now();
        let start = Instant::now();

        let (selected, filtered_out) = self.select(chapters);
        info!(
            selected = selected.len(),
            filtered_out,
            chapter_concurrency = self.config.chapter_concurrency,
            profile_concurrency = self.config.profile_concurrency,
            "starting run"
        );

        let semaphore = Semaphore::new(self.config.chapter_concurrency.max(1));
        let tasks = selected.into_iter().map(|chapter| {
            let semaphore = &semaphore;
            async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = semaphore.acquire().await.ok();
                self.run_chapter(engine, chapter, progress).await
            }
        });
        let outcomes = join_all(tasks).await;

        let summary = RunSummary {
            started_at,
            outcomes,
            filtered_out,
            elapsed: start.elapsed(),
        };
        info!(
            written = summary.written_count(),
            skipped = summary.skipped_count(),
            filtered_out,
            elapsed = ?round_secs(summary.elapsed),
            "run complete"
        );
        progress.done(&summary);
        summary
    }

    async fn run_chapter<E: BrowserEngine>(
        &self,
        engine: &E,
        chapter: &Chapter,
        progress: &dyn ProgressReporter,
    ) -> ChapterOutcome {
        progress.chapter_started(chapter);

        let outcome = match self.worker.run(engine, chapter, progress).await {
            Ok(result) => {
                let from_detail = self.patterns.is_detail(&chapter.url);
                match write_chapter(&self.config.output, &result, from_detail) {
                    Ok(path) => {
                        info!(chapter = %chapter.name, path = %path.display(), "chapter written");
                        ChapterOutcome::Written {
                            chapter: chapter.name.clone(),
                            path,
                            members: result.members.len(),
                            degraded: result.degraded_count(),
                        }
                    }
                    Err(e) => {
                        warn!(chapter = %chapter.name, error = %e, "writing chapter failed, skipping");
                        ChapterOutcome::Skipped {
                            chapter: chapter.name.clone(),
                            reason: format!("write failed: {e}"),
                        }
                    }
                }
            }
            Err(e) => {
                warn!(chapter = %chapter.name, error = %e, "chapter skipped");
                ChapterOutcome::Skipped {
                    chapter: chapter.name.clone(),
                    reason: e.to_string(),
                }
            }
        };

        progress.chapter_finished(&outcome);
        outcome
    }
}

fn round_secs(d: Duration) -> Duration {
    Duration::from_secs(d.as_secs())
}
