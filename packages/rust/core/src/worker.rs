//! Chapter Worker: one chapter from entry URL to finished member records.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use chapterscrape_browser::{BrowserContext, BrowserEngine, BrowserPage, ResourceFilter};
use chapterscrape_crawler::{ListingNavigator, ProfileExtractor};
use chapterscrape_shared::{Chapter, ChapterResult, MemberProfile, MemberStub, Result};

use crate::progress::ProgressReporter;

/// Error tag prefix for profiles that failed after their page loaded.
pub const EXTRACTION_FAILED: &str = "extraction_failed";

/// Runs the Listing Navigator and the Profile Extractor for one chapter.
pub struct ChapterWorker {
    navigator: ListingNavigator,
    extractor: ProfileExtractor,
    profile_concurrency: usize,
    filter: ResourceFilter,
}

impl ChapterWorker {
    pub fn new(
        navigator: ListingNavigator,
        extractor: ProfileExtractor,
        profile_concurrency: usize,
        filter: ResourceFilter,
    ) -> Self {
        Self {
            navigator,
            extractor,
            profile_concurrency: profile_concurrency.max(1),
            filter,
        }
    }

    /// Scrape `chapter` in its own browsing context.
    ///
    /// Fails only when the listing cannot be resolved or harvested; profile
    /// failures become degraded records.
    #[instrument(skip_all, fields(chapter = %chapter.name))]
    pub async fn run<E: BrowserEngine>(
        &self,
        engine: &E,
        chapter: &Chapter,
        progress: &dyn ProgressReporter,
    ) -> Result<ChapterResult> {
        let context = engine.new_context(self.filter.clone()).await?;
        let result = self.run_in(&context, chapter, progress).await;
        if let Err(e) = context.close().await {
            debug!(error = %e, "closing browser context failed");
        }
        result
    }

    async fn run_in<C: BrowserContext>(
        &self,
        context: &C,
        chapter: &Chapter,
        progress: &dyn ProgressReporter,
    ) -> Result<ChapterResult> {
        let stubs = self.collect_stubs(context, &chapter.url).await?;
        let total = stubs.len();
        info!(members = total, "members found");
        progress.members_found(&chapter.name, total);

        let semaphore = Semaphore::new(self.profile_concurrency);
        let done = AtomicUsize::new(0);

        let tasks = stubs.iter().map(|stub| {
            let semaphore = &semaphore;
            let done = &done;
            async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = semaphore.acquire().await.ok();
                let profile = self.profile(context, stub, &chapter.name).await;
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress.profile_done(&chapter.name, finished, total);
                profile
            }
        });
        let members = join_all(tasks).await;

        let result = ChapterResult {
            chapter: chapter.clone(),
            members,
        };
        info!(
            members = result.members.len(),
            degraded = result.degraded_count(),
            "chapter scraped"
        );
        Ok(result)
    }

    /// Resolve and harvest on a dedicated listing page.
    async fn collect_stubs<C: BrowserContext>(&self, context: &C, url: &str) -> Result<Vec<MemberStub>> {
        let page = context.new_page().await?;
        let result = self.navigator.collect(&page, url).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "closing listing page failed");
        }
        result
    }

    async fn profile<C: BrowserContext>(
        &self,
        context: &C,
        stub: &MemberStub,
        chapter: &str,
    ) -> MemberProfile {
        match self.extractor.extract(context, stub, chapter).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(profile_url = %stub.profile_url, error = %e, "profile extraction failed");
                MemberProfile::degraded(stub, chapter, format!("{EXTRACTION_FAILED}: {e}"))
            }
        }
    }
}
