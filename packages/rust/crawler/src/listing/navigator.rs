use std::sync::Arc;

use tracing::{debug, info, instrument};

use chapterscrape_browser::BrowserPage;
use chapterscrape_shared::{MemberStub, Result, TimeoutsConfig};

use super::dedup::dedup_by_profile_url;
use super::harvest::{LISTING_ROWS, NEXT_CONTROL, NextControl, read_listing_page};
use super::patterns::ListingPatterns;
use crate::resolvers::{ResolveContext, ResolvedListing, ResolverChain};

/// Resolves a chapter to its listing and walks every listing page.
pub struct ListingNavigator {
    patterns: Arc<ListingPatterns>,
    timeouts: TimeoutsConfig,
    chain: ResolverChain,
}

impl ListingNavigator {
    pub fn new(patterns: Arc<ListingPatterns>, timeouts: TimeoutsConfig) -> Self {
        Self {
            patterns,
            timeouts,
            chain: ResolverChain::new(),
        }
    }

    pub fn with_chain(mut self, chain: ResolverChain) -> Self {
        self.chain = chain;
        self
    }

    /// Bring `page` to the member listing for `start_url`.
    #[instrument(skip_all, fields(start_url = %start_url))]
    pub async fn resolve(&self, page: &dyn BrowserPage, start_url: &str) -> Result<ResolvedListing> {
        let cx = ResolveContext {
            page,
            start_url,
            patterns: &self.patterns,
            timeouts: &self.timeouts,
        };
        self.chain.resolve(&cx).await
    }

    /// Read every listing page reachable through the "next" control.
    ///
    /// Stops when the control is absent or disabled; there is no page cap.
    #[instrument(skip_all)]
    pub async fn harvest(&self, page: &dyn BrowserPage) -> Result<Vec<MemberStub>> {
        let mut stubs = Vec::new();
        let mut pages = 0usize;

        loop {
            page.wait_for_selector(LISTING_ROWS, self.timeouts.listing_wait())
                .await?;
            let url = page.current_url().await?;
            let html = page.content().await?;
            let listing = read_listing_page(&html, &url);
            pages += 1;
            debug!(page = pages, rows = listing.stubs.len(), next = ?listing.next, "listing page read");
            stubs.extend(listing.stubs);

            if listing.next != NextControl::Enabled {
                break;
            }
            page.click(NEXT_CONTROL).await?;
            tokio::time::sleep(self.timeouts.settle()).await;
        }

        let harvested = stubs.len();
        let stubs = dedup_by_profile_url(stubs);
        info!(pages, harvested, members = stubs.len(), "listing harvested");
        Ok(stubs)
    }

    /// Resolve then harvest.
    pub async fn collect(&self, page: &dyn BrowserPage, start_url: &str) -> Result<Vec<MemberStub>> {
        self.resolve(page, start_url).await?;
        self.harvest(page).await
    }
}
