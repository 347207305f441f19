use async_trait::async_trait;

use chapterscrape_shared::Result;

use super::{Attempt, ListingResolver, ResolveContext};

/// The entry URL already is a listing URL.
pub struct DirectListing;

#[async_trait]
impl ListingResolver for DirectListing {
    async fn attempt(&self, cx: &ResolveContext<'_>) -> Result<Attempt> {
        if !cx.patterns.is_listing(cx.start_url) {
            return Ok(Attempt::Declined);
        }
        cx.page.goto(cx.start_url, cx.timeouts.navigation()).await?;
        Ok(Attempt::Acted)
    }

    fn name(&self) -> &str {
        "direct_listing"
    }
}
