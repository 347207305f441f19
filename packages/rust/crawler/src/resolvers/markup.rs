use async_trait::async_trait;
use tracing::debug;

use chapterscrape_shared::Result;

use super::{Attempt, ListingResolver, ResolveContext, land};

/// Last resort: a listing URL written anywhere in the page source.
pub struct MarkupRegex;

#[async_trait]
impl ListingResolver for MarkupRegex {
    async fn attempt(&self, cx: &ResolveContext<'_>) -> Result<Attempt> {
        land(cx).await?;
        let base = cx.page.current_url().await?;
        let html = cx.page.content().await?;

        let Some(target) = cx.patterns.find_in_markup(&html, &base) else {
            return Ok(Attempt::Declined);
        };
        debug!(%target, "listing URL found in markup");
        cx.page.goto(&target, cx.timeouts.navigation()).await?;
        Ok(Attempt::Acted)
    }

    fn name(&self) -> &str {
        "markup_regex"
    }
}
