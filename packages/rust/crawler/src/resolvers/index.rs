use async_trait::async_trait;
use tracing::debug;

use chapterscrape_shared::Result;

use super::{Attempt, ListingResolver, ResolveContext};
use crate::listing::LISTING_TABLE;

/// Index pages usually have the listing at a sibling path.
///
/// When the guessed sibling does not show a listing the page is sent back to
/// the entry URL. The resolver only claims success there if the table is
/// already on the page; otherwise later resolvers work from the entry page.
pub struct IndexSibling;

#[async_trait]
impl ListingResolver for IndexSibling {
    async fn attempt(&self, cx: &ResolveContext<'_>) -> Result<Attempt> {
        let Some(sibling) = cx.patterns.index_sibling(cx.start_url) else {
            return Ok(Attempt::Declined);
        };

        match cx.page.goto(&sibling, cx.timeouts.navigation()).await {
            Ok(()) => {
                let shown = cx
                    .page
                    .wait_for_selector(LISTING_TABLE, cx.timeouts.confirm_wait())
                    .await
                    .is_ok();
                if shown {
                    return Ok(Attempt::Acted);
                }
                debug!(%sibling, "sibling page has no listing table");
            }
            Err(e) => debug!(%sibling, error = %e, "sibling navigation failed"),
        }

        cx.page.goto(cx.start_url, cx.timeouts.navigation()).await?;
        if cx.page.has_selector(LISTING_TABLE).await? {
            Ok(Attempt::Acted)
        } else {
            Ok(Attempt::Declined)
        }
    }

    fn name(&self) -> &str {
        "index_sibling"
    }
}
