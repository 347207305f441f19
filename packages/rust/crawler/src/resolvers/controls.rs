use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use chapterscrape_browser::POLL_INTERVAL;
use chapterscrape_shared::Result;

use super::{Attempt, ListingResolver, ResolveContext, collapsed_text, css_path, land};
use crate::listing::LISTING_ROWS;

/// Elements that can act as a listing tab or button.
const CONTROL_SELECTOR: &str = r#"a, button, [role="tab"], .nav-tabs li"#;

/// Click the first visible tab, button or link labelled like a member list.
pub struct ControlCandidates;

#[async_trait]
impl ListingResolver for ControlCandidates {
    async fn attempt(&self, cx: &ResolveContext<'_>) -> Result<Attempt> {
        land(cx).await?;
        let html = cx.page.content().await?;
        let candidates = candidate_paths(&html, &cx.patterns.control_labels);

        for path in candidates {
            if !cx.page.is_visible(&path).await.unwrap_or(false) {
                debug!(%path, "control hidden, skipping");
                continue;
            }
            cx.page.click(&path).await?;
            wait_for_listing(cx).await?;
            return Ok(Attempt::Acted);
        }
        Ok(Attempt::Declined)
    }

    fn name(&self) -> &str {
        "control_candidates"
    }
}

/// Selectors of labelled controls, label priority first, then document order.
fn candidate_paths(html: &str, labels: &[String]) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(CONTROL_SELECTOR).unwrap();

    let mut paths: Vec<String> = Vec::new();
    for label in labels {
        for el in doc.select(&sel) {
            if collapsed_text(&el) != *label {
                continue;
            }
            let path = css_path(el);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// Give the click a moment to land on a listing URL or render listing rows.
async fn wait_for_listing(cx: &ResolveContext<'_>) -> Result<()> {
    let deadline = tokio::time::Instant::now() + cx.timeouts.control_wait();
    loop {
        if cx.patterns.is_listing(&cx.page.current_url().await?)
            || cx.page.has_selector(LISTING_ROWS).await?
        {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            debug!("control click did not reach a listing in time");
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
