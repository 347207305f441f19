//! The browser-automation capability consumed by the scraper.
//!
//! An engine hands out isolated browsing contexts; a context opens pages that
//! all share its request filter. Every wait and navigation takes an explicit
//! timeout and reports overrun as [`ScrapeError::Timeout`] or
//! [`ScrapeError::Navigation`].

use std::time::Duration;

use async_trait::async_trait;

use chapterscrape_shared::{Result, ScrapeError};

use crate::filter::ResourceFilter;

/// Interval between polls in the default [`BrowserPage::wait_for_selector`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One open page (tab).
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to `url`, failing if the DOM is not ready within `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// The URL currently loaded.
    async fn current_url(&self) -> Result<String>;

    /// A serialized snapshot of the current DOM.
    async fn content(&self) -> Result<String>;

    /// Whether at least one element matches `selector` right now.
    async fn has_selector(&self, selector: &str) -> Result<bool>;

    /// Whether the first element matching `selector` is rendered visibly.
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Close the page. Further calls on it are undefined.
    async fn close(&self) -> Result<()>;

    /// Poll until `selector` matches or `timeout` elapses.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.has_selector(selector).await? {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::timeout(selector, timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// An isolated browsing session (cookies, cache) with a shared request filter.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    type Page: BrowserPage + 'static;

    /// Open a blank page inside this context.
    async fn new_page(&self) -> Result<Self::Page>;

    /// Tear the context down, closing any pages still open.
    async fn close(&self) -> Result<()>;
}

/// Entry point of a browser-automation backend.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    type Context: BrowserContext + 'static;

    /// Create a fresh context whose pages all apply `filter`.
    async fn new_context(&self, filter: ResourceFilter) -> Result<Self::Context>;
}
