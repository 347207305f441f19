//! In-memory engine that replays captured HTML pages.
//!
//! Pages are keyed by URL. Clicking an element follows the `href` of the
//! element or its closest anchor ancestor, which is enough to drive tabbed
//! chapter pages and paginated listings saved to disk. Navigation and
//! snapshot failures can be injected per URL, and every subresource a page
//! references is run through the context's [`ResourceFilter`] and logged.
//! Each navigation yields to the runtime once so concurrent pages interleave.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use chapterscrape_shared::{Result, ScrapeError, strip_fragment};

use crate::engine::{BrowserContext, BrowserEngine, BrowserPage};
use crate::filter::{FilterDecision, RequestDescriptor, ResourceFilter};

const BLANK_PAGE: &str = "<html><head></head><body></body></html>";

// ---------------------------------------------------------------------------
// MemorySite
// ---------------------------------------------------------------------------

/// A fixed set of pages served by [`MemoryBrowser`].
#[derive(Debug, Default)]
pub struct MemorySite {
    pages: HashMap<String, String>,
    failures: Mutex<HashMap<String, usize>>,
    unreadable: HashSet<String>,
    visits: Mutex<Vec<String>>,
}

impl MemorySite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` at `url`.
    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(page_key(url), html.into());
        self
    }

    /// Make the next `times` navigations to `url` fail.
    pub fn failing(self, url: &str, times: usize) -> Self {
        lock(&self.failures).insert(page_key(url), times);
        self
    }

    /// Serve `url` normally but fail every [`BrowserPage::content`] call on it.
    pub fn unreadable(mut self, url: &str) -> Self {
        self.unreadable.insert(page_key(url));
        self
    }

    /// Every URL successfully navigated to, in order.
    pub fn visits(&self) -> Vec<String> {
        lock(&self.visits).clone()
    }

    fn load(&self, url: &str) -> Result<String> {
        let key = page_key(url);
        {
            let mut failures = lock(&self.failures);
            if let Some(remaining) = failures.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ScrapeError::navigation(url, "net::ERR_CONNECTION_RESET"));
                }
            }
        }

        let html = self
            .pages
            .get(&key)
            .cloned()
            .ok_or_else(|| ScrapeError::navigation(url, "HTTP 404"))?;
        lock(&self.visits).push(key);
        Ok(html)
    }
}

/// Canonical lookup key: fragment stripped, URL re-serialized when parseable.
fn page_key(url: &str) -> String {
    let stripped = strip_fragment(url);
    Url::parse(&stripped)
        .map(|u| u.to_string())
        .unwrap_or(stripped)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryBrowser
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Stats {
    contexts_opened: AtomicUsize,
    contexts_closed: AtomicUsize,
    pages_opened: AtomicUsize,
    pages_closed: AtomicUsize,
    peak_contexts: AtomicUsize,
    peak_pages: AtomicUsize,
    requests: Mutex<Vec<(String, FilterDecision)>>,
}

/// Engine serving a [`MemorySite`].
#[derive(Debug, Clone)]
pub struct MemoryBrowser {
    site: Arc<MemorySite>,
    stats: Arc<Stats>,
}

impl MemoryBrowser {
    pub fn new(site: MemorySite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn site(&self) -> &MemorySite {
        &self.site
    }

    /// Pages opened and not yet closed, across all contexts.
    pub fn open_pages(&self) -> usize {
        self.stats.pages_opened.load(Ordering::SeqCst)
            - self.stats.pages_closed.load(Ordering::SeqCst)
    }

    /// Contexts created and not yet closed.
    pub fn open_contexts(&self) -> usize {
        self.stats.contexts_opened.load(Ordering::SeqCst)
            - self.stats.contexts_closed.load(Ordering::SeqCst)
    }

    /// Most contexts ever open at the same time.
    pub fn peak_open_contexts(&self) -> usize {
        self.stats.peak_contexts.load(Ordering::SeqCst)
    }

    /// Most pages ever open at the same time.
    pub fn peak_open_pages(&self) -> usize {
        self.stats.peak_pages.load(Ordering::SeqCst)
    }

    pub fn contexts_created(&self) -> usize {
        self.stats.contexts_opened.load(Ordering::SeqCst)
    }

    /// Subresource requests seen so far with the filter's decision.
    pub fn requests(&self) -> Vec<(String, FilterDecision)> {
        lock(&self.stats.requests).clone()
    }
}

#[async_trait]
impl BrowserEngine for MemoryBrowser {
    type Context = MemoryContext;

    async fn new_context(&self, filter: ResourceFilter) -> Result<MemoryContext> {
        let opened = self.stats.contexts_opened.fetch_add(1, Ordering::SeqCst) + 1;
        let open = opened - self.stats.contexts_closed.load(Ordering::SeqCst);
        self.stats.peak_contexts.fetch_max(open, Ordering::SeqCst);
        Ok(MemoryContext {
            site: Arc::clone(&self.site),
            stats: Arc::clone(&self.stats),
            filter: Arc::new(filter),
        })
    }
}

/// Browsing context of a [`MemoryBrowser`].
#[derive(Debug)]
pub struct MemoryContext {
    site: Arc<MemorySite>,
    stats: Arc<Stats>,
    filter: Arc<ResourceFilter>,
}

#[async_trait]
impl BrowserContext for MemoryContext {
    type Page = MemoryPage;

    async fn new_page(&self) -> Result<MemoryPage> {
        let opened = self.stats.pages_opened.fetch_add(1, Ordering::SeqCst) + 1;
        let open = opened - self.stats.pages_closed.load(Ordering::SeqCst);
        self.stats.peak_pages.fetch_max(open, Ordering::SeqCst);
        Ok(MemoryPage {
            site: Arc::clone(&self.site),
            stats: Arc::clone(&self.stats),
            filter: Arc::clone(&self.filter),
            state: Mutex::new(PageState {
                url: "about:blank".into(),
                html: BLANK_PAGE.into(),
                closed: false,
            }),
        })
    }

    async fn close(&self) -> Result<()> {
        self.stats.contexts_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryPage
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PageState {
    url: String,
    html: String,
    closed: bool,
}

/// A page of a [`MemoryContext`].
#[derive(Debug)]
pub struct MemoryPage {
    site: Arc<MemorySite>,
    stats: Arc<Stats>,
    filter: Arc<ResourceFilter>,
    state: Mutex<PageState>,
}

impl MemoryPage {
    fn snapshot(&self) -> (String, String) {
        let state = lock(&self.state);
        (state.url.clone(), state.html.clone())
    }
}

#[async_trait]
impl BrowserPage for MemoryPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        tokio::task::yield_now().await;
        let html = self.site.load(url)?;

        let requests = subresource_requests(&html, url);
        {
            let mut log = lock(&self.stats.requests);
            for request in requests {
                let decision = self.filter.decide(&request);
                log.push((request.url, decision));
            }
        }

        let mut state = lock(&self.state);
        state.url = page_key(url);
        state.html = html;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.snapshot().0)
    }

    async fn content(&self) -> Result<String> {
        let (url, html) = self.snapshot();
        if self.site.unreadable.contains(&url) {
            return Err(ScrapeError::Browser(format!("page crashed: {url}")));
        }
        Ok(html)
    }

    async fn has_selector(&self, selector: &str) -> Result<bool> {
        let (_, html) = self.snapshot();
        let sel = parse_selector(selector)?;
        let doc = Html::parse_document(&html);
        let found = doc.select(&sel).next().is_some();
        Ok(found)
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let (_, html) = self.snapshot();
        let sel = parse_selector(selector)?;
        Ok(first_match_visible(&html, &sel))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let (url, html) = self.snapshot();
        let sel = parse_selector(selector)?;
        let target = click_target(&html, &sel, &url)
            .map_err(|_| ScrapeError::Browser(format!("no element matches {selector}")))?;

        match target {
            Some(next) => self.goto(&next, Duration::ZERO).await,
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.closed {
            state.closed = true;
            self.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::parse(format!("invalid selector '{selector}': {e}")))
}

/// Visible unless the element or an ancestor is `hidden` or `display: none`.
fn first_match_visible(html: &str, sel: &Selector) -> bool {
    let doc = Html::parse_document(html);
    let Some(el) = doc.select(sel).next() else {
        return false;
    };

    let hidden = |e: &ElementRef| {
        let value = e.value();
        value.attr("hidden").is_some()
            || value
                .attr("style")
                .map(|s| s.replace(' ', "").to_ascii_lowercase().contains("display:none"))
                .unwrap_or(false)
    };

    if hidden(&el) {
        return false;
    }
    !el.ancestors().filter_map(ElementRef::wrap).any(|a| hidden(&a))
}

/// Resolve where clicking the first match of `sel` leads.
///
/// `Err(())` when nothing matches, `Ok(None)` when the click does not navigate.
fn click_target(html: &str, sel: &Selector, base: &str) -> std::result::Result<Option<String>, ()> {
    let doc = Html::parse_document(html);
    let el = doc.select(sel).next().ok_or(())?;

    // A click on a tab container lands on the link inside it.
    let link_sel = Selector::parse("a[href]").unwrap();
    let anchor = std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find(|e| e.value().name() == "a" && e.value().attr("href").is_some())
        .or_else(|| el.select(&link_sel).next());

    let Some(href) = anchor.and_then(|a| a.value().attr("href")) else {
        return Ok(None);
    };
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return Ok(None);
    }

    Ok(Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .ok())
}

/// Subresources a real browser would request while loading `html`.
fn subresource_requests(html: &str, base: &str) -> Vec<RequestDescriptor> {
    let doc = Html::parse_document(html);
    let base = Url::parse(base).ok();
    let sources = [
        ("img[src]", "src", "image"),
        ("video[src], audio[src], source[src]", "src", "media"),
        (r#"link[rel="preload"][as="font"]"#, "href", "font"),
        (r#"link[rel="stylesheet"]"#, "href", "stylesheet"),
        ("script[src]", "src", "script"),
    ];

    let mut requests = Vec::new();
    for (css, attr, kind) in sources {
        let sel = Selector::parse(css).unwrap();
        for el in doc.select(&sel) {
            let Some(raw) = el.value().attr(attr) else {
                continue;
            };
            let url = base
                .as_ref()
                .and_then(|b| b.join(raw).ok())
                .map(|u| u.to_string())
                .unwrap_or_else(|| raw.to_string());
            requests.push(RequestDescriptor {
                url,
                resource_type: Some(kind.to_string()),
            });
        }
    }
    requests
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDING: &str = r##"<html><body>
        <img src="/logo.png">
        <link rel="stylesheet" href="/site.css">
        <ul class="tabs">
            <li><a href="/memberlist?id=7">Members</a></li>
            <li><a href="#about">About</a></li>
        </ul>
        <div style="display: none"><a id="ghost" href="/ghost">Ghost</a></div>
    </body></html>"##;

    fn browser() -> MemoryBrowser {
        MemoryBrowser::new(
            MemorySite::new()
                .with_page("https://example.com/chapter", LANDING)
                .with_page(
                    "https://example.com/memberlist?id=7",
                    "<html><body><table class='listtables'></table></body></html>",
                )
                .failing("https://example.com/flaky", 1)
                .with_page("https://example.com/flaky", "<html><body>ok</body></html>"),
        )
    }

    #[tokio::test]
    async fn click_follows_anchor_href() {
        let browser = browser();
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let page = ctx.new_page().await.unwrap();

        page.goto("https://example.com/chapter#top", Duration::from_secs(1))
            .await
            .unwrap();
        page.click(".tabs li:nth-child(1)").await.unwrap();

        assert_eq!(
            page.current_url().await.unwrap(),
            "https://example.com/memberlist?id=7"
        );
        assert!(page.has_selector("table.listtables").await.unwrap());
    }

    #[tokio::test]
    async fn fragment_links_do_not_navigate() {
        let browser = browser();
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let page = ctx.new_page().await.unwrap();

        page.goto("https://example.com/chapter", Duration::from_secs(1))
            .await
            .unwrap();
        page.click(".tabs li:nth-child(2) a").await.unwrap();
        assert_eq!(page.current_url().await.unwrap(), "https://example.com/chapter");
    }

    #[tokio::test]
    async fn hidden_elements_are_not_visible() {
        let browser = browser();
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let page = ctx.new_page().await.unwrap();
        page.goto("https://example.com/chapter", Duration::from_secs(1))
            .await
            .unwrap();

        assert!(!page.is_visible("#ghost").await.unwrap());
        assert!(page.is_visible(".tabs a").await.unwrap());
        assert!(!page.is_visible(".missing").await.unwrap());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let browser = browser();
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let page = ctx.new_page().await.unwrap();

        let first = page.goto("https://example.com/flaky", Duration::from_secs(1)).await;
        assert!(matches!(first, Err(ScrapeError::Navigation { .. })));
        page.goto("https://example.com/flaky", Duration::from_secs(1))
            .await
            .expect("second attempt succeeds");
    }

    #[tokio::test]
    async fn wait_for_selector_times_out() {
        let browser = browser();
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let page = ctx.new_page().await.unwrap();

        let err = page
            .wait_for_selector("table.listtables", Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Timeout { .. }));
    }

    #[tokio::test]
    async fn context_filter_applies_to_page_requests() {
        let browser = browser();
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let page = ctx.new_page().await.unwrap();
        page.goto("https://example.com/chapter", Duration::from_secs(1))
            .await
            .unwrap();

        let requests = browser.requests();
        assert!(requests.contains(&(
            "https://example.com/logo.png".to_string(),
            FilterDecision::Abort
        )));
        assert!(requests.contains(&(
            "https://example.com/site.css".to_string(),
            FilterDecision::Allow
        )));
    }

    #[tokio::test]
    async fn close_bookkeeping() {
        let browser = browser();
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let page = ctx.new_page().await.unwrap();
        assert_eq!(browser.open_pages(), 1);
        page.close().await.unwrap();
        page.close().await.unwrap();
        assert_eq!(browser.open_pages(), 0);
        ctx.close().await.unwrap();
        assert_eq!(browser.open_contexts(), 0);
    }
    #[tokio::test]
    async fn peaks_track_simultaneous_opens() {
        let browser = browser();
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let first = ctx.new_page().await.unwrap();
        let second = ctx.new_page().await.unwrap();
        first.close().await.unwrap();
        let third = ctx.new_page().await.unwrap();

        assert_eq!(browser.open_pages(), 2);
        assert_eq!(browser.peak_open_pages(), 2);
        second.close().await.unwrap();
        third.close().await.unwrap();
        assert_eq!(browser.peak_open_pages(), 2);
        assert_eq!(browser.peak_open_contexts(), 1);
    }

    #[tokio::test]
    async fn unreadable_page_loads_but_fails_snapshots() {
        let browser = MemoryBrowser::new(
            MemorySite::new()
                .with_page("https://example.com/chapter", LANDING)
                .unreadable("https://example.com/chapter"),
        );
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let page = ctx.new_page().await.unwrap();

        page.goto("https://example.com/chapter", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(page.has_selector(".tabs").await.unwrap());
        assert!(matches!(page.content().await, Err(ScrapeError::Browser(_))));
    }
}
