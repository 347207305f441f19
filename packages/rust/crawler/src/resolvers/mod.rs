//! Listing resolvers: ways of getting from a chapter entry URL to its member
//! listing.
//!
//! Resolvers are tried in priority order. Each one either declines or acts on
//! the page (navigates or clicks); after an action the chain checks whether
//! the listing table showed up and stops at the first that did.

mod controls;
mod direct;
mod index;
mod markup;
mod text_scan;

use async_trait::async_trait;
use scraper::ElementRef;
use tracing::{debug, info};
use url::Url;

use chapterscrape_browser::BrowserPage;
use chapterscrape_shared::{Result, ScrapeError, TimeoutsConfig};

use crate::listing::{LISTING_TABLE, ListingPatterns};

pub use controls::ControlCandidates;
pub use direct::DirectListing;
pub use index::IndexSibling;
pub use markup::MarkupRegex;
pub use text_scan::{ExactTextScan, LooseTextScan};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Inputs shared by every resolver for one chapter.
pub struct ResolveContext<'a> {
    pub page: &'a dyn BrowserPage,
    pub start_url: &'a str,
    pub patterns: &'a ListingPatterns,
    pub timeouts: &'a TimeoutsConfig,
}

/// What a resolver did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The page was navigated or clicked; the listing may now be showing.
    Acted,
    /// Nothing applicable was found; the page was left as is.
    Declined,
}

#[async_trait]
pub trait ListingResolver: Send + Sync {
    /// Try to bring `cx.page` to the member listing.
    async fn attempt(&self, cx: &ResolveContext<'_>) -> Result<Attempt>;

    /// Resolver name for tracing.
    fn name(&self) -> &str;
}

/// Where the listing was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedListing {
    pub url: String,
    pub resolver: String,
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Resolvers in priority order.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn ListingResolver>>,
}

impl ResolverChain {
    /// The built-in resolvers: URL shortcuts first, page interaction next,
    /// markup search last.
    pub fn new() -> Self {
        Self {
            resolvers: vec![
                Box::new(DirectListing),
                Box::new(IndexSibling),
                Box::new(ControlCandidates),
                Box::new(ExactTextScan),
                Box::new(LooseTextScan),
                Box::new(MarkupRegex),
            ],
        }
    }

    pub fn with_resolvers(resolvers: Vec<Box<dyn ListingResolver>>) -> Self {
        Self { resolvers }
    }

    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Run resolvers until one leaves the page on a confirmed listing.
    pub async fn resolve(&self, cx: &ResolveContext<'_>) -> Result<ResolvedListing> {
        for resolver in &self.resolvers {
            match resolver.attempt(cx).await {
                Ok(Attempt::Declined) => {
                    debug!(resolver = resolver.name(), "resolver declined");
                }
                Ok(Attempt::Acted) => {
                    if listing_confirmed(cx).await {
                        let url = cx.page.current_url().await?;
                        info!(resolver = resolver.name(), %url, "listing resolved");
                        return Ok(ResolvedListing {
                            url,
                            resolver: resolver.name().to_string(),
                        });
                    }
                    debug!(resolver = resolver.name(), "no listing table after resolver");
                }
                Err(e) => {
                    debug!(resolver = resolver.name(), error = %e, "resolver failed");
                }
            }
        }

        Err(ScrapeError::UnreachableListing {
            url: cx.start_url.to_string(),
        })
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new()
    }
}

async fn listing_confirmed(cx: &ResolveContext<'_>) -> bool {
    cx.page
        .wait_for_selector(LISTING_TABLE, cx.timeouts.confirm_wait())
        .await
        .is_ok()
}

// ---------------------------------------------------------------------------
// Helpers shared by resolvers
// ---------------------------------------------------------------------------

/// Make sure the page shows the chapter entry URL before scanning it.
pub(crate) async fn land(cx: &ResolveContext<'_>) -> Result<()> {
    let current = cx.page.current_url().await?;
    if !same_document(&current, cx.start_url) {
        cx.page.goto(cx.start_url, cx.timeouts.navigation()).await?;
    }
    Ok(())
}

/// URL equality ignoring fragments and trivial serialization differences.
pub(crate) fn same_document(a: &str, b: &str) -> bool {
    let canon = |s: &str| {
        Url::parse(s)
            .map(|mut u| {
                u.set_fragment(None);
                u.to_string()
            })
            .unwrap_or_else(|_| s.trim().to_string())
    };
    canon(a) == canon(b)
}

/// A selector addressing exactly `el` via `:nth-child` steps from the root.
pub(crate) fn css_path(el: ElementRef) -> String {
    let mut steps = Vec::new();
    let mut current = Some(el);

    while let Some(node) = current {
        let name = node.value().name();
        let parent = node.parent().and_then(ElementRef::wrap);
        match parent {
            Some(_) => {
                let index = 1 + node
                    .prev_siblings()
                    .filter(|n| n.value().is_element())
                    .count();
                steps.push(format!("{name}:nth-child({index})"));
            }
            None => steps.push(name.to_string()),
        }
        current = parent;
    }

    steps.reverse();
    steps.join(" > ")
}

/// Text of `el`'s direct text children, whitespace collapsed.
pub(crate) fn own_text(el: &ElementRef) -> String {
    el.children()
        .filter_map(|n| n.value().as_text().map(|t| String::from(&**t)))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Full text of `el`, whitespace collapsed.
pub(crate) fn collapsed_text(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapterscrape_browser::{BrowserContext, BrowserEngine, MemoryBrowser, MemorySite, ResourceFilter};
    use chapterscrape_shared::PatternsConfig;
    use scraper::{Html, Selector};

    #[test]
    fn css_path_addresses_element_uniquely() {
        let doc = Html::parse_document(
            "<html><head></head><body><ul><li>a</li><li><span>b</span></li></ul></body></html>",
        );
        let span = doc.select(&Selector::parse("span").unwrap()).next().unwrap();
        let path = css_path(span);
        assert_eq!(
            path,
            "html > body:nth-child(2) > ul:nth-child(1) > li:nth-child(2) > span:nth-child(1)"
        );

        let found: Vec<_> = doc.select(&Selector::parse(&path).unwrap()).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(collapsed_text(&found[0]), "b");
    }

    #[test]
    fn own_text_ignores_children() {
        let doc = Html::parse_document("<div> Members <b>(42)</b> </div>");
        let div = doc.select(&Selector::parse("div").unwrap()).next().unwrap();
        assert_eq!(own_text(&div), "Members");
        assert_eq!(collapsed_text(&div), "Members (42)");
    }

    #[test]
    fn same_document_ignores_fragment() {
        assert!(same_document("https://bni.example/a#x", "https://bni.example/a"));
        assert!(same_document("https://bni.example", "https://bni.example/"));
        assert!(!same_document("https://bni.example/a", "https://bni.example/b"));
    }

    struct Refuses;

    #[async_trait]
    impl ListingResolver for Refuses {
        async fn attempt(&self, _cx: &ResolveContext<'_>) -> Result<Attempt> {
            Ok(Attempt::Declined)
        }
        fn name(&self) -> &str {
            "refuses"
        }
    }

    struct Breaks;

    #[async_trait]
    impl ListingResolver for Breaks {
        async fn attempt(&self, _cx: &ResolveContext<'_>) -> Result<Attempt> {
            Err(ScrapeError::Browser("detached".into()))
        }
        fn name(&self) -> &str {
            "breaks"
        }
    }

    #[tokio::test]
    async fn exhausted_chain_reports_unreachable_listing() {
        let browser = MemoryBrowser::new(MemorySite::new());
        let ctx = browser.new_context(ResourceFilter::default()).await.unwrap();
        let page = ctx.new_page().await.unwrap();
        let patterns = ListingPatterns::compile(&PatternsConfig::default()).unwrap();
        let timeouts = TimeoutsConfig::default();
        let cx = ResolveContext {
            page: &page,
            start_url: "https://bni.example/en-IN/chapterdetail",
            patterns: &patterns,
            timeouts: &timeouts,
        };

        let chain = ResolverChain::with_resolvers(vec![Box::new(Refuses), Box::new(Breaks)]);
        let err = chain.resolve(&cx).await.unwrap_err();
        assert!(err.is_unreachable_listing());
        assert!(err.to_string().contains("chapterdetail"));
    }

    #[test]
    fn default_chain_order() {
        assert_eq!(
            ResolverChain::new().names(),
            [
                "direct_listing",
                "index_sibling",
                "control_candidates",
                "exact_text_scan",
                "loose_text_scan",
                "markup_regex"
            ]
        );
    }
}
