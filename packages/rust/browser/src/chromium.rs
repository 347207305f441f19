//! Chrome DevTools Protocol engine backed by `chromiumoxide`.
//!
//! One Chrome process is shared by the whole run; every chapter gets its own
//! incognito browser context. Request filtering uses the Fetch domain: each
//! page pauses all requests and a background task continues or fails them
//! according to the context's [`ResourceFilter`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use chapterscrape_shared::{BrowserSection, Result, ScrapeError};

use crate::engine::{BrowserContext, BrowserEngine, BrowserPage};
use crate::filter::{FilterDecision, RequestDescriptor, ResourceFilter};

fn cdp_error(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Browser(e.to_string())
}

// ---------------------------------------------------------------------------
// ChromiumEngine
// ---------------------------------------------------------------------------

/// A launched Chrome/Chromium process.
pub struct ChromiumEngine {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumEngine {
    /// Launch Chrome using the `[browser]` config section.
    pub async fn launch(config: &BrowserSection) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::config(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::Browser(format!("failed to launch browser: {e}")))?;

        // The handler must be polled for the browser connection to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!(error = %e, "browser handler event error");
                }
            }
        });

        info!(headless = config.headless, "browser launched");
        Ok(Self {
            browser: Arc::new(browser),
            handler,
        })
    }

    /// Close Chrome and wait for the process to exit.
    pub async fn shutdown(self) -> Result<()> {
        let result = match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                browser.close().await.map_err(cdp_error)?;
                browser.wait().await.map_err(cdp_error)?;
                Ok(())
            }
            Err(_) => {
                warn!("browser still referenced by open contexts; leaving process to exit on drop");
                Ok(())
            }
        };
        self.handler.abort();
        result
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    type Context = ChromiumContext;

    async fn new_context(&self, filter: ResourceFilter) -> Result<ChromiumContext> {
        let created = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(cdp_error)?;
        let id = created.result.browser_context_id.clone();
        debug!(context = ?id, "browser context created");

        Ok(ChromiumContext {
            browser: Arc::clone(&self.browser),
            id,
            filter: Arc::new(filter),
        })
    }
}

// ---------------------------------------------------------------------------
// ChromiumContext
// ---------------------------------------------------------------------------

/// Incognito browser context.
pub struct ChromiumContext {
    browser: Arc<Browser>,
    id: BrowserContextId,
    filter: Arc<ResourceFilter>,
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    type Page = ChromiumPage;

    async fn new_page(&self) -> Result<ChromiumPage> {
        let params = blank_target(&self.id)?;
        let page = self.browser.new_page(params).await.map_err(cdp_error)?;

        let interceptor = install_filter(&page, Arc::clone(&self.filter)).await?;
        Ok(ChromiumPage { page, interceptor })
    }

    async fn close(&self) -> Result<()> {
        self.browser
            .execute(DisposeBrowserContextParams::new(self.id.clone()))
            .await
            .map_err(cdp_error)?;
        Ok(())
    }
}

/// A blank tab inside context `id`.
fn blank_target(id: &BrowserContextId) -> Result<CreateTargetParams> {
    CreateTargetParams::builder()
        .url("about:blank")
        .browser_context_id(id.clone())
        .build()
        .map_err(cdp_error)
}

/// Pause every request of `page` and let `filter` decide its fate.
async fn install_filter(page: &Page, filter: Arc<ResourceFilter>) -> Result<JoinHandle<()>> {
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(cdp_error)?;
    page.execute(EnableParams::default())
        .await
        .map_err(cdp_error)?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let request = RequestDescriptor {
                url: event.request.url.clone(),
                resource_type: Some(event.resource_type.as_ref().to_string()),
            };
            let outcome = match filter.decide(&request) {
                FilterDecision::Abort => page
                    .execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ()),
                FilterDecision::Allow => page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = outcome {
                trace!(url = %request.url, error = %e, "paused request already gone");
            }
        }
    }))
}

// ---------------------------------------------------------------------------
// ChromiumPage
// ---------------------------------------------------------------------------

/// A Chrome tab with its request interceptor.
pub struct ChromiumPage {
    page: Page,
    interceptor: JoinHandle<()>,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::navigation(url, e.to_string())),
            Err(_) => Err(ScrapeError::navigation(
                url,
                format!("timed out after {}ms", timeout.as_millis()),
            )),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self.page.url().await.map_err(cdp_error)?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.map_err(cdp_error)
    }

    async fn has_selector(&self, selector: &str) -> Result<bool> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let quoted = serde_json::to_string(selector)?;
        let script = format!(
            "(() => {{
                const el = document.querySelector({quoted});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return style.display !== 'none'
                    && style.visibility !== 'hidden'
                    && rect.width > 0 && rect.height > 0;
            }})()"
        );
        let result = self.page.evaluate(script).await.map_err(cdp_error)?;
        result.into_value::<bool>().map_err(cdp_error)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScrapeError::Browser(format!("no element matches {selector}: {e}")))?;
        element.click().await.map_err(cdp_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.interceptor.abort();
        self.page.clone().close().await.map_err(cdp_error)
    }
}
