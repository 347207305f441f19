//! Browser capability for chapterscrape: engine traits, request filtering,
//! a Chrome DevTools engine and an in-memory engine over captured pages.

pub mod engine;
pub mod filter;
pub mod memory;

#[cfg(feature = "chromium")]
pub mod chromium;

pub use engine::{BrowserContext, BrowserEngine, BrowserPage, POLL_INTERVAL};
pub use filter::{FilterDecision, RequestDescriptor, ResourceClass, ResourceFilter};
pub use memory::{MemoryBrowser, MemoryContext, MemoryPage, MemorySite};

#[cfg(feature = "chromium")]
pub use chromium::{ChromiumContext, ChromiumEngine, ChromiumPage};
