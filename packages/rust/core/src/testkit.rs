//! Shared fixtures for worker and orchestrator tests.

use std::sync::Arc;
use std::time::Duration;

use chapterscrape_browser::{MemorySite, ResourceFilter};
use chapterscrape_crawler::{
    ListingNavigator, ListingPatterns, ProfileExtractor, RetryPolicy, SectionCatalog,
};
use chapterscrape_shared::{Chapter, PatternsConfig, TimeoutsConfig};

use crate::worker::ChapterWorker;

pub const LIST_P1: &str = "https://bni.example/en-IN/memberlist?chapterName=77";
pub const LIST_P2: &str = "https://bni.example/en-IN/memberlist?chapterName=77&page=2";
pub const DETAIL: &str = "https://bni.example/en-IN/chapterdetail?chapterId=77";
pub const DEAD_END: &str = "https://bni.example/en-IN/chapterdetail?chapterId=404";
pub const PROFILE_A1: &str = "https://bni.example/en-IN/memberdetails?encryptedMemberId=a1";
pub const PROFILE_A2: &str = "https://bni.example/en-IN/memberdetails?encryptedMemberId=a2";
pub const PROFILE_A3: &str = "https://bni.example/en-IN/memberdetails?encryptedMemberId=a3";
pub const PROFILE_D4: &str = "https://bni.example/en-IN/memberdetails?encryptedMemberId=d4";

pub fn load_fixture(name: &str) -> String {
    let path = format!("../../../fixtures/html/{name}");
    std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
}

pub fn fast_timeouts() -> TimeoutsConfig {
    TimeoutsConfig {
        listing_wait_ms: 200,
        confirm_wait_ms: 200,
        control_wait_ms: 200,
        section_wait_ms: 50,
        settle_ms: 1,
        retry_base_ms: 1,
        ..TimeoutsConfig::default()
    }
}

/// A chapter with a detail page, a two-page listing and four profiles.
pub fn chapter_site() -> MemorySite {
    let full = load_fixture("profile_full.html");
    MemorySite::new()
        .with_page(DETAIL, load_fixture("chapter_detail.html"))
        .with_page(LIST_P1, load_fixture("memberlist_p1.html"))
        .with_page(LIST_P2, load_fixture("memberlist_p2.html"))
        .with_page(PROFILE_A1, full.clone())
        .with_page(PROFILE_A2, full.clone())
        .with_page(PROFILE_A3, full)
        .with_page(PROFILE_D4, load_fixture("profile_bare.html"))
}

pub fn chapter() -> Chapter {
    Chapter::new("BNI Azpire", DETAIL)
}

pub fn worker(profile_concurrency: usize) -> ChapterWorker {
    let timeouts = fast_timeouts();
    let patterns = ListingPatterns::compile(&PatternsConfig::default()).unwrap();
    ChapterWorker::new(
        ListingNavigator::new(Arc::new(patterns), timeouts.clone()),
        ProfileExtractor::new(
            SectionCatalog::default(),
            RetryPolicy::new(2, Duration::from_millis(1)),
            &timeouts,
        ),
        profile_concurrency,
        ResourceFilter::default(),
    )
}
