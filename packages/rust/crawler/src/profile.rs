//! Profile Extractor: one member profile page to one [`MemberProfile`].
//!
//! Navigation is retried under a [`RetryPolicy`]; once attempts run out the
//! member is returned as a degraded record instead of an error. Everything
//! after navigation works on a DOM snapshot so each extraction strategy is a
//! plain function over [`Html`].

use std::collections::HashMap;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

use chapterscrape_browser::{BrowserContext, BrowserPage};
use chapterscrape_shared::{MemberProfile, MemberStub, Result, SectionField, TimeoutsConfig};

use crate::normalize::{find_phone, normalize_phone};
use crate::retry::RetryPolicy;
use crate::strategy::{Strategy, first_match};

/// Section headings on a profile page.
pub const SECTION_HEADINGS: &str = ".widgetProfile .rowTwoCol h3";
/// Content block some layouts use for "My Business".
const TEXT_VIDEO_BLOCK: &str = ".widgetMemberTxtVideo";
/// Contact-details regions across layout variants.
const CONTACT_REGION: &str = "#contactDetails, .contactDetails, .widgetMemberContact";
const CONTACT_LINKS: &str = "#contactDetails a, .contactDetails a, .widgetMemberContact a";

/// Error tag prefix for members whose profile never loaded.
pub const NAVIGATION_FAILED: &str = "navigation_failed";

// ---------------------------------------------------------------------------
// SectionCatalog
// ---------------------------------------------------------------------------

/// Section titles to look for and the field each one fills.
#[derive(Debug, Clone)]
pub struct SectionCatalog {
    entries: Vec<(String, SectionField)>,
}

impl SectionCatalog {
    pub fn new(entries: impl IntoIterator<Item = (String, SectionField)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Title configured for `field`, if the catalog covers it.
    pub fn title_of(&self, field: SectionField) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, f)| *f == field)
            .map(|(t, _)| t.as_str())
    }
}

impl Default for SectionCatalog {
    fn default() -> Self {
        Self::new(
            SectionField::ALL
                .iter()
                .map(|f| (f.default_title().to_string(), *f)),
        )
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

const PROFILE_PHONE: [Strategy<Html, String>; 3] = [
    Strategy {
        name: "tel_link",
        run: phone_from_tel_link,
    },
    Strategy {
        name: "contact_link",
        run: phone_from_contact_links,
    },
    Strategy {
        name: "contact_text",
        run: phone_from_contact_text,
    },
];

fn phone_from_tel_link(doc: &Html) -> Option<String> {
    let sel = Selector::parse(r#"a[href^="tel:"]"#).unwrap();
    doc.select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| normalize_phone(href.trim_start_matches("tel:")))
}

fn phone_from_contact_links(doc: &Html) -> Option<String> {
    let sel = Selector::parse(CONTACT_LINKS).unwrap();
    doc.select(&sel).find_map(|a| {
        normalize_phone(&text_of(&a)).or_else(|| {
            a.value()
                .attr("href")
                .and_then(|h| normalize_phone(h.trim_start_matches("tel:")))
        })
    })
}

fn phone_from_contact_text(doc: &Html) -> Option<String> {
    let sel = Selector::parse(CONTACT_REGION).unwrap();
    doc.select(&sel).find_map(|region| find_phone(&text_of(&region)))
}

/// What a section strategy looks up.
pub struct SectionQuery<'a> {
    pub doc: &'a Html,
    pub title: &'a str,
}

/// Heading + paragraph block used by some layouts for "My Business".
fn section_from_text_video_block(q: &SectionQuery<'_>) -> Option<String> {
    let block_sel = Selector::parse(TEXT_VIDEO_BLOCK).unwrap();
    let heading_sel = Selector::parse("h2, h3").unwrap();
    let para_sel = Selector::parse("p").unwrap();

    q.doc.select(&block_sel).find_map(|block| {
        block
            .select(&heading_sel)
            .find(|h| text_of(h) == q.title)?;
        block
            .select(&para_sel)
            .next()
            .map(|p| block_text(&p))
            .filter(|t| !t.is_empty())
    })
}

/// Profile-widget heading whose next sibling element holds the text.
///
/// When a title repeats, the last heading carrying it decides the value.
fn section_from_heading(q: &SectionQuery<'_>) -> Option<String> {
    let sel = Selector::parse(SECTION_HEADINGS).unwrap();
    let heading = q.doc.select(&sel).filter(|h| text_of(h) == q.title).last()?;
    let sibling = heading.next_siblings().find_map(ElementRef::wrap)?;
    Some(block_text(&sibling)).filter(|t| !t.is_empty())
}

fn section_strategies<'a>(field: SectionField) -> Vec<Strategy<SectionQuery<'a>, String>> {
    let heading = Strategy {
        name: "profile_heading",
        run: section_from_heading,
    };
    match field {
        SectionField::MyBusiness => vec![
            Strategy {
                name: "text_video_block",
                run: section_from_text_video_block,
            },
            heading,
        ],
        _ => vec![heading],
    }
}

// ---------------------------------------------------------------------------
// ProfileExtractor
// ---------------------------------------------------------------------------

/// Fetches member profiles and fills the fixed output schema.
#[derive(Debug, Clone)]
pub struct ProfileExtractor {
    catalog: SectionCatalog,
    retry: RetryPolicy,
    navigation_timeout: Duration,
    section_wait: Duration,
}

impl ProfileExtractor {
    pub fn new(catalog: SectionCatalog, retry: RetryPolicy, timeouts: &TimeoutsConfig) -> Self {
        Self {
            catalog,
            retry,
            navigation_timeout: timeouts.navigation(),
            section_wait: timeouts.section_wait(),
        }
    }

    /// Extract `stub`'s profile on a fresh page of `context`.
    ///
    /// Navigation exhaustion yields a degraded record, not an error. Errors
    /// are only returned for failures after the page loaded.
    #[instrument(skip_all, fields(profile_url = %stub.profile_url))]
    pub async fn extract<C: BrowserContext>(
        &self,
        context: &C,
        stub: &MemberStub,
        chapter: &str,
    ) -> Result<MemberProfile> {
        let page = context.new_page().await?;
        let result = self.extract_on(&page, stub, chapter).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "closing profile page failed");
        }
        result
    }

    async fn extract_on(
        &self,
        page: &dyn BrowserPage,
        stub: &MemberStub,
        chapter: &str,
    ) -> Result<MemberProfile> {
        let url = stub.profile_url.as_str();
        let navigated = self
            .retry
            .run("profile navigation", |_| page.goto(url, self.navigation_timeout))
            .await;
        if let Err(e) = navigated {
            warn!(error = %e, "profile unreachable, recording degraded member");
            return Ok(MemberProfile::degraded(
                stub,
                chapter,
                format!("{NAVIGATION_FAILED}: {e}"),
            ));
        }

        if let Err(e) = page.wait_for_selector(SECTION_HEADINGS, self.section_wait).await {
            debug!(error = %e, "no section headings, continuing with what rendered");
        }
        let html = page.content().await?;
        Ok(self.extract_from_html(&html, stub, chapter))
    }

    /// Fill a profile from a page snapshot. Listing data seeds the record.
    pub fn extract_from_html(&self, html: &str, stub: &MemberStub, chapter: &str) -> MemberProfile {
        let doc = Html::parse_document(html);
        let mut profile = MemberProfile::from_stub(stub, chapter);

        if let Some((strategy, phone)) = first_match(&PROFILE_PHONE, &doc) {
            debug!(strategy, "phone found on profile");
            profile.phone = Some(phone);
        }

        for (field, value) in self.sections(&doc) {
            profile.set_section(field, Some(value));
        }
        profile
    }

    fn sections(&self, doc: &Html) -> HashMap<SectionField, String> {
        let mut found = HashMap::new();
        for field in SectionField::ALL {
            let Some(title) = self.catalog.title_of(field) else {
                continue;
            };
            let query = SectionQuery { doc, title };
            if let Some((_, value)) = first_match(&section_strategies(field), &query) {
                found.insert(field, value);
            }
        }
        found
    }
}

fn text_of(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rendered-ish text: one line per non-blank text line, trimmed.
fn block_text(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
