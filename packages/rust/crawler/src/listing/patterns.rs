//! URL patterns and control labels used to reach a member listing.

use regex::{NoExpand, Regex};
use url::Url;

use chapterscrape_shared::{PatternsConfig, Result, ScrapeError};

/// Compiled form of the `[patterns]` config section.
#[derive(Debug, Clone)]
pub struct ListingPatterns {
    listing: Regex,
    index: Regex,
    index_replacement: String,
    detail: Regex,
    markup_href: Regex,
    markup_absolute: Regex,
    pub control_labels: Vec<String>,
    pub exact_labels: Vec<String>,
    pub loose_labels: Vec<String>,
}

impl ListingPatterns {
    pub fn compile(config: &PatternsConfig) -> Result<Self> {
        let build = |name: &str, pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ScrapeError::config(format!("invalid {name} pattern '{pattern}': {e}")))
        };

        let listing = &config.listing;
        Ok(Self {
            listing: build("listing", listing)?,
            index: build("index", &config.index)?,
            index_replacement: config.index_replacement.clone(),
            detail: build("detail", &config.detail)?,
            markup_href: build(
                "listing",
                &format!(r#"href\s*=\s*["']([^"']*?(?:{listing})[^"']*)["']"#),
            )?,
            markup_absolute: build(
                "listing",
                &format!(r#"https?://[^\s"'<>]*?(?:{listing})[^\s"'<>]*"#),
            )?,
            control_labels: config.control_labels.clone(),
            exact_labels: config.exact_labels.clone(),
            loose_labels: config
                .loose_labels
                .iter()
                .map(|l| l.to_lowercase())
                .collect(),
        })
    }

    /// Whether `url` already shows the member listing.
    pub fn is_listing(&self, url: &str) -> bool {
        self.listing.is_match(url)
    }

    /// Whether `url` is a chapter detail page.
    pub fn is_detail(&self, url: &str) -> bool {
        self.detail.is_match(url)
    }

    /// The guessed listing URL for an index page, or `None` if `url` is not one.
    pub fn index_sibling(&self, url: &str) -> Option<String> {
        if !self.index.is_match(url) {
            return None;
        }
        Some(
            self.index
                .replacen(url, 1, NoExpand(&self.index_replacement))
                .into_owned(),
        )
    }

    /// A listing URL mentioned anywhere in `html`, resolved against `base`.
    ///
    /// `href` attributes are preferred over bare absolute URLs.
    pub fn find_in_markup(&self, html: &str, base: &str) -> Option<String> {
        let raw = self
            .markup_href
            .captures(html)
            .and_then(|c| c.get(1))
            .or_else(|| self.markup_absolute.find(html))?
            .as_str()
            .replace("&amp;", "&");

        match Url::parse(base).and_then(|b| b.join(&raw)) {
            Ok(url) => Some(url.to_string()),
            Err(_) if raw.starts_with("http") => Some(raw),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> ListingPatterns {
        ListingPatterns::compile(&PatternsConfig::default()).unwrap()
    }

    #[test]
    fn classifies_urls() {
        let p = patterns();
        assert!(p.is_listing("https://bni.example/en-IN/memberlist?chapterName=77"));
        assert!(!p.is_listing("https://bni.example/en-IN/index"));
        assert!(p.is_detail("https://bni.example/en-IN/chapterdetail?chapterId=5"));
    }

    #[test]
    fn index_sibling_swaps_path_segment() {
        let p = patterns();
        assert_eq!(
            p.index_sibling("https://azpire.bni.example/en-IN/index").as_deref(),
            Some("https://azpire.bni.example/en-IN/memberlist")
        );
        assert_eq!(
            p.index_sibling("https://azpire.bni.example/en-IN/index.php").as_deref(),
            Some("https://azpire.bni.example/en-IN/memberlist")
        );
        assert_eq!(p.index_sibling("https://azpire.bni.example/en-IN/chapterdetail"), None);
    }

    #[test]
    fn finds_relative_href_in_markup() {
        let p = patterns();
        let html = r#"<div><a class="x" href="/en-IN/memberlist?chapterName=77&amp;regionIds=3"></a></div>"#;
        assert_eq!(
            p.find_in_markup(html, "https://bni.example/en-IN/chapterdetail?id=1")
                .as_deref(),
            Some("https://bni.example/en-IN/memberlist?chapterName=77&regionIds=3")
        );
    }

    #[test]
    fn finds_absolute_url_in_script() {
        let p = patterns();
        let html = r#"<script>var target = "https://other.example/memberlist?c=9";</script>"#;
        assert_eq!(
            p.find_in_markup(html, "https://bni.example/").as_deref(),
            Some("https://other.example/memberlist?c=9")
        );
        assert_eq!(p.find_in_markup("<p>nothing here</p>", "https://bni.example/"), None);
    }

    #[test]
    fn rejects_invalid_listing_pattern() {
        let config = PatternsConfig {
            listing: "(".into(),
            ..PatternsConfig::default()
        };
        assert!(ListingPatterns::compile(&config).is_err());
    }
}
