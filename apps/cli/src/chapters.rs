//! Chapter-list loading.
//!
//! Accepts either a JSON array of `{name, url}` records or messy pasted text
//! where every URL line is labelled by the nearest non-empty line above it.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use chapterscrape_shared::{Chapter, Result, ScrapeError, strip_fragment};

/// Hosts whose pages never lead to a member listing.
const UNSUPPORTED_HOSTS: &[&str] = &["share.google", "scribd.com"];

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// A URL that was dropped while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SkippedEntry {
    pub name: String,
    pub url: String,
    pub reason: &'static str,
}

#[derive(Debug, Default)]
pub(crate) struct ChapterList {
    pub chapters: Vec<Chapter>,
    pub skipped: Vec<SkippedEntry>,
    /// Total URLs seen before filtering.
    pub found: usize,
}

/// Load chapters from `path`, sniffing JSON by its leading `[`.
pub(crate) fn load(path: &Path) -> Result<ChapterList> {
    let text = std::fs::read_to_string(path).map_err(|e| ScrapeError::io(path, e))?;
    if text.trim_start().starts_with('[') {
        let records: Vec<Chapter> = serde_json::from_str(&text)
            .map_err(|e| ScrapeError::parse(format!("{}: {e}", path.display())))?;
        Ok(build(records.into_iter().map(|c| (c.name, c.url)).collect()))
    } else {
        Ok(build(parse_pairs(&text)))
    }
}

/// Pull `(label, url)` pairs out of pasted text.
///
/// The label is the nearest line above the URL that is not blank, not a bare
/// `Link` and not itself a URL. A label sharing a line with its URL keeps only
/// the text around the URL. Unlabelled URLs are numbered `Chapter_N`.
pub(crate) fn parse_pairs(text: &str) -> Vec<(String, String)> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut pairs = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(m) = URL_RE.find(line) else {
            continue;
        };
        let url = strip_fragment(m.as_str());

        let name = lines[..=idx]
            .iter()
            .rev()
            .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("link"))
            .filter(|l| !l.starts_with("http://") && !l.starts_with("https://"))
            .map(|l| URL_RE.replace_all(l, "").trim().to_string())
            .find(|l| !l.is_empty())
            .unwrap_or_else(|| format!("Chapter_{}", pairs.len() + 1));

        pairs.push((name, url));
    }

    pairs
}

/// Drop unsupported hosts and repeated URLs (first occurrence wins).
pub(crate) fn build(pairs: Vec<(String, String)>) -> ChapterList {
    let mut list = ChapterList {
        found: pairs.len(),
        ..ChapterList::default()
    };
    let mut seen = HashSet::new();

    for (name, url) in pairs {
        let url = strip_fragment(&url);
        if UNSUPPORTED_HOSTS.iter().any(|h| url.contains(h)) {
            list.skipped.push(SkippedEntry {
                name,
                url,
                reason: "unsupported host",
            });
            continue;
        }
        if !seen.insert(url.clone()) {
            continue;
        }
        list.chapters.push(Chapter::new(name, url));
    }

    list
}
