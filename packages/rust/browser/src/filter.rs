//! Outbound request filtering.
//!
//! Profile and listing pages pull in photos, embedded videos and web fonts
//! that never contribute to the extracted records. The filter aborts those
//! resource classes and lets everything else through.

use std::collections::HashSet;
use std::str::FromStr;

/// Resource classes as reported by the browser for an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Document,
    Stylesheet,
    Script,
    Image,
    Media,
    Font,
    Xhr,
    Fetch,
    Other,
}

impl FromStr for ResourceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "stylesheet" => Ok(Self::Stylesheet),
            "script" => Ok(Self::Script),
            "image" => Ok(Self::Image),
            "media" => Ok(Self::Media),
            "font" => Ok(Self::Font),
            "xhr" => Ok(Self::Xhr),
            "fetch" => Ok(Self::Fetch),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown resource class '{other}'")),
        }
    }
}

/// What the browser reports about a request it is about to send.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub url: String,
    /// Raw resource type string; `None` when the engine could not classify it.
    pub resource_type: Option<String>,
}

/// Outcome for one intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Allow,
    Abort,
}

/// Stateless allow/abort rule applied to every request of a browsing context.
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    blocked: HashSet<ResourceClass>,
}

impl ResourceFilter {
    /// Filter blocking exactly `blocked`.
    pub fn new(blocked: impl IntoIterator<Item = ResourceClass>) -> Self {
        Self {
            blocked: blocked.into_iter().collect(),
        }
    }

    /// Build from configured class names. Unknown names are ignored with a warning.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let blocked = names.iter().filter_map(|name| {
            name.as_ref()
                .parse::<ResourceClass>()
                .map_err(|e| tracing::warn!(error = %e, "ignoring blocked resource entry"))
                .ok()
        });
        Self::new(blocked)
    }

    /// Decide whether `request` may proceed.
    ///
    /// Requests whose class cannot be determined are allowed.
    pub fn decide(&self, request: &RequestDescriptor) -> FilterDecision {
        let class = request
            .resource_type
            .as_deref()
            .and_then(|t| t.parse::<ResourceClass>().ok());

        match class {
            Some(class) if self.blocked.contains(&class) => FilterDecision::Abort,
            _ => FilterDecision::Allow,
        }
    }

    pub fn blocks(&self, class: ResourceClass) -> bool {
        self.blocked.contains(&class)
    }
}

impl Default for ResourceFilter {
    fn default() -> Self {
        Self::new([ResourceClass::Image, ResourceClass::Media, ResourceClass::Font])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(resource_type: Option<&str>) -> RequestDescriptor {
        RequestDescriptor {
            url: "https://example.com/asset".into(),
            resource_type: resource_type.map(String::from),
        }
    }

    #[test]
    fn default_blocks_heavy_resources() {
        let filter = ResourceFilter::default();
        for kind in ["Image", "media", "FONT"] {
            assert_eq!(filter.decide(&request(Some(kind))), FilterDecision::Abort, "{kind}");
        }
    }

    #[test]
    fn default_allows_page_essentials() {
        let filter = ResourceFilter::default();
        for kind in ["Document", "Script", "Stylesheet", "XHR", "Fetch"] {
            assert_eq!(filter.decide(&request(Some(kind))), FilterDecision::Allow, "{kind}");
        }
    }

    #[test]
    fn unclassified_requests_fail_open() {
        let filter = ResourceFilter::default();
        assert_eq!(filter.decide(&request(None)), FilterDecision::Allow);
        assert_eq!(filter.decide(&request(Some("Ping"))), FilterDecision::Allow);
    }

    #[test]
    fn from_names_skips_unknown_entries() {
        let filter = ResourceFilter::from_names(&["image", "hologram"]);
        assert!(filter.blocks(ResourceClass::Image));
        assert!(!filter.blocks(ResourceClass::Font));
    }
}
