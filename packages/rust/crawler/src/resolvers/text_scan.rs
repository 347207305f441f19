use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use chapterscrape_shared::Result;

use super::{Attempt, ListingResolver, ResolveContext, css_path, land, own_text};

/// Scan every element in the body for its own text and click the first whose
/// text exactly equals one of the exact labels.
pub struct ExactTextScan;

#[async_trait]
impl ListingResolver for ExactTextScan {
    async fn attempt(&self, cx: &ResolveContext<'_>) -> Result<Attempt> {
        let labels = &cx.patterns.exact_labels;
        scan_and_click(cx, |text| labels.iter().any(|l| l == text)).await
    }

    fn name(&self) -> &str {
        "exact_text_scan"
    }
}

/// Like [`ExactTextScan`] but case-insensitive and accepting partial matches.
pub struct LooseTextScan;

#[async_trait]
impl ListingResolver for LooseTextScan {
    async fn attempt(&self, cx: &ResolveContext<'_>) -> Result<Attempt> {
        let labels = &cx.patterns.loose_labels;
        scan_and_click(cx, |text| {
            let text = text.to_lowercase();
            labels.iter().any(|l| text.contains(l.as_str()))
        })
        .await
    }

    fn name(&self) -> &str {
        "loose_text_scan"
    }
}

async fn scan_and_click<F>(cx: &ResolveContext<'_>, accept: F) -> Result<Attempt>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    land(cx).await?;
    let html = cx.page.content().await?;
    let Some(path) = first_text_match(&html, &accept) else {
        return Ok(Attempt::Declined);
    };
    cx.page.click(&path).await?;
    Ok(Attempt::Acted)
}

/// Selector of the first body element whose own text is accepted.
fn first_text_match(html: &str, accept: &dyn Fn(&str) -> bool) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("body *").unwrap();

    doc.select(&sel)
        .filter(|el| !matches!(el.value().name(), "script" | "style" | "noscript"))
        .find(|el: &ElementRef| {
            let text = own_text(el);
            !text.is_empty() && accept(&text)
        })
        .map(css_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_uses_own_text_only() {
        let html = r#"<html><body>
            <div class="menu"><span>Members <b>12</b></span><em>Members</em></div>
        </body></html>"#;
        let path = first_text_match(html, &|t| t == "Members").unwrap();
        assert!(path.ends_with("span:nth-child(1)"));
    }

    #[test]
    fn loose_match_is_case_insensitive() {
        let html = "<html><body><p>Welcome</p><div>  See our   CHAPTER Members </div></body></html>";
        let path = first_text_match(html, &|t| t.to_lowercase().contains("chapter members"));
        assert!(path.unwrap().ends_with("div:nth-child(2)"));
    }

    #[test]
    fn scripts_are_not_scanned() {
        let html = "<html><body><script>Members</script></body></html>";
        assert_eq!(first_text_match(html, &|t| t == "Members"), None);
    }
}
