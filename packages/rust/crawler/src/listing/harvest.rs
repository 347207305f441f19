//! Reading member stubs out of listing-table snapshots.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use chapterscrape_shared::MemberStub;

use crate::normalize::{find_phone, normalize_phone};
use crate::strategy::{Strategy, first_match};

/// Rows of the member listing table.
pub const LISTING_ROWS: &str = "table.listtables tbody tr";
/// The listing table itself.
pub const LISTING_TABLE: &str = "table.listtables";
/// Pagination control leading to the next listing page.
pub const NEXT_CONTROL: &str = r#"a[title="Next"]"#;

/// State of the pagination control on one listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextControl {
    Absent,
    Disabled,
    Enabled,
}

/// Everything read from one listing page.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub stubs: Vec<MemberStub>,
    pub next: NextControl,
}

/// One table row reduced to the text and markup the phone strategies need.
#[derive(Debug, Clone, Default)]
pub struct RowData {
    /// Trimmed visible text per cell.
    pub cells: Vec<String>,
    /// Text and `href` of the first link in the first cell.
    pub link: Option<(String, String)>,
    /// Attribute values found inside the cells (`href`, `data-*`, `title`).
    pub attributes: Vec<String>,
    /// Raw inner markup of the row.
    pub markup: String,
}

const ROW_PHONE: [Strategy<RowData, String>; 4] = [
    Strategy {
        name: "cell_text",
        run: phone_from_cells,
    },
    Strategy {
        name: "cell_attributes",
        run: phone_from_attributes,
    },
    Strategy {
        name: "row_text_pattern",
        run: phone_from_row_text,
    },
    Strategy {
        name: "row_markup_pattern",
        run: phone_from_markup,
    },
];

fn phone_from_cells(row: &RowData) -> Option<String> {
    row.cells.iter().find_map(|c| normalize_phone(c))
}

fn phone_from_attributes(row: &RowData) -> Option<String> {
    row.attributes
        .iter()
        .find_map(|v| normalize_phone(v.strip_prefix("tel:").unwrap_or(v)))
}

fn phone_from_row_text(row: &RowData) -> Option<String> {
    find_phone(&row.cells.join(" "))
}

fn phone_from_markup(row: &RowData) -> Option<String> {
    match &row.link {
        Some((_, href)) if !href.is_empty() => find_phone(&row.markup.replace(href.as_str(), "")),
        _ => find_phone(&row.markup),
    }
}

/// Parse a listing page snapshot. Relative profile links resolve against `base_url`.
pub fn read_listing_page(html: &str, base_url: &str) -> ListingPage {
    let doc = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    let stubs = rows(&doc)
        .iter()
        .filter_map(|row| stub_from_row(row, base.as_ref()))
        .collect();

    ListingPage {
        stubs,
        next: next_control(&doc),
    }
}

fn rows(doc: &Html) -> Vec<RowData> {
    let row_sel = Selector::parse(LISTING_ROWS).unwrap();
    let cell_sel = Selector::parse("td").unwrap();
    let link_sel = Selector::parse("a").unwrap();
    let attr_sel = Selector::parse("*").unwrap();

    doc.select(&row_sel)
        .map(|tr| {
            let cells: Vec<ElementRef> = tr.select(&cell_sel).collect();
            let member_link = cells.first().and_then(|cell| cell.select(&link_sel).next());
            let link = member_link.and_then(|a| {
                Some((text_of(&a), a.value().attr("href")?.trim().to_string()))
            });
            // The member link's href carries the profile id, never a phone.
            let attributes = cells
                .iter()
                .flat_map(|cell| cell.select(&attr_sel))
                .flat_map(|el| {
                    let is_member_link = member_link.is_some_and(|a| a.id() == el.id());
                    el.value()
                        .attrs()
                        .filter(|(name, _)| match *name {
                            "href" => !is_member_link,
                            "title" => true,
                            other => other.starts_with("data-"),
                        })
                        .map(|(_, value)| value.to_string())
                        .collect::<Vec<_>>()
                })
                .collect();

            RowData {
                cells: cells.iter().map(text_of).collect(),
                link,
                attributes,
                markup: tr.inner_html(),
            }
        })
        .collect()
}

/// Build a stub from a row with at least three cells and a member link.
pub fn stub_from_row(row: &RowData, base: Option<&Url>) -> Option<MemberStub> {
    if row.cells.len() < 3 {
        return None;
    }
    let (link_text, href) = row.link.as_ref()?;
    if href.is_empty() {
        return None;
    }
    let profile_url = match base {
        Some(base) => base.join(href).ok()?.to_string(),
        None => Url::parse(href).ok()?.to_string(),
    };

    let name = if link_text.is_empty() {
        row.cells[0].clone()
    } else {
        link_text.clone()
    };

    Some(MemberStub {
        name,
        business: row.cells[1].clone(),
        category: row.cells[2].clone(),
        phone: first_match(&ROW_PHONE, row).map(|(_, phone)| phone),
        profile_url,
    })
}

fn next_control(doc: &Html) -> NextControl {
    let sel = Selector::parse(NEXT_CONTROL).unwrap();
    match doc.select(&sel).next() {
        None => NextControl::Absent,
        Some(el) if el.value().attr("class").unwrap_or("").contains("disabled") => {
            NextControl::Disabled
        }
        Some(_) => NextControl::Enabled,
    }
}

fn text_of(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    const BASE: &str = "https://bni.example/en-IN/memberlist?chapterName=77";

    #[test]
    fn reads_first_page_rows() {
        let page = read_listing_page(&load_fixture("memberlist_p1.html"), BASE);

        assert_eq!(page.next, NextControl::Enabled);
        assert_eq!(page.stubs.len(), 3);

        let first = &page.stubs[0];
        assert_eq!(first.name, "Asha Rao");
        assert_eq!(first.business, "Rao Interiors");
        assert_eq!(first.category, "Interior Design");
        assert_eq!(first.profile_url, "https://bni.example/en-IN/memberdetails?encryptedMemberId=a1");
        assert_eq!(first.phone.as_deref(), Some("9876543210"));
    }

    #[test]
    fn phone_found_in_attributes_and_markup() {
        let page = read_listing_page(&load_fixture("memberlist_p1.html"), BASE);
        // tel: link with non-numeric text
        assert_eq!(page.stubs[1].phone.as_deref(), Some("9123456780"));
        // data attribute only
        assert_eq!(page.stubs[2].phone.as_deref(), Some("7000000001"));
    }

    #[test]
    fn last_page_has_disabled_next() {
        let page = read_listing_page(&load_fixture("memberlist_p2.html"), BASE);
        assert_eq!(page.next, NextControl::Disabled);
        assert_eq!(page.stubs.len(), 1);
        assert_eq!(page.stubs[0].phone, None);
    }

    #[test]
    fn skips_short_and_linkless_rows() {
        let html = r#"<table class="listtables"><tbody>
            <tr><td><a href="/p/1">Only</a></td><td>Two cells</td></tr>
            <tr><td>No link</td><td>Biz</td><td>Cat</td></tr>
            <tr><td><a href="/p/3">Kept</a></td><td>Biz</td><td>Cat</td></tr>
        </tbody></table>"#;
        let page = read_listing_page(html, "https://bni.example/memberlist");
        assert_eq!(page.stubs.len(), 1);
        assert_eq!(page.stubs[0].profile_url, "https://bni.example/p/3");
        assert_eq!(page.next, NextControl::Absent);
    }

    #[test]
    fn numeric_member_id_is_not_a_phone() {
        let html = r#"<table class="listtables"><tbody>
            <tr><td><a href="/en-IN/memberdetails?encryptedMemberId=9876543210">Esha Nair</a></td>
                <td>Nair Studio</td><td>Photography</td></tr>
            <tr><td><a href="/en-IN/memberdetails?encryptedMemberId=7012345678" title="8123456789">Farid Khan</a></td>
                <td>Khan Tiles</td><td>Flooring</td></tr>
        </tbody></table>"#;
        let page = read_listing_page(html, BASE);

        assert_eq!(page.stubs.len(), 2);
        assert_eq!(page.stubs[0].phone, None);
        // Other attributes of the member link still count.
        assert_eq!(page.stubs[1].phone.as_deref(), Some("8123456789"));
    }

    #[test]
    fn phone_pattern_in_free_text() {
        let row = RowData {
            cells: vec!["Ravi".into(), "Call +91 99887 76655 today".into(), "Cat".into()],
            link: Some(("Ravi".into(), "/p/9".into())),
            ..RowData::default()
        };
        let stub = stub_from_row(&row, Url::parse("https://bni.example/").ok().as_ref()).unwrap();
        assert_eq!(stub.phone.as_deref(), Some("9988776655"));
    }
}
