//! Core domain types for chapter member directories.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Chapter
// ---------------------------------------------------------------------------

/// One scraping unit: a business-group chapter and the URL it was listed with.
///
/// `url` may point to a member listing, an index page, or a detail page that
/// only links to the listing indirectly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Display name, used for the output file stem.
    #[serde(alias = "chapter")]
    pub name: String,
    /// Entry URL for the chapter.
    pub url: String,
}

impl Chapter {
    /// Build a chapter record, stripping any `#fragment` from the URL.
    pub fn new(name: impl Into<String>, url: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            url: strip_fragment(url.as_ref()),
        }
    }
}

/// Remove a trailing `#...` fragment and surrounding whitespace from a URL.
pub fn strip_fragment(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once('#') {
        Some((head, _)) => head.to_string(),
        None => trimmed.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MemberStub
// ---------------------------------------------------------------------------

/// Partial member record harvested from one listing-table row.
///
/// `profile_url` is absolute and is the dedup key within a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStub {
    pub name: String,
    pub business: String,
    pub category: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub profile_url: String,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The five free-text profile sections a member page may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionField {
    MyBusiness,
    TopProduct,
    IdealReferral,
    TopProblemSolved,
    MyFavouriteStory,
}

impl SectionField {
    /// All section fields in output order.
    pub const ALL: [SectionField; 5] = [
        SectionField::MyBusiness,
        SectionField::TopProduct,
        SectionField::IdealReferral,
        SectionField::TopProblemSolved,
        SectionField::MyFavouriteStory,
    ];

    /// The heading text the directory site renders for this section.
    pub fn default_title(self) -> &'static str {
        match self {
            SectionField::MyBusiness => "My Business",
            SectionField::TopProduct => "Top Product",
            SectionField::IdealReferral => "Ideal Referral",
            SectionField::TopProblemSolved => "Top Problem Solved",
            SectionField::MyFavouriteStory => "My Favourite BNI Story",
        }
    }
}

// ---------------------------------------------------------------------------
// MemberProfile
// ---------------------------------------------------------------------------

/// Full output record for one member.
///
/// All five section keys are always serialized (as `null` when missing).
/// `profileUrl` and `error` only appear on degraded records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub name: String,
    pub business: String,
    pub category: String,
    pub phone: Option<String>,
    pub my_business: Option<String>,
    pub top_product: Option<String>,
    pub ideal_referral: Option<String>,
    pub top_problem_solved: Option<String>,
    pub my_favourite_story: Option<String>,
    pub chapter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MemberProfile {
    /// A profile seeded from listing data with every section unset.
    pub fn from_stub(stub: &MemberStub, chapter: &str) -> Self {
        Self {
            name: stub.name.clone(),
            business: stub.business.clone(),
            category: stub.category.clone(),
            phone: stub.phone.clone(),
            my_business: None,
            top_product: None,
            ideal_referral: None,
            top_problem_solved: None,
            my_favourite_story: None,
            chapter: chapter.to_string(),
            profile_url: None,
            error: None,
        }
    }

    /// A degraded record: listing data only, null sections, an error tag and
    /// the profile URL that was attempted.
    pub fn degraded(stub: &MemberStub, chapter: &str, error: impl Into<String>) -> Self {
        Self {
            profile_url: Some(stub.profile_url.clone()),
            error: Some(error.into()),
            ..Self::from_stub(stub, chapter)
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn section(&self, field: SectionField) -> Option<&str> {
        match field {
            SectionField::MyBusiness => self.my_business.as_deref(),
            SectionField::TopProduct => self.top_product.as_deref(),
            SectionField::IdealReferral => self.ideal_referral.as_deref(),
            SectionField::TopProblemSolved => self.top_problem_solved.as_deref(),
            SectionField::MyFavouriteStory => self.my_favourite_story.as_deref(),
        }
    }

    pub fn set_section(&mut self, field: SectionField, value: Option<String>) {
        let slot = match field {
            SectionField::MyBusiness => &mut self.my_business,
            SectionField::TopProduct => &mut self.top_product,
            SectionField::IdealReferral => &mut self.ideal_referral,
            SectionField::TopProblemSolved => &mut self.top_problem_solved,
            SectionField::MyFavouriteStory => &mut self.my_favourite_story,
        };
        *slot = value;
    }
}

// ---------------------------------------------------------------------------
// ChapterResult
// ---------------------------------------------------------------------------

/// Every member profile of one chapter, in harvest order.
#[derive(Debug, Clone)]
pub struct ChapterResult {
    pub chapter: Chapter,
    pub members: Vec<MemberProfile>,
}

impl ChapterResult {
    /// Number of records carrying an error tag.
    pub fn degraded_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_degraded()).count()
    }
}

// ---------------------------------------------------------------------------
// Run outcomes
// ---------------------------------------------------------------------------

/// What happened to one chapter during a run.
#[derive(Debug, Clone)]
pub enum ChapterOutcome {
    /// The chapter's artifact was written.
    Written {
        chapter: String,
        path: PathBuf,
        members: usize,
        degraded: usize,
    },
    /// The chapter produced no artifact.
    Skipped { chapter: String, reason: String },
}

impl ChapterOutcome {
    pub fn chapter(&self) -> &str {
        match self {
            ChapterOutcome::Written { chapter, .. } | ChapterOutcome::Skipped { chapter, .. } => {
                chapter
            }
        }
    }
}

/// Aggregate result of an orchestrator run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Per-chapter outcomes, in input order.
    pub outcomes: Vec<ChapterOutcome>,
    /// Chapters excluded by the name filter before any work started.
    pub filtered_out: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn written_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ChapterOutcome::Written { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.written_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub() -> MemberStub {
        MemberStub {
            name: "Asha Rao".into(),
            business: "Rao Interiors".into(),
            category: "Interior Design".into(),
            phone: Some("9876543210".into()),
            profile_url: "https://example.com/p/1".into(),
        }
    }

    #[test]
    fn chapter_strips_fragment() {
        let chapter = Chapter::new("BNI Azpire", " https://example.com/memberlist?id=4#members ");
        assert_eq!(chapter.url, "https://example.com/memberlist?id=4");
    }

    #[test]
    fn chapter_accepts_legacy_key() {
        let chapter: Chapter =
            serde_json::from_str(r#"{"chapter": "BNI Azpire", "url": "https://example.com"}"#)
                .expect("deserialize");
        assert_eq!(chapter.name, "BNI Azpire");
    }

    #[test]
    fn profile_serializes_all_section_keys() {
        let profile = MemberProfile::from_stub(&stub(), "BNI Azpire");
        let value = serde_json::to_value(&profile).expect("serialize");
        let obj = value.as_object().expect("object");

        for key in [
            "myBusiness",
            "topProduct",
            "idealReferral",
            "topProblemSolved",
            "myFavouriteStory",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
            assert!(obj[key].is_null());
        }
        assert!(!obj.contains_key("error"));
        assert!(!obj.contains_key("profileUrl"));
        assert_eq!(obj["phone"], "9876543210");
    }

    #[test]
    fn degraded_profile_keeps_listing_fields() {
        let profile = MemberProfile::degraded(&stub(), "BNI Azpire", "navigation_failed: 502");
        assert!(profile.is_degraded());
        assert_eq!(profile.business, "Rao Interiors");
        assert_eq!(profile.profile_url.as_deref(), Some("https://example.com/p/1"));

        let value = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(value["error"], "navigation_failed: 502");
        assert!(value["myBusiness"].is_null());
    }

    #[test]
    fn set_and_read_sections() {
        let mut profile = MemberProfile::from_stub(&stub(), "BNI Azpire");
        profile.set_section(SectionField::TopProduct, Some("Modular kitchens".into()));
        assert_eq!(profile.section(SectionField::TopProduct), Some("Modular kitchens"));
        assert_eq!(profile.section(SectionField::IdealReferral), None);
    }

    #[test]
    fn run_summary_counts() {
        let summary = RunSummary {
            started_at: Utc::now(),
            outcomes: vec![
                ChapterOutcome::Written {
                    chapter: "A".into(),
                    path: PathBuf::from("out/a.json"),
                    members: 3,
                    degraded: 0,
                },
                ChapterOutcome::Skipped {
                    chapter: "B".into(),
                    reason: "could not reach a member listing".into(),
                },
            ],
            filtered_out: 1,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(summary.written_count(), 1);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.outcomes[1].chapter(), "B");
    }
}
