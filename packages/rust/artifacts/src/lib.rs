//! Output Writer: one JSON artifact per chapter.
//!
//! Files are named after the chapter slug and written atomically (temp file,
//! then rename) so a crashed run never leaves a truncated artifact behind.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use chapterscrape_shared::{ChapterResult, MemberProfile, OutputLayout, Result, ScrapeError};

/// Filesystem-safe stem for a chapter name.
///
/// Lowercases, turns every run of non-alphanumeric characters into one `_`
/// and trims underscores from both ends. Empty results become `chapter`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        "chapter".to_string()
    } else {
        slug
    }
}

/// Where a chapter's artifact goes.
///
/// With the split layout, chapters whose source was a detail page land in the
/// detail subdirectory and everything else in the listing subdirectory.
pub fn output_path(layout: &OutputLayout, chapter_name: &str, from_detail_page: bool) -> PathBuf {
    let dir = match &layout.split {
        Some((detail, _)) if from_detail_page => layout.root.join(detail),
        Some((_, listing)) => layout.root.join(listing),
        None => layout.root.clone(),
    };
    dir.join(format!("{}.json", slugify(chapter_name)))
}

/// Pretty-printed JSON array with a trailing newline. Non-ASCII is kept as is.
pub fn render_members(members: &[MemberProfile]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(members)?;
    json.push('\n');
    Ok(json)
}

/// Write `result` to its artifact path and return that path.
#[instrument(skip_all, fields(chapter = %result.chapter.name, members = result.members.len()))]
pub fn write_chapter(
    layout: &OutputLayout,
    result: &ChapterResult,
    from_detail_page: bool,
) -> Result<PathBuf> {
    let target = output_path(layout, &result.chapter.name, from_detail_page);
    let content = render_members(&result.members)?;
    write_atomic(&target, &content)?;
    debug!(path = %target.display(), bytes = content.len(), "wrote chapter artifact");
    Ok(target)
}

fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| ScrapeError::validation(format!("no parent directory for {}", target.display())))?;
    std::fs::create_dir_all(dir).map_err(|e| ScrapeError::io(dir, e))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| ScrapeError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| ScrapeError::io(target, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapterscrape_shared::{Chapter, MemberStub};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cs-artifacts-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn member(name: &str, business: &str) -> MemberProfile {
        MemberProfile::from_stub(
            &MemberStub {
                name: name.into(),
                business: business.into(),
                category: "Catering".into(),
                phone: Some("9876543210".into()),
                profile_url: "https://bni.example/p/1".into(),
            },
            "BNI Azpire",
        )
    }

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("BNI Azpire!! "), "bni_azpire");
        assert_eq!(slugify("  --Elite  Kolkata-- "), "elite_kolkata");
        assert_eq!(slugify("Région 7"), "r_gion_7");
        assert_eq!(slugify("!!!"), "chapter");
        assert_eq!(slugify(""), "chapter");
    }

    #[test]
    fn output_path_layouts() {
        let flat = OutputLayout {
            root: PathBuf::from("out"),
            split: None,
        };
        assert_eq!(output_path(&flat, "BNI Azpire", true), PathBuf::from("out/bni_azpire.json"));

        let split = OutputLayout {
            root: PathBuf::from("out"),
            split: Some(("detail".into(), "listing".into())),
        };
        assert_eq!(
            output_path(&split, "BNI Azpire", true),
            PathBuf::from("out/detail/bni_azpire.json")
        );
        assert_eq!(
            output_path(&split, "BNI Azpire", false),
            PathBuf::from("out/listing/bni_azpire.json")
        );
    }

    #[test]
    fn render_keeps_unicode_and_all_section_keys() {
        let json = render_members(&[member("Ananyā Dās", "Café Masala")]).unwrap();

        assert!(json.ends_with("]\n"));
        assert!(json.contains("\"Ananyā Dās\""));
        assert!(json.contains("Café Masala"));
        for key in ["myBusiness", "topProduct", "idealReferral", "topProblemSolved", "myFavouriteStory"] {
            assert!(json.contains(&format!("\"{key}\": null")), "{key}");
        }
        assert!(!json.contains("\"error\""));
        assert!(!json.contains("profileUrl"));
    }

    #[test]
    fn write_chapter_creates_dirs_and_replaces_atomically() {
        let tmp = temp_dir();
        let layout = OutputLayout {
            root: tmp.join("nested"),
            split: None,
        };
        let mut result = ChapterResult {
            chapter: Chapter::new("BNI Azpire", "https://bni.example/memberlist"),
            members: vec![member("A", "First")],
        };

        let path = write_chapter(&layout, &result, false).unwrap();
        assert_eq!(path, tmp.join("nested").join("bni_azpire.json"));

        result.members.push(member("B", "Second"));
        write_chapter(&layout, &result, false).unwrap();

        let parsed: Vec<MemberProfile> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].business, "Second");

        let leftovers: Vec<_> = std::fs::read_dir(tmp.join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
