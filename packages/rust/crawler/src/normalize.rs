//! Contact-number canonicalization.

use std::sync::LazyLock;

use regex::Regex;

/// Separator punctuation dropped before validation.
const SEPARATORS: &[char] = &['-', '.', '(', ')', '/', '+'];

/// One number in free text: an optional country or trunk prefix, then exactly
/// ten digits with at most two separator characters between any two of them.
static PHONE_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:\+?91|0091|0)[\s\-./()]{0,2})?\d(?:[\s\-./()]{0,2}\d){9}").unwrap()
});

/// Canonicalize raw contact text into a 10-digit local mobile number.
///
/// Whitespace and separators are removed, then a `91`, `0091` or trunk `0`
/// prefix is dropped when what remains is exactly ten characters. The result
/// is accepted when its last ten characters are digits starting with 6-9.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !SEPARATORS.contains(c))
        .collect();

    let local = match cleaned.len() {
        12 if cleaned.starts_with("91") => &cleaned[2..],
        14 if cleaned.starts_with("0091") => &cleaned[4..],
        11 if cleaned.starts_with('0') => &cleaned[1..],
        _ => cleaned.as_str(),
    };

    let bytes = local.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    let tail = &bytes[bytes.len() - 10..];
    if !tail.iter().all(u8::is_ascii_digit) || !matches!(tail[0], b'6'..=b'9') {
        return None;
    }
    std::str::from_utf8(tail).ok().map(str::to_string)
}

/// First phone-looking substring of `text` that normalizes.
///
/// Candidates glued to further digits on either side are part of some longer
/// number; the scan then resumes one character later.
pub fn find_phone(text: &str) -> Option<String> {
    let mut start = 0;
    while let Some(m) = PHONE_CANDIDATE.find_at(text, start) {
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        let standalone = !before.is_some_and(|c| c.is_ascii_digit())
            && !after.is_some_and(|c| c.is_ascii_digit());
        if standalone {
            if let Some(phone) = normalize_phone(m.as_str()) {
                return Some(phone);
            }
        }
        start = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
    }
    None
}
