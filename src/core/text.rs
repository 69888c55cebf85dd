use regex::Regex;
use std::sync::OnceLock;

fn zip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{5})(-\d{4})?").expect("zip pattern is valid"))
}

/// Pull a five-digit zip code out of user-entered search text
///
/// Purely numeric input is taken as a zip and cut to five digits
/// ("040721234" -> "04072"). Otherwise the first `NNNNN` or `NNNNN-NNNN`
/// in the text wins, and the ZIP+4 suffix is dropped.
pub fn find_zip_in_text(search: &str) -> Option<String> {
    let trimmed = search.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Some(trimmed.chars().take(5).collect());
    }

    zip_pattern()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
