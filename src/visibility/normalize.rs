//! Canonical normalization of level, group, and property identifiers.
//!
//! Identifiers arrive in inconsistent spellings ("PI Only", "pi_only",
//! "Visibility:PI_Only") and must collapse to one comparison key without
//! merging unrelated entities. Two identifiers name the same entity iff
//! their normalized forms are byte-equal.

/// Normalize a free-form identifier into its canonical comparison key.
///
/// Rules, applied in order: trim surrounding whitespace; take the substring
/// after the last `:` (drops a page-reference prefix); replace spaces with
/// underscores; lowercase. The literal `"*"` is the reserved sentinel for
/// the anonymous population and is returned unchanged.
///
/// Total and idempotent for all inputs.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed == "*" {
        return "*".to_string();
    }

    let suffix = match trimmed.rfind(':') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };

    suffix.replace(' ', "_").to_lowercase()
}

/// Split a comma-separated author list into clean entries: trims each
/// entry, drops empties, dedupes preserving first-seen order. Internal
/// whitespace is left alone.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if !out.iter().any(|p| p == part) {
            out.push(part.to_string());
        }
    }
    out
}
