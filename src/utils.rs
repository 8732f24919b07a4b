//! Normalization helpers shared by the metadata loader and the engine.

use chrono::{Datelike, NaiveDate};

use crate::constants::metadata::{NATION_ALIASES, TAG_DELIMITER};
use crate::types::{Nation, Tag, Year};

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}

/// Lowercase a tag and collapse its whitespace.
pub fn normalize_tag<T: AsRef<str>>(tag: T) -> Tag {
    normalize_inline_whitespace(tag.as_ref().to_lowercase())
}

/// Split a raw `a|b|c` tag column into normalized tags, skipping empty entries.
pub fn split_tags(raw: &str) -> Vec<Tag> {
    raw.split(TAG_DELIMITER)
        .map(normalize_tag)
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Fold nationality aliases into their canonical code (`ca` → `us`, `ir` → `uk`).
pub fn canonical_nation<T: AsRef<str>>(raw: T) -> Nation {
    let trimmed = raw.as_ref().trim_end();
    NATION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Parse a date column into a year.
///
/// Accepts plain integers and ISO dates (`YYYY-MM-DD`); anything else is `0`.
pub fn parse_year<T: AsRef<str>>(raw: T) -> Year {
    let trimmed = raw.as_ref().trim();
    if let Ok(year) = trimmed.parse::<Year>() {
        return year;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.year())
        .unwrap_or(0)
}
