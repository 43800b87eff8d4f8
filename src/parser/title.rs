//! Page title → (brand, model name) resolution.

use std::sync::LazyLock;

use regex::Regex;

use crate::brands;

static TRAILING_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());

#[derive(Debug, Default)]
pub struct ResolvedTitle {
    pub brand: String,
    pub name: String,
    pub year: Option<i32>,
}

/// Split a page title into brand and model name.
///
/// Trailing disambiguation like "(automobile)" or "(W222)" is dropped, a
/// leading four-digit year ("1999 Nissan Skyline") is peeled off, then the
/// brand table decides the split, falling back to first-whitespace. A title
/// that yields an empty brand or name marks the page as incomplete; callers
/// skip those.
pub fn resolve(title: &str) -> ResolvedTitle {
    let cleaned = TRAILING_PAREN_RE.replace(title, "");
    let cleaned = cleaned.trim();

    let (year, rest) = split_leading_year(cleaned);
    let (brand, name) = split_brand(rest);
    ResolvedTitle { brand, name, year }
}

fn split_leading_year(title: &str) -> (Option<i32>, &str) {
    if let Some((first, rest)) = title.split_once(char::is_whitespace) {
        if first.len() == 4 && first.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(year) = first.parse() {
                return (Some(year), rest.trim_start());
            }
        }
    }
    (None, title)
}

fn split_brand(title: &str) -> (String, String) {
    if let Some((brand, rest)) = brands::match_brand(title) {
        return (brand.to_string(), rest.to_string());
    }
    match title.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim_start().to_string()),
        None => (title.to_string(), String::new()),
    }
}

// ── Tests ──
