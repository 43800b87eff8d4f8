//! Wiki markup stripping: turns raw wikitext fragments into plain prose.

use std::sync::LazyLock;

use regex::Regex;

static INNER_TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^{}]*\}\}").unwrap());
static REF_SELF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<ref[^>]*/\s*>").unwrap());
static REF_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<ref[^>]*>.*?</ref>").unwrap());
static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(?:[^|\[\]]*\|)?([^\[\]]*)\]\]").unwrap());
static EXT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[https?://[^\]]*\]").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static QUOTE_MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'{2,}").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Unbalanced markup must not spin the innermost-template loop forever.
const MAX_TEMPLATE_PASSES: usize = 25;

/// Strip wiki markup from `text`, returning plain prose. Total function:
/// always yields a (possibly empty) string, whatever the input looks like.
pub fn clean(text: &str) -> String {
    let text = strip_templates(text);
    // Refs go before generic tag stripping, otherwise the <ref> markers are
    // consumed as plain tags and the citation text leaks into the output.
    let text = strip_refs(&text);
    let text = WIKILINK_RE.replace_all(&text, "$1");
    let text = EXT_LINK_RE.replace_all(&text, "");
    let text = HTML_TAG_RE.replace_all(&text, "");
    let text = QUOTE_MARKUP_RE.replace_all(&text, "");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Repeatedly remove innermost `{{...}}` blocks until nothing reduces.
pub fn strip_templates(text: &str) -> String {
    let mut text = text.to_string();
    for _ in 0..MAX_TEMPLATE_PASSES {
        let next = INNER_TEMPLATE_RE.replace_all(&text, "").into_owned();
        if next == text {
            break;
        }
        text = next;
    }
    text
}

/// Remove `<ref .../>` and `<ref>...</ref>` blocks.
pub fn strip_refs(text: &str) -> String {
    let text = REF_SELF_RE.replace_all(text, "");
    REF_BLOCK_RE.replace_all(&text, "").into_owned()
}

/// First meaningful paragraph of a page, cleaned and capped at `max_len`
/// characters. Skips headers, table/template lines, and short fragments.
pub fn first_paragraph(content: &str, max_len: usize) -> String {
    let stripped = strip_refs(&strip_templates(content));
    for line in stripped.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("==")
            || line.starts_with('|')
            || line.starts_with('{')
            || line.starts_with('!')
        {
            continue;
        }
        let text = clean(line);
        if text.chars().count() > 50 {
            return truncate_chars(&text, max_len);
        }
    }
    String::new()
}

/// Cap a string at `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean("The 3 Series is a compact executive car."),
                   "The 3 Series is a compact executive car.");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(clean("a  b\n\tc"), "a b c");
    }

    #[test]
    fn strips_nested_templates() {
        assert_eq!(clean("{{a{{b}}c}}"), "");
        assert_eq!(clean("before {{convert|100|km/h}} after"), "before after");
    }

    #[test]
    fn unbalanced_templates_terminate() {
        // No fixpoint reachable: loop must stop, not hang.
        let out = clean("{{a {{b {{c");
        assert!(out.contains("a"));
    }

    #[test]
    fn keeps_link_display_text() {
        assert_eq!(clean("[[BMW M3|the M3]] and [[BMW M5]]"), "the M3 and BMW M5");
    }

    #[test]
    fn drops_external_links() {
        assert_eq!(clean("see [https://example.com press release] here"), "see here");
    }

    #[test]
    fn strips_bold_and_italic() {
        assert_eq!(clean("'''Bold''' and ''italic''"), "Bold and italic");
    }

    #[test]
    fn references_never_leak() {
        let text = "fast.<ref name=\"a\">Citation about something else</ref> Indeed.<ref name=b />";
        let out = clean(text);
        assert_eq!(out, "fast. Indeed.");
        assert!(!out.contains("Citation"));
    }

    #[test]
    fn strips_html_tags() {
        assert_eq!(clean("a<br/>b <span class=\"x\">c</span>"), "ab c");
    }

    #[test]
    fn first_paragraph_skips_headers_and_short_lines() {
        let content = "== History ==\nShort line.\nThe '''Alpha''' is a mid-size sedan \
                       produced since 1990 by the Example Motor Company of Japan.\nMore text.";
        let p = first_paragraph(content, 500);
        assert!(p.starts_with("The Alpha is a mid-size sedan"));
    }

    #[test]
    fn first_paragraph_respects_cap() {
        let long = format!("{} end", "word ".repeat(200));
        assert_eq!(first_paragraph(&long, 100).chars().count(), 100);
    }
}
