//! Generation-era segmentation and per-generation spec extraction.
//!
//! Pages with generation section headers split into one record per era;
//! everything else collapses into a single synthetic generation backed by
//! the infobox production years.

use std::sync::LazyLock;

use regex::Regex;

use super::cleaner;
use super::infobox::Infobox;
use crate::db::GenerationRecord;

static SECTION_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*==+\s*([^=\n][^\n]*?)\s*==+\s*$").unwrap());
static YEAR_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*[–—-]\s*(\d{4}|[Pp]resent)").unwrap());

struct SpecRule {
    re: Regex,
    apply: fn(&mut GenerationRecord, String),
}

// One row per spec field; each is an independent first-match over the
// cleaned section body, so a miss on one never blocks the others.
static SPEC_RULES: LazyLock<Vec<SpecRule>> = LazyLock::new(|| {
    vec![
        SpecRule {
            re: Regex::new(
                r"(?i)\b(\d+(?:\.\d+)?\s*(?:L|litre|liter)\b[^.\n,;]{0,50}?engine|[vwi](?:4|6|8|10|12|16)\b[^.\n,;]{0,40}?engine)",
            )
            .unwrap(),
            apply: |g, v| g.engine = v,
        },
        SpecRule {
            re: Regex::new(
                r"(?i)\b(\d{2,4}\s*(?:hp|bhp|ps|kw)\b(?:\s*\(\d{2,4}\s*(?:hp|bhp|ps|kw)\))?)",
            )
            .unwrap(),
            apply: |g, v| g.horsepower = v,
        },
        SpecRule {
            re: Regex::new(
                r"(?i)\b(\d{2,4}\s*(?:n[·⋅]?m|lb[·⋅-]?\s?ft)\b(?:\s*\(\d{2,4}\s*(?:n[·⋅]?m|lb[·⋅-]?\s?ft)\))?)",
            )
            .unwrap(),
            apply: |g, v| g.torque = v,
        },
        SpecRule {
            re: Regex::new(
                r"(?i)top speed(?:\s+of)?[^0-9\n]{0,20}(\d+(?:\.\d+)?\s*(?:km/h|mph)(?:\s*\(\d+(?:\.\d+)?\s*(?:mph|km/h)\))?)",
            )
            .unwrap(),
            apply: |g, v| g.top_speed = v,
        },
        SpecRule {
            re: Regex::new(
                r"(?i)\b(0\s*[–-]\s*(?:60|100)\s*(?:mph|km/h)?[^0-9\n]{0,30}?\d+(?:\.\d+)?\s*s(?:ec(?:onds)?)?)\b",
            )
            .unwrap(),
            apply: |g, v| g.acceleration = v,
        },
        SpecRule {
            re: Regex::new(
                r"(?i)\b(\d+-speed\s+[\w-]+(?:\s+(?:transmission|gearbox))?|(?:manual|automatic)\s+(?:transmission|gearbox))\b",
            )
            .unwrap(),
            apply: |g, v| g.transmission = v,
        },
    ]
});

/// Split page content into generation records, one per era section, or a
/// single synthetic record when no generation headers exist. Never empty
/// for non-empty input.
pub fn segment(content: &str, infobox: &Infobox) -> Vec<GenerationRecord> {
    let sections = split_generation_sections(content);
    if sections.is_empty() {
        return vec![synthesize(content, infobox)];
    }
    sections
        .into_iter()
        .map(|(title, body)| parse_generation(&title, &body))
        .collect()
}

/// (header title, section body) pairs for generation-indicating headers, in
/// document order. A section body runs to the next generation header, so
/// sub-sections stay with their era.
fn split_generation_sections(content: &str) -> Vec<(String, String)> {
    let marks: Vec<(usize, usize, String)> = SECTION_HEADER_RE
        .captures_iter(content)
        .filter(|c| is_generation_header(&c[1]))
        .map(|c| {
            let m = c.get(0).unwrap();
            (m.start(), m.end(), c[1].to_string())
        })
        .collect();

    marks
        .iter()
        .enumerate()
        .map(|(i, (_, body_start, title))| {
            let body_end = marks.get(i + 1).map(|m| m.0).unwrap_or(content.len());
            (title.clone(), content[*body_start..body_end].to_string())
        })
        .collect()
}

fn is_generation_header(title: &str) -> bool {
    let lower = title.to_lowercase();
    lower.contains("generation") || lower.contains("gen.") || YEAR_RANGE_RE.is_match(title)
}

/// Parse one generation section: name from the header, years from a
/// `YYYY-YYYY` / `YYYY-present` range in it, specs from the body. Every
/// field is optional; `code` is a manual-entry slot and stays empty.
fn parse_generation(title: &str, body: &str) -> GenerationRecord {
    let (year_start, year_end) = parse_year_range(title);
    let mut generation = GenerationRecord {
        name: cleaner::truncate_chars(&cleaner::clean(title), 100),
        year_start,
        year_end,
        ..Default::default()
    };
    extract_specs(&mut generation, body);
    generation
}

fn synthesize(content: &str, infobox: &Infobox) -> GenerationRecord {
    let (range_start, range_end) = parse_year_range(&infobox.production_years);
    let mut generation = GenerationRecord {
        name: cleaner::truncate_chars(&infobox.production_years, 100),
        year_start: range_start.or(infobox.year),
        year_end: range_end,
        ..Default::default()
    };
    extract_specs(&mut generation, content);
    generation
}

fn extract_specs(generation: &mut GenerationRecord, body: &str) {
    let prose = cleaner::clean(body);
    for rule in SPEC_RULES.iter() {
        if let Some(caps) = rule.re.captures(&prose) {
            let value = cleaner::truncate_chars(caps[1].trim(), 100);
            (rule.apply)(generation, value);
        }
    }
}

/// `(start, end)` from the first `YYYY-YYYY` or `YYYY-present` range;
/// "present" leaves the end open.
fn parse_year_range(text: &str) -> (Option<i32>, Option<i32>) {
    match YEAR_RANGE_RE.captures(text) {
        Some(caps) => {
            let start = caps[1].parse().ok();
            let end = caps[2].parse().ok();
            (start, end)
        }
        None => (None, None),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_generation_headers_in_order() {
        let content = "\
Intro prose about the model.

== First Generation (1990-1998) ==
It used a 2.0 L inline-four engine producing 150 hp (112 kW).

== Second Generation (1999-2005) ==
Power rose to 200 hp with a 6-speed manual transmission.";
        let gens = segment(content, &Infobox::default());
        assert_eq!(gens.len(), 2);
        assert_eq!(gens[0].name, "First Generation (1990-1998)");
        assert_eq!((gens[0].year_start, gens[0].year_end), (Some(1990), Some(1998)));
        assert_eq!((gens[1].year_start, gens[1].year_end), (Some(1999), Some(2005)));
        assert_eq!(gens[0].horsepower, "150 hp (112 kW)");
        assert_eq!(gens[1].transmission, "6-speed manual transmission");
    }

    #[test]
    fn present_leaves_end_year_open() {
        let content = "== Third generation (2018-present) ==\nStill in production.";
        let gens = segment(content, &Infobox::default());
        assert_eq!(gens[0].year_start, Some(2018));
        assert_eq!(gens[0].year_end, None);
    }

    #[test]
    fn non_generation_headers_do_not_split() {
        let content = "== History ==\nprose\n== Motorsport ==\nmore prose";
        let gens = segment(content, &Infobox::default());
        assert_eq!(gens.len(), 1);
    }

    #[test]
    fn fallback_backfills_year_from_infobox() {
        let infobox = Infobox {
            production_years: "1964–1973".to_string(),
            year: Some(1964),
            ..Default::default()
        };
        let gens = segment("No era sections here, just prose.", &infobox);
        assert_eq!(gens.len(), 1);
        assert_eq!(gens[0].year_start, Some(1964));
        assert_eq!(gens[0].year_end, Some(1973));
    }

    #[test]
    fn spec_fields_are_independent() {
        let content = "== Mk1 (1990-1995) ==\n\
            The 3.2 L V6 engine made 250 Nm of torque. Top speed was 240 km/h (149 mph) \
            and 0-100 km/h took 6.5 s.";
        let gens = segment(content, &Infobox::default());
        let g = &gens[0];
        assert_eq!(g.engine, "3.2 L V6 engine");
        assert_eq!(g.torque, "250 Nm");
        assert_eq!(g.top_speed, "240 km/h (149 mph)");
        assert_eq!(g.acceleration, "0-100 km/h took 6.5 s");
        assert!(g.horsepower.is_empty());
        assert!(g.code.is_empty());
    }

    #[test]
    fn subsections_stay_with_their_era() {
        let content = "\
== First generation (1980-1985) ==
Era prose with 90 hp.
=== Engines ===
A 1.6 L diesel engine option.
== Second generation (1986-1990) ==
Later prose.";
        let gens = segment(content, &Infobox::default());
        assert_eq!(gens.len(), 2);
        assert_eq!(gens[0].engine, "1.6 L diesel engine");
    }
}
