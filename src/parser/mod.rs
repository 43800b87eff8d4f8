pub mod cleaner;
pub mod generations;
pub mod infobox;
pub mod title;

use std::sync::LazyLock;

use regex::Regex;

use crate::db::{CarRecord, Source};
use infobox::Flavor;

static ACCEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)0[–-](?:60|100)[^0-9]*(\d+\.?\d*)\s*s").unwrap());

const DESCRIPTION_MAX: usize = 500;

/// Turn one harvested page into a car record: title split, infobox fields,
/// lead-paragraph description, and (for the Wikipedia flavor) the
/// generation breakdown. Missing pieces stay empty; validity is judged at
/// the persistence boundary.
pub fn parse_page(source: Source, page_id: i64, page_title: &str, wikitext: &str) -> CarRecord {
    let flavor = match source {
        Source::Wikipedia => Flavor::Automobile,
        _ => Flavor::Generic,
    };
    let ib = infobox::extract(wikitext, flavor);
    let resolved = title::resolve(page_title);

    let generations = match source {
        Source::Wikipedia => generations::segment(wikitext, &ib),
        _ => Vec::new(),
    };

    CarRecord {
        brand: non_empty_or(ib.brand, resolved.brand),
        name: non_empty_or(ib.name, resolved.name),
        year: ib.year.or(resolved.year),
        description: cleaner::first_paragraph(wikitext, DESCRIPTION_MAX),
        engine: ib.engine,
        horsepower: ib.horsepower,
        top_speed: ib.top_speed,
        acceleration: parse_acceleration(wikitext),
        transmission: ib.transmission,
        fuel_type: ib.fuel_type,
        body_style: ib.body_style,
        car_class: ib.car_class,
        // Generation codes are curated by hand, not parsed.
        generation_code: String::new(),
        generation_years: ib.production_years,
        image_url: String::new(),
        source,
        page_id,
        generations,
    }
}

/// First 0-60 / 0-100 time in the page prose, in seconds.
fn parse_acceleration(content: &str) -> Option<f64> {
    ACCEL_RE.captures(content)?[1].parse().ok()
}

fn non_empty_or(primary: String, fallback: String) -> String {
    if primary.is_empty() {
        fallback
    } else {
        primary
    }
}

// ── Tests ──
