//! Infobox extraction: locates the summary template in a page and pulls
//! typed fields out of its `| field = value` rows.

use std::sync::LazyLock;

use regex::Regex;

use super::cleaner;

// Wikipedia's automobile infobox: body runs to the closing "\n}}".
static AUTOMOBILE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)\{\{infobox\s+automobile[^}]*?\n(.*?)\n\}\}").unwrap());
// The looser wiki form ("Infobox" or "Models"): everything up to the first "}}".
static GENERIC_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(?:[Ii]nfobox|[Mm]odels)[^}|]*\|([^}]+)\}\}").unwrap());

static HP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{2,4})\s*(hp|bhp|ps|kw)\b").unwrap());
static FIRST_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{1,9}").unwrap());
static YEAR4_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

const KW_TO_HP: f64 = 1.341;
/// Values at or past this are misparses (VIN digits, torque figures).
const MAX_SANE_HP: i32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// `{{Infobox automobile ...}}`, one `| field = value` row per line.
    Automobile,
    /// `{{Infobox ...}}` / `{{Models ...}}` with `|`-separated fields.
    Generic,
}

#[derive(Debug, Default)]
pub struct Infobox {
    pub name: String,
    pub brand: String,
    pub engine: String,
    pub transmission: String,
    pub fuel_type: String,
    pub body_style: String,
    pub car_class: String,
    pub production_years: String,
    pub year: Option<i32>,
    pub horsepower: Option<i32>,
    pub top_speed: Option<i32>,
}

// ── Field rules ──
//
// One row per recognized field: the infobox keys it answers to and the
// handler that cleans, caps, and coerces the raw value. New fields are new
// rows, not new branches.

struct FieldRule {
    keys: &'static [&'static str],
    apply: fn(&mut Infobox, &str),
}

const FIELD_RULES: &[FieldRule] = &[
    FieldRule { keys: &["name"], apply: set_name },
    FieldRule { keys: &["manufacturer", "brand", "make"], apply: set_brand },
    FieldRule { keys: &["engine"], apply: set_engine },
    FieldRule { keys: &["power", "horsepower", "hp"], apply: set_power },
    FieldRule { keys: &["transmission", "gearbox"], apply: set_transmission },
    FieldRule { keys: &["fuel_type", "fuel type", "fuel"], apply: set_fuel_type },
    FieldRule { keys: &["body_style", "body style", "body"], apply: set_body_style },
    FieldRule { keys: &["class", "category"], apply: set_class },
    FieldRule { keys: &["production"], apply: set_production },
    FieldRule { keys: &["model_years", "model years"], apply: set_model_years },
    FieldRule { keys: &["top_speed", "top speed", "max_speed", "max speed"], apply: set_top_speed },
    FieldRule { keys: &["year"], apply: set_year },
];

/// Locate the first matching infobox in `content` and extract its fields.
/// No matching template yields an empty `Infobox`, not an error.
pub fn extract(content: &str, flavor: Flavor) -> Infobox {
    let body = match flavor {
        Flavor::Automobile => AUTOMOBILE_BLOCK_RE
            .captures(content)
            .map(|c| c[1].to_string()),
        Flavor::Generic => GENERIC_BLOCK_RE.captures(content).map(|c| c[1].to_string()),
    };

    let mut infobox = Infobox::default();
    let Some(body) = body else { return infobox };

    for (key, value) in parse_fields(&body, flavor) {
        if let Some(rule) = FIELD_RULES.iter().find(|r| r.keys.contains(&key.as_str())) {
            (rule.apply)(&mut infobox, &value);
        }
    }
    infobox
}

/// Split an infobox body into (lowercased key, raw value) pairs in document
/// order. The automobile flavor is row-per-line with continuation lines;
/// the generic flavor terminates values at the next `|` or newline.
fn parse_fields(body: &str, flavor: Flavor) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();

    match flavor {
        Flavor::Automobile => {
            for raw_line in body.lines() {
                let line = raw_line.trim();
                if let Some(rest) = line.strip_prefix('|') {
                    if let Some((key, value)) = rest.split_once('=') {
                        fields.push((normalize_key(key), value.trim().to_string()));
                        continue;
                    }
                }
                // Continuation of a multi-line value.
                if let Some((_, value)) = fields.last_mut() {
                    if !line.is_empty() && !line.starts_with("}}") {
                        value.push(' ');
                        value.push_str(line);
                    }
                }
            }
        }
        Flavor::Generic => {
            for segment in body.split('|') {
                if let Some((key, value)) = segment.split_once('=') {
                    let value = value.lines().next().unwrap_or("").trim();
                    fields.push((normalize_key(key), value.to_string()));
                }
            }
        }
    }
    fields
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

// ── Handlers ──
//
// First occurrence of a field wins; later duplicates never overwrite.

fn set_name(ib: &mut Infobox, raw: &str) {
    set_text(&mut ib.name, raw, 200);
}

fn set_brand(ib: &mut Infobox, raw: &str) {
    set_text(&mut ib.brand, raw, 100);
}

fn set_engine(ib: &mut Infobox, raw: &str) {
    set_text(&mut ib.engine, raw, 200);
    // Power figures usually ride along in the engine row.
    if ib.horsepower.is_none() {
        ib.horsepower = extract_horsepower(raw);
    }
}

fn set_power(ib: &mut Infobox, raw: &str) {
    if ib.horsepower.is_none() {
        ib.horsepower = extract_horsepower(raw)
            .or_else(|| first_int(raw).filter(|v| *v < MAX_SANE_HP));
    }
}

fn set_transmission(ib: &mut Infobox, raw: &str) {
    set_text(&mut ib.transmission, raw, 200);
}

fn set_fuel_type(ib: &mut Infobox, raw: &str) {
    set_text(&mut ib.fuel_type, raw, 100);
}

fn set_body_style(ib: &mut Infobox, raw: &str) {
    set_text(&mut ib.body_style, raw, 100);
}

fn set_class(ib: &mut Infobox, raw: &str) {
    set_text(&mut ib.car_class, raw, 100);
}

fn set_production(ib: &mut Infobox, raw: &str) {
    set_text(&mut ib.production_years, raw, 50);
    if ib.year.is_none() {
        ib.year = first_year(raw);
    }
}

fn set_model_years(ib: &mut Infobox, raw: &str) {
    if ib.production_years.is_empty() {
        set_text(&mut ib.production_years, raw, 50);
    }
    if ib.year.is_none() {
        ib.year = first_year(raw);
    }
}

fn set_top_speed(ib: &mut Infobox, raw: &str) {
    if ib.top_speed.is_none() {
        ib.top_speed = first_int(raw);
    }
}

fn set_year(ib: &mut Infobox, raw: &str) {
    if ib.year.is_none() {
        ib.year = first_year(raw);
    }
}

fn set_text(slot: &mut String, raw: &str, max_len: usize) {
    if slot.is_empty() {
        let value = cleaner::truncate_chars(&cleaner::clean(raw), max_len);
        *slot = value;
    }
}

/// First power figure in `raw`, unit-aware: kW converts at ×1.341, and
/// anything at or past the sanity bound is dropped as a misparse.
pub fn extract_horsepower(raw: &str) -> Option<i32> {
    let caps = HP_RE.captures(raw)?;
    let value: i32 = caps[1].parse().ok()?;
    let hp = if caps[2].eq_ignore_ascii_case("kw") {
        (value as f64 * KW_TO_HP).round() as i32
    } else {
        value
    };
    (hp < MAX_SANE_HP).then_some(hp)
}

fn first_int(raw: &str) -> Option<i32> {
    FIRST_INT_RE.find(raw)?.as_str().parse().ok()
}

/// First four-digit figure in `raw` (production start, model year).
pub fn first_year(raw: &str) -> Option<i32> {
    YEAR4_RE.captures(raw)?[1].parse().ok()
}

// ── Tests ──
