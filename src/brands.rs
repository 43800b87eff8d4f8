//! Shared manufacturer reference data: the brand table consumed by title
//! resolution, the page skip predicate, and the Wikipedia category sweep.

pub struct Brand {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

/// Known manufacturers, most-specific names first where prefixes overlap.
/// Table order is the tie-break during title matching.
pub const BRANDS: &[Brand] = &[
    Brand { name: "BMW", aliases: &[] },
    Brand { name: "Toyota", aliases: &[] },
    Brand { name: "Honda", aliases: &[] },
    Brand { name: "Mercedes-Benz", aliases: &["Mercedes"] },
    Brand { name: "Audi", aliases: &[] },
    Brand { name: "Volkswagen", aliases: &["VW"] },
    Brand { name: "Ford", aliases: &[] },
    Brand { name: "Chevrolet", aliases: &["Chevy"] },
    Brand { name: "Porsche", aliases: &[] },
    Brand { name: "Ferrari", aliases: &[] },
    Brand { name: "Lamborghini", aliases: &[] },
    Brand { name: "Nissan", aliases: &["Datsun"] },
    Brand { name: "Mazda", aliases: &[] },
    Brand { name: "Subaru", aliases: &[] },
    Brand { name: "Lexus", aliases: &[] },
    Brand { name: "Acura", aliases: &[] },
    Brand { name: "Hyundai", aliases: &[] },
    Brand { name: "Kia", aliases: &[] },
    Brand { name: "Volvo", aliases: &[] },
    Brand { name: "Jaguar", aliases: &[] },
    Brand { name: "Land Rover", aliases: &[] },
    Brand { name: "Jeep", aliases: &[] },
    Brand { name: "Dodge", aliases: &[] },
    Brand { name: "Chrysler", aliases: &[] },
    Brand { name: "Cadillac", aliases: &[] },
    Brand { name: "Buick", aliases: &[] },
    Brand { name: "Tesla", aliases: &[] },
    Brand { name: "Alfa Romeo", aliases: &[] },
    Brand { name: "Maserati", aliases: &[] },
    Brand { name: "Aston Martin", aliases: &[] },
    Brand { name: "McLaren", aliases: &[] },
    Brand { name: "Bentley", aliases: &[] },
    Brand { name: "Rolls-Royce", aliases: &[] },
    Brand { name: "Mini", aliases: &[] },
    Brand { name: "Fiat", aliases: &[] },
    Brand { name: "Peugeot", aliases: &[] },
    Brand { name: "Renault", aliases: &[] },
    Brand { name: "Citroën", aliases: &["Citroen"] },
    Brand { name: "Skoda", aliases: &["Škoda"] },
    Brand { name: "Seat", aliases: &["SEAT"] },
    Brand { name: "Mitsubishi", aliases: &[] },
    Brand { name: "Suzuki", aliases: &[] },
    Brand { name: "Infiniti", aliases: &[] },
    Brand { name: "Genesis", aliases: &[] },
    Brand { name: "Lotus", aliases: &[] },
];

/// Title prefixes that mark index/meta pages rather than car articles.
const RESERVED_PREFIXES: &[&str] = &["List of", "User", "Template", "Category", "Timeline of"];

/// Match a known brand at the start of `title` (case-insensitive, word
/// boundary required). Returns the canonical brand name and the remainder.
pub fn match_brand(title: &str) -> Option<(&'static str, &str)> {
    for brand in BRANDS {
        for candidate in std::iter::once(&brand.name).chain(brand.aliases) {
            if let Some(rest) = strip_prefix_ci(title, candidate) {
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    return Some((brand.name, rest.trim_start()));
                }
            }
        }
    }
    None
}

fn strip_prefix_ci<'t>(title: &'t str, prefix: &str) -> Option<&'t str> {
    let (head, rest) = title.split_at_checked(prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then_some(rest)
}

/// Pages the harvester should never feed into the pipeline: namespaced
/// titles, index pages, and brand-only stubs (articles about the company).
pub fn is_skippable_title(title: &str) -> bool {
    title.contains(':')
        || RESERVED_PREFIXES.iter().any(|p| title.starts_with(p))
        || is_brand_stub(title)
}

fn is_brand_stub(title: &str) -> bool {
    BRANDS.iter().any(|b| {
        std::iter::once(&b.name)
            .chain(b.aliases)
            .any(|n| title.eq_ignore_ascii_case(n))
    })
}

/// The Wikipedia category sweep list, one category per known brand.
pub fn wikipedia_categories() -> impl Iterator<Item = String> {
    BRANDS.iter().map(|b| format!("{} vehicles", b.name))
}

// ── Tests ──
