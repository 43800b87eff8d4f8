mod api;
mod brands;
mod db;
mod importer;
mod media;
mod parser;

use std::time::Instant;

use clap::{Parser, Subcommand};

use db::Source;

const AUTOPEDIA_API: &str = "https://autopedia.fandom.com/api.php";
const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";

#[derive(Parser)]
#[command(name = "carpedia", about = "Car specification catalog fed from wiki sources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import cars from the Autopedia wiki (full page list)
    Autopedia {
        /// Max pages to import (0 = all)
        #[arg(short = 'n', long, default_value = "0")]
        limit: usize,
        /// Delete previously imported autopedia rows first
        #[arg(long)]
        clear: bool,
    },
    /// Import cars from Wikipedia manufacturer categories
    Wikipedia {
        /// Max pages to import (0 = all)
        #[arg(short = 'n', long, default_value = "0")]
        limit: usize,
        /// Delete previously imported wikipedia rows first
        #[arg(long)]
        clear: bool,
        /// Import a single category only (e.g. "BMW vehicles")
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Catalog statistics
    Stats,
    /// Compact car table
    List {
        /// Filter by brand
        #[arg(short, long)]
        brand: Option<String>,
        /// Filter by data source (manual, wikipedia, autopedia)
        #[arg(short, long)]
        source: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Autopedia { limit, clear } => run_autopedia(limit, clear).await,
        Commands::Wikipedia { limit, clear, category } => {
            run_wikipedia(limit, clear, category).await
        }
        Commands::Stats => run_stats(),
        Commands::List { brand, source, limit } => run_list(brand, source, limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_autopedia(limit: usize, clear: bool) -> anyhow::Result<()> {
    let conn = db::connect()?;
    db::init_schema(&conn)?;

    if clear {
        let n = db::clear_source(&conn, Source::Autopedia)?;
        println!("Cleared {} autopedia cars", n);
    }

    let client = api::WikiClient::new(AUTOPEDIA_API)?;
    println!("Fetching pages from the Autopedia wiki...");
    let pages = client.list_all_pages(limit).await;
    if pages.is_empty() {
        println!("No pages returned.");
        return Ok(());
    }
    println!("Found {} pages to process", pages.len());

    let counts = importer::import_pages(&conn, &client, Source::Autopedia, pages).await?;
    counts.print();
    Ok(())
}

async fn run_wikipedia(limit: usize, clear: bool, category: Option<String>) -> anyhow::Result<()> {
    let conn = db::connect()?;
    db::init_schema(&conn)?;

    if clear {
        let n = db::clear_source(&conn, Source::Wikipedia)?;
        println!("Cleared {} wikipedia cars", n);
    }

    let client = api::WikiClient::new(WIKIPEDIA_API)?;
    let categories: Vec<String> = match category {
        Some(c) => vec![c],
        None => brands::wikipedia_categories().collect(),
    };

    println!("Fetching car pages from Wikipedia...");
    let mut all_pages = Vec::new();
    for category in &categories {
        println!("Fetching category: {}", category);
        let remaining = if limit > 0 { limit - all_pages.len() } else { 0 };
        let pages = client.list_category_members(category, remaining).await;
        all_pages.extend(pages);

        if limit > 0 && all_pages.len() >= limit {
            all_pages.truncate(limit);
            break;
        }
    }

    // A page can sit in several manufacturer categories.
    let unique = api::dedupe_pages(all_pages);
    if unique.is_empty() {
        println!("No pages returned.");
        return Ok(());
    }
    println!("Found {} unique pages to process", unique.len());

    let counts = importer::import_pages(&conn, &client, Source::Wikipedia, unique).await?;
    counts.print();
    Ok(())
}

fn run_stats() -> anyhow::Result<()> {
    let conn = db::connect()?;
    db::init_schema(&conn)?;
    let s = db::get_stats(&conn)?;
    println!("Cars:        {}", s.cars);
    println!("  wikipedia: {}", s.wikipedia);
    println!("  autopedia: {}", s.autopedia);
    println!("  manual:    {}", s.manual);
    println!("Generations: {}", s.generations);
    Ok(())
}

fn run_list(brand: Option<String>, source: Option<String>, limit: usize) -> anyhow::Result<()> {
    let source = match source.as_deref() {
        Some(s) => Some(Source::parse(s).ok_or_else(|| {
            anyhow::anyhow!("unknown source {:?} (expected manual, wikipedia, or autopedia)", s)
        })?),
        None => None,
    };

    let conn = db::connect()?;
    db::init_schema(&conn)?;
    let rows = db::list_cars(&conn, brand.as_deref(), source, limit)?;
    if rows.is_empty() {
        println!("No cars found.");
        return Ok(());
    }

    println!(
        "{:>4} | {:<16} | {:<28} | {:>4} | {:>4} | {:<9}",
        "#", "Brand", "Name", "Year", "HP", "Source"
    );
    println!("{}", "-".repeat(80));

    for r in &rows {
        let year = r.year.map(|y| y.to_string()).unwrap_or_else(|| "-".into());
        let hp = r.horsepower.map(|h| h.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:>4} | {:<16} | {:<28} | {:>4} | {:>4} | {:<9}",
            r.id,
            truncate(&r.brand, 16),
            truncate(&r.name, 28),
            year,
            hp,
            r.data_source,
        );
    }

    // Rows without a stored image fall back to the render service.
    println!("\n--- Images ---");
    for r in &rows {
        let url = if r.image_url.is_empty() {
            media::render_image_url(&r.brand, &r.name, r.year)
        } else {
            r.image_url.clone()
        };
        println!("  {}: {}", r.id, url);
    }

    println!("\n{} cars", rows.len());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
