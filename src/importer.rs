//! The sequential import batch: fetch one page, parse it, upsert it, move
//! on. A failed page becomes a skip; the batch itself never aborts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::api::{PageRef, WikiClient};
use crate::brands;
use crate::db::{self, Source, UpsertOutcome};
use crate::parser;

/// Politeness delay between content fetches against the source wiki.
const FETCH_DELAY: Duration = Duration::from_millis(200);
const PROGRESS_LOG_EVERY: usize = 50;

pub struct ImportCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl ImportCounts {
    fn new() -> Self {
        ImportCounts { created: 0, updated: 0, skipped: 0 }
    }

    pub fn print(&self) {
        println!(
            "Done! Created: {}, Updated: {}, Skipped: {}",
            self.created, self.updated, self.skipped
        );
    }
}

/// Run the fetch → parse → upsert loop over a harvested page list.
///
/// Pages are processed one at a time in harvester order with a fixed delay
/// between content fetches. Ctrl-C stops the loop between pages; each
/// page's writes are transactional, so interruption leaves no partial
/// record behind.
pub async fn import_pages(
    conn: &Connection,
    client: &WikiClient,
    source: Source,
    pages: Vec<PageRef>,
) -> Result<ImportCounts> {
    let cancelled = cancellation_flag();
    let total = pages.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut counts = ImportCounts::new();

    for (i, page) in pages.iter().enumerate() {
        if cancelled.load(Ordering::SeqCst) {
            warn!("interrupted, stopping after {} of {} pages", i, total);
            break;
        }
        pb.inc(1);

        if brands::is_skippable_title(&page.title) {
            counts.skipped += 1;
            continue;
        }

        let content = client.fetch_wikitext(&page.title).await;
        sleep(FETCH_DELAY).await;
        let Some(content) = content else {
            counts.skipped += 1;
            continue;
        };

        let record = parser::parse_page(source, page.page_id, &page.title, &content);
        match db::upsert_car(conn, &record)? {
            UpsertOutcome::Created => counts.created += 1,
            UpsertOutcome::Updated => counts.updated += 1,
            UpsertOutcome::Skipped => counts.skipped += 1,
        }

        if (i + 1) % PROGRESS_LOG_EVERY == 0 {
            info!(
                "processed {}/{} pages (created {}, updated {})",
                i + 1,
                total,
                counts.created,
                counts.updated
            );
        }
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn cancellation_flag() -> Arc<AtomicBool> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });
    cancelled
}
