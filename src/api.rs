//! MediaWiki JSON API client: paginated page listings and wikitext fetches.
//!
//! Transport failures never abort a batch. A listing call logs and returns
//! whatever it accumulated; a content fetch logs and yields `None` so the
//! caller can skip that one page.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

/// MediaWiki caps both `aplimit` and `cmlimit` at 500 for anonymous clients.
const PAGE_BATCH: usize = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str =
    "carpedia/0.1 (car encyclopedia importer; contact@carpedia.local)";

/// One listing entry: the wiki's stable page id plus the title.
#[derive(Debug, Clone, Deserialize)]
pub struct PageRef {
    #[serde(rename = "pageid")]
    pub page_id: i64,
    pub title: String,
}

#[derive(Deserialize)]
struct ListResponse {
    query: Option<QueryBody>,
    #[serde(rename = "continue")]
    cont: Option<Continuation>,
}

#[derive(Deserialize)]
struct QueryBody {
    #[serde(default)]
    allpages: Vec<PageRef>,
    #[serde(default)]
    categorymembers: Vec<PageRef>,
}

#[derive(Deserialize)]
struct Continuation {
    apcontinue: Option<String>,
    cmcontinue: Option<String>,
}

#[derive(Deserialize)]
struct ParseResponse {
    parse: Option<ParseBody>,
}

#[derive(Deserialize)]
struct ParseBody {
    wikitext: Option<WikitextBody>,
}

#[derive(Deserialize)]
struct WikitextBody {
    #[serde(rename = "*")]
    text: String,
}

pub struct WikiClient {
    http: reqwest::Client,
    base_url: String,
}

impl WikiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    /// Walk `list=allpages` to completion (or to `limit`; 0 = unlimited).
    pub async fn list_all_pages(&self, limit: usize) -> Vec<PageRef> {
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("action", "query".to_string()),
                ("list", "allpages".to_string()),
                ("aplimit", PAGE_BATCH.to_string()),
                ("format", "json".to_string()),
            ];
            if let Some(c) = &cursor {
                params.push(("apcontinue", c.clone()));
            }

            let resp: ListResponse = match self.get_json(&params).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("page listing failed, keeping {} titles: {e:#}", pages.len());
                    break;
                }
            };

            let batch = resp.query.map(|q| q.allpages).unwrap_or_default();
            if push_batch(&mut pages, batch, limit) {
                break;
            }
            info!("fetched {} page titles...", pages.len());

            match resp.cont.and_then(|c| c.apcontinue) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        pages
    }

    /// Walk `list=categorymembers` for one category (or to `limit`).
    pub async fn list_category_members(&self, category: &str, limit: usize) -> Vec<PageRef> {
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("action", "query".to_string()),
                ("list", "categorymembers".to_string()),
                ("cmtitle", format!("Category:{}", category)),
                ("cmlimit", PAGE_BATCH.to_string()),
                ("cmtype", "page".to_string()),
                ("format", "json".to_string()),
            ];
            if let Some(c) = &cursor {
                params.push(("cmcontinue", c.clone()));
            }

            let resp: ListResponse = match self.get_json(&params).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        "category {:?} listing failed, keeping {} titles: {e:#}",
                        category,
                        pages.len()
                    );
                    break;
                }
            };

            let batch = resp.query.map(|q| q.categorymembers).unwrap_or_default();
            if push_batch(&mut pages, batch, limit) {
                break;
            }

            match resp.cont.and_then(|c| c.cmcontinue) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        pages
    }

    /// Raw wikitext of one page via `action=parse`. `None` covers both
    /// transport failures and pages without renderable content.
    pub async fn fetch_wikitext(&self, title: &str) -> Option<String> {
        let params = vec![
            ("action", "parse".to_string()),
            ("page", title.to_string()),
            ("prop", "wikitext".to_string()),
            ("format", "json".to_string()),
        ];
        match self.get_json::<ParseResponse>(&params).await {
            Ok(resp) => resp
                .parse
                .and_then(|p| p.wikitext)
                .map(|w| w.text)
                .filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!("content fetch failed for {title:?}: {e:#}");
                None
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<T> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

/// Append a listing batch to the accumulator. Returns true when `limit` is
/// reached, truncating the result to exactly that many entries.
pub fn push_batch(pages: &mut Vec<PageRef>, batch: Vec<PageRef>, limit: usize) -> bool {
    pages.extend(batch);
    if limit > 0 && pages.len() >= limit {
        pages.truncate(limit);
        return true;
    }
    false
}

/// Drop repeated page ids, keeping first occurrences in order. Needed when
/// aggregating category queries: a page can belong to several categories.
pub fn dedupe_pages(pages: Vec<PageRef>) -> Vec<PageRef> {
    let mut seen = HashSet::new();
    pages
        .into_iter()
        .filter(|p| seen.insert(p.page_id))
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(start: i64, len: usize) -> Vec<PageRef> {
        (0..len as i64)
            .map(|i| PageRef {
                page_id: start + i,
                title: format!("Page {}", start + i),
            })
            .collect()
    }

    #[test]
    fn accumulates_full_batches_without_limit() {
        let mut pages = Vec::new();
        assert!(!push_batch(&mut pages, batch(0, 500), 0));
        assert!(!push_batch(&mut pages, batch(500, 500), 0));
        assert!(!push_batch(&mut pages, batch(1000, 200), 0));
        assert_eq!(pages.len(), 1200);
        assert_eq!(dedupe_pages(pages).len(), 1200);
    }

    #[test]
    fn limit_truncates_to_exact_count() {
        let mut pages = Vec::new();
        assert!(!push_batch(&mut pages, batch(0, 500), 700));
        assert!(push_batch(&mut pages, batch(500, 500), 700));
        assert_eq!(pages.len(), 700);
        assert_eq!(pages.last().unwrap().page_id, 699);
    }

    #[test]
    fn dedupe_keeps_first_occurrence_in_order() {
        let mut pages = batch(0, 3);
        pages.extend(batch(1, 3)); // ids 1,2 repeat; 3 is new
        let unique = dedupe_pages(pages);
        let ids: Vec<i64> = unique.iter().map(|p| p.page_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn listing_envelope_deserializes() {
        let json = r#"{
            "query": { "allpages": [ { "pageid": 7, "title": "BMW M3" } ] },
            "continue": { "apcontinue": "BMW_M5", "continue": "-||" }
        }"#;
        let resp: ListResponse = serde_json::from_str(json).unwrap();
        let pages = resp.query.unwrap().allpages;
        assert_eq!(pages[0].page_id, 7);
        assert_eq!(pages[0].title, "BMW M3");
        assert_eq!(resp.cont.unwrap().apcontinue.as_deref(), Some("BMW_M5"));
    }

    #[test]
    fn wikitext_envelope_unwraps_star_field() {
        let json = r#"{ "parse": { "title": "BMW M3", "wikitext": { "*": "'''wikitext'''" } } }"#;
        let resp: ParseResponse = serde_json::from_str(json).unwrap();
        let text = resp.parse.and_then(|p| p.wikitext).map(|w| w.text);
        assert_eq!(text.as_deref(), Some("'''wikitext'''"));
    }

    #[test]
    fn missing_continuation_means_done() {
        let json = r#"{ "query": { "allpages": [] } }"#;
        let resp: ListResponse = serde_json::from_str(json).unwrap();
        assert!(resp.cont.is_none());
    }
}
