//! Incremental and full fetches against the Notion API.
//!
//! The incremental path fetches every searchable page edited on or after the
//! day of the last sync. The full path ignores edit time and feeds mirror
//! exports. Any failure ends the pagination loop early and the pages gathered
//! so far are returned; nothing is retried here.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use tagcache_core::cache::unix_now;
use tagcache_core::{Page, Snapshot};

use crate::notion::{NotionError, QueryRequest, QueryTransport};

/// Knobs for one sync run.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Lookback used when the stored timestamp is unusable.
    pub window: Duration,
    pub page_size: u32,
}

/// Pages fetched by one sync, and why it stopped early if it did.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub pages: Vec<Page>,
    pub requests: usize,
    pub interrupted: Option<NotionError>,
}

/// Calendar day (local time) from which to ask for changes.
///
/// A non-positive `since` falls back to `now - window`.
pub fn cutoff_date(since: f64, window: Duration, now: f64) -> NaiveDate {
    let since = if since <= 0.0 { now - window.as_secs_f64() } else { since };
    DateTime::from_timestamp(since.floor() as i64, 0)
        .map(|utc| utc.with_timezone(&Local).date_naive())
        .unwrap_or_else(|| Local::now().date_naive())
}

/// Pages of `database_id` changed since `since`; partial on failure.
pub async fn fetch_changed_since<T>(transport: &T, database_id: &str, since: f64, options: SyncOptions) -> Vec<Page>
where
    T: QueryTransport + ?Sized,
{
    sync_pages(transport, database_id, since, options).await.pages
}

/// Like [`fetch_changed_since`], also reporting how the loop ended.
pub async fn sync_pages<T>(transport: &T, database_id: &str, since: f64, options: SyncOptions) -> SyncOutcome
where
    T: QueryTransport + ?Sized,
{
    let cutoff = cutoff_date(since, options.window, unix_now());
    let outcome = paginate(transport, database_id, QueryRequest::changed_since(cutoff, options.page_size)).await;

    tracing::info!(
        database_id,
        %cutoff,
        pages = outcome.pages.len(),
        requests = outcome.requests,
        "found updated pages"
    );
    outcome
}

/// Every searchable page of `database_id`, with no edit-time cutoff.
///
/// Same early-stop rules as [`sync_pages`].
pub async fn fetch_all<T>(transport: &T, database_id: &str, page_size: u32) -> SyncOutcome
where
    T: QueryTransport + ?Sized,
{
    let outcome = paginate(transport, database_id, QueryRequest::all_searchable(page_size)).await;
    tracing::info!(database_id, pages = outcome.pages.len(), requests = outcome.requests, "fetched all pages");
    outcome
}

/// A publishable snapshot of the whole collection, stamped now.
///
/// Fails instead of returning a partial snapshot, since mirror consumers
/// replace their copy wholesale.
pub async fn build_snapshot<T>(transport: &T, database_id: &str, page_size: u32) -> Result<Snapshot, NotionError>
where
    T: QueryTransport + ?Sized,
{
    let outcome = fetch_all(transport, database_id, page_size).await;
    match outcome.interrupted {
        Some(e) => Err(e),
        None => Ok(Snapshot::with_pages(outcome.pages)),
    }
}

/// Follow cursors from `first` until the server is done or a request fails.
async fn paginate<T>(transport: &T, database_id: &str, first: QueryRequest) -> SyncOutcome
where
    T: QueryTransport + ?Sized,
{
    let mut outcome = SyncOutcome::default();
    let mut request = first;

    loop {
        outcome.requests += 1;

        let response = match transport.query(database_id, &request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(database_id, error = %e, kept = outcome.pages.len(), "pagination interrupted");
                outcome.interrupted = Some(e);
                break;
            }
        };

        let next = response.continuation().map(str::to_string);
        if response.has_more && next.is_none() {
            tracing::warn!(database_id, "has_more without next_cursor; stopping");
        }
        outcome.pages.extend(response.results);

        match next {
            Some(next) => request = request.with_cursor(Some(next)),
            None => break,
        }
    }

    outcome
}
