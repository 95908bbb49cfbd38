//! Scroll-based enumeration of every document matching a query.
//!
//! The loop opens a cursor, hands each hit to a caller-supplied handler in
//! server order, advances the cursor page by page and always releases it on
//! the way out. Failures are collected into a [`MultiError`]; cancellation
//! bypasses the aggregate.

use serde_json::value::RawValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::errors::{ElasticError, MultiError};
use crate::interfaces::ScrollSource;
use crate::types::{ScrollPage, ScrollRequest};

/// A document presented to the enumeration handler.
#[derive(Debug, Clone, Copy)]
pub struct EnumeratedItem<'a> {
    /// Raw document source. `None` when the engine returned the hit without one.
    pub source: Option<&'a RawValue>,
    pub id: &'a str,
    pub index: &'a str,
    /// 1-based position across all pages.
    pub ordinal: u64,
    /// Total matching documents as reported by the engine.
    pub total: u64,
    /// Set on the final item of each page; callers use it to batch commits.
    pub last_in_page: bool,
}

/// Outcome of a completed enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumerationSummary {
    /// Items the handler accepted.
    pub delivered: u64,
    /// Non-empty pages fetched.
    pub pages: u64,
    /// Last total reported by the engine.
    pub total: u64,
}

/// A server-side cursor owned by a single enumeration pass.
///
/// Releasing consumes the cursor, so an id can never be used after it was
/// cleared.
#[derive(Debug, Default)]
pub struct ScrollCursor {
    id: Option<String>,
    position: u64,
    total: u64,
}

impl ScrollCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor id; `None` until the engine issued one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Items seen so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Latest total reported by the engine.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Record a fetched page. The engine may rotate the id between pages.
    pub fn advance(&mut self, page: &ScrollPage) {
        if let Some(id) = &page.cursor_id {
            self.id = Some(id.clone());
        }
        self.total = page.total;
    }

    fn next_ordinal(&mut self) -> u64 {
        self.position += 1;
        self.position
    }

    /// Release the cursor on the server. A cursor that was never opened is a no-op.
    pub async fn release<S>(self, source: &S) -> Result<(), ElasticError>
    where
        S: ScrollSource + ?Sized,
    {
        match self.id {
            Some(id) => source.clear_scroll(&id).await,
            None => Ok(()),
        }
    }
}

/// Enumerate every document matching `request`, page by page.
///
/// The handler sees each hit exactly once, in server order. Enumeration stops
/// at end of stream, on the first transport failure or on the first handler
/// failure; the cursor is released in every case and release failures are
/// appended to the same aggregate.
///
/// # Returns
///
/// * `Ok(EnumerationSummary)` - If no failure was collected
/// * `Err(ElasticError::Operation { operation: "open_scroll", .. })` - If the cursor could not be opened
/// * `Err(ElasticError::Cancelled)` - If `cancel` fired; checked once per page boundary
/// * `Err(ElasticError::Multiple(_))` - With every collected failure, in order
#[instrument(skip_all, fields(index = %request.index))]
pub async fn enumerate_items<S, F>(
    source: &S,
    request: &ScrollRequest,
    cancel: &CancellationToken,
    mut on_item: F,
) -> Result<EnumerationSummary, ElasticError>
where
    S: ScrollSource + ?Sized,
    F: FnMut(EnumeratedItem<'_>) -> Result<(), ElasticError>,
{
    let mut page = source
        .open_scroll(request)
        .await
        .map_err(|e| e.with_operation("open_scroll"))?;

    let mut cursor = ScrollCursor::new();
    let mut errors = MultiError::new();
    let mut summary = EnumerationSummary::default();

    loop {
        cursor.advance(&page);

        if page.hits.is_empty() {
            debug!(position = cursor.position(), "End of scroll");
            break;
        }

        summary.pages += 1;
        let last = page.hits.len() - 1;
        debug!(
            page = summary.pages,
            hits = page.hits.len(),
            total = cursor.total(),
            "Fetched scroll page"
        );

        for (idx, hit) in page.hits.iter().enumerate() {
            let item = EnumeratedItem {
                source: hit.source.as_deref(),
                id: &hit.id,
                index: &hit.index,
                ordinal: cursor.next_ordinal(),
                total: cursor.total(),
                last_in_page: idx == last,
            };

            if let Err(e) = on_item(item) {
                errors.push(e.with_operation("on_item"));
                break;
            }
            summary.delivered += 1;
        }

        if cancel.is_cancelled() {
            if let Err(e) = cursor.release(source).await {
                warn!(error = %e, "Failed to clear scroll after cancellation");
            }
            return Err(ElasticError::Cancelled);
        }

        if !errors.is_empty() {
            break;
        }

        let Some(cursor_id) = cursor.id() else {
            errors.push(ElasticError::EmptyResponse.with_operation("scroll"));
            break;
        };

        match source.scroll(cursor_id, &request.keep_alive).await {
            Ok(next) => page = next,
            Err(e) => {
                errors.push(e.with_operation("scroll"));
                break;
            }
        }
    }

    summary.total = cursor.total();

    if let Err(e) = cursor.release(source).await {
        errors.push(e.with_operation("clear_scroll"));
    }

    if !errors.is_empty() {
        warn!(
            failures = errors.len(),
            delivered = summary.delivered,
            "Enumeration finished with failures"
        );
    }

    errors.into_result().map(|()| summary)
}
