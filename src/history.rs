//! Run history controller: paging cursor, the current page of runs, and row
//! expansion for one application.
//!
//! Fetching is split in two halves so the controller never awaits while it
//! holds state. [`RunHistory::fetch_page`] issues a [`PageRequest`] tagged
//! with a sequence number and marks the controller as loading; whoever
//! performs the request hands the outcome back to [`RunHistory::complete`].
//! Only the response to the latest issued request is applied, so a slow
//! response for an old page can never overwrite a newer one.
//!
//! The visible page number moves as soon as a page change is requested,
//! before its data arrives. While the request is in flight the table still
//! shows the previous page's rows under the new page number.

use crate::app::{DisplayRunRecord, PagingCursor, RunPage, RunStatus, DEFAULT_PAGE_SIZE};
use crate::traits::ErrorReporter;
use color_eyre::eyre::Result;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryOptions {
    pub page_size: usize,
    /// Fixed number of records per request, overriding `page_size`.
    pub max_records: Option<usize>,
    /// Display toggle only; fetching is unaffected.
    pub show_pagination: bool,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_records: None,
            show_pagination: true,
        }
    }
}

/// A fetch issued by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub seq: u64,
    pub entity: String,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page replaced the displayed records.
    Applied { records: usize },
    /// The request failed and was reported; previous records are kept.
    Failed,
    /// A newer request was issued after this one; the result was dropped.
    Stale,
    /// The controller was torn down; the result was dropped.
    Discarded,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    seq: u64,
    offset: usize,
    limit: usize,
}

#[derive(Debug)]
pub struct RunHistory {
    entity: String,
    options: HistoryOptions,
    records: Vec<DisplayRunRecord>,
    paging: PagingCursor,
    current_page: usize,
    expanded: HashSet<String>,
    latest_seq: u64,
    pending: Option<Pending>,
    torn_down: bool,
}

impl RunHistory {
    pub fn new(entity: String, options: HistoryOptions) -> Self {
        let options = HistoryOptions {
            page_size: options.page_size.max(1),
            max_records: options.max_records.filter(|&n| n > 0),
            ..options
        };
        Self {
            entity,
            options,
            records: Vec::new(),
            paging: PagingCursor {
                offset: 0,
                limit: options.page_size,
                total: 0,
            },
            current_page: 0,
            expanded: HashSet::new(),
            latest_seq: 0,
            pending: None,
            torn_down: false,
        }
    }

    pub fn records(&self) -> &[DisplayRunRecord] {
        &self.records
    }

    pub fn paging(&self) -> PagingCursor {
        self.paging
    }

    pub fn page_size(&self) -> usize {
        self.options.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    fn limit(&self) -> usize {
        self.options.max_records.unwrap_or(self.options.page_size)
    }

    /// Issues a request for the page at `offset` (0 when omitted).
    ///
    /// The offset is aligned down to a multiple of the page size. Returns
    /// `None` once the controller has been torn down.
    pub fn fetch_page(&mut self, offset: Option<usize>) -> Option<PageRequest> {
        if self.torn_down {
            return None;
        }
        let page_size = self.options.page_size;
        let offset = offset.unwrap_or(0) / page_size * page_size;
        let limit = self.limit();

        self.latest_seq += 1;
        let seq = self.latest_seq;
        if let Some(prev) = self.pending.replace(Pending { seq, offset, limit }) {
            tracing::debug!(superseded = prev.seq, seq, "run history fetch superseded");
        }
        tracing::debug!(entity = %self.entity, seq, offset, limit, "run history fetch issued");

        Some(PageRequest {
            seq,
            entity: self.entity.clone(),
            offset,
            limit,
        })
    }

    /// Applies the outcome of request `seq`.
    ///
    /// Failures go to `reporter` and leave the records and cursor untouched.
    /// The loading flag is released whenever the latest request resolves,
    /// whichever way it resolves.
    pub fn complete(
        &mut self,
        seq: u64,
        result: Result<RunPage>,
        reporter: &dyn ErrorReporter,
    ) -> FetchOutcome {
        if self.torn_down {
            return FetchOutcome::Discarded;
        }
        if seq != self.latest_seq {
            tracing::debug!(seq, latest = self.latest_seq, "stale run history response dropped");
            return FetchOutcome::Stale;
        }
        let Some(pending) = self.pending.take() else {
            return FetchOutcome::Stale;
        };

        match result {
            Ok(page) => {
                self.records = page
                    .records
                    .into_iter()
                    .map(DisplayRunRecord::from)
                    .collect();
                self.paging = PagingCursor {
                    offset: pending.offset,
                    limit: pending.limit,
                    total: page.total,
                };
                let records = &self.records;
                self.expanded.retain(|id| records.iter().any(|r| &r.id == id));
                tracing::debug!(seq, count = self.records.len(), total = page.total, "run history page applied");
                FetchOutcome::Applied {
                    records: self.records.len(),
                }
            }
            Err(e) => {
                tracing::warn!(seq, "run history fetch failed: {e}");
                reporter.report(&e);
                FetchOutcome::Failed
            }
        }
    }

    /// Moves to page `page_index` (0-based) and requests it.
    ///
    /// The visible page number changes immediately, even if the controller
    /// no longer issues requests.
    pub fn change_page(&mut self, page_index: usize) -> Option<PageRequest> {
        self.current_page = page_index;
        if self.options.max_records.is_some() {
            tracing::debug!(page_index, "page change with a fixed record limit");
        }
        self.fetch_page(Some(page_index.saturating_mul(self.options.page_size)))
    }

    /// Re-requests the page currently shown, keeping the page number.
    pub fn refresh(&mut self) -> Option<PageRequest> {
        self.fetch_page(Some(self.current_page.saturating_mul(self.options.page_size)))
    }

    /// Suppresses every later state change from in-flight fetches.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.pending = None;
    }

    pub fn toggle_row_expansion(&mut self, id: &str) {
        if id.is_empty() {
            return;
        }
        if !self.expanded.remove(id) {
            self.expanded.insert(id.to_string());
        }
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn expanded_ids(&self) -> &HashSet<String> {
        &self.expanded
    }

    /// Whether the "Logs" action can be used for `record`: runs in progress
    /// and successful runs without an inline success context.
    pub fn is_log_action_available(record: &DisplayRunRecord) -> bool {
        match record.status {
            RunStatus::Running => true,
            RunStatus::Success => !record.has_success_context(),
            _ => false,
        }
    }

    pub fn is_log_action_disabled(record: &DisplayRunRecord) -> bool {
        !Self::is_log_action_available(record)
    }

    pub fn page_count(&self) -> usize {
        self.paging.total.div_ceil(self.options.page_size)
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page.saturating_add(1).saturating_mul(self.options.page_size) < self.paging.total
    }

    pub fn pagination_visible(&self) -> bool {
        self.options.show_pagination && self.paging.total > self.options.page_size
    }
}
