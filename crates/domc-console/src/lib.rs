//! Condition-table state container: paged collection store, mutation
//! coordinator, filter view, and editor session.
//!
//! All state lives in [`ConditionTable`] and changes only through its entry
//! points. Network calls are the only suspension points; the two-phase
//! `begin_*`/`complete_*` pairs mirror the event-driven completion model and
//! make the in-flight invariants testable without a live backend.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use domc_client::{ApiError, ConditionApi, ConditionPage};
use domc_core::{ConditionDraft, ConditionRecord, PageState};

pub const CRATE_NAME: &str = "domc-console";

/// Environment-first runtime configuration for the console.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub per_page: u32,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl ConsoleConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("DOMC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            per_page: std::env::var("DOMC_PER_PAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            http_timeout_secs: std::env::var("DOMC_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            user_agent: std::env::var("DOMC_USER_AGENT").unwrap_or_else(|_| "domc/0.1".to_string()),
        }
    }
}

/// Ticket for an issued page fetch. A completion whose ticket was superseded
/// by a newer fetch is discarded without touching the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    page: u32,
}

/// Modal editor state machine. The draft is always an owned copy; editing it
/// never mutates the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorSession {
    Closed,
    Creating { draft: ConditionDraft },
    Editing { id: i64, draft: ConditionDraft },
}

impl EditorSession {
    pub fn is_open(&self) -> bool {
        !matches!(self, EditorSession::Closed)
    }

    pub fn draft(&self) -> Option<&ConditionDraft> {
        match self {
            EditorSession::Closed => None,
            EditorSession::Creating { draft } | EditorSession::Editing { draft, .. } => Some(draft),
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut ConditionDraft> {
        match self {
            EditorSession::Closed => None,
            EditorSession::Creating { draft } | EditorSession::Editing { draft, .. } => Some(draft),
        }
    }
}

/// What a mutation entry point did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Confirmed by the backend and applied to the record set.
    Applied,
    /// Refused locally before any request was sent.
    Rejected,
    /// The backend call failed; the record set is unchanged.
    Failed,
}

/// Pure filter derivation: records where the query is a case-insensitive
/// substring of service class, pickup address, or dropoff address. An empty
/// query keeps everything.
pub fn filter_records<'a>(records: &'a [ConditionRecord], query: &str) -> Vec<&'a ConditionRecord> {
    if query.is_empty() {
        return records.iter().collect();
    }
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|record| {
            record.service_class.to_lowercase().contains(&needle)
                || record.pickup_address.to_lowercase().contains(&needle)
                || record.dropoff_address.to_lowercase().contains(&needle)
        })
        .collect()
}

pub struct ConditionTable {
    api: Arc<dyn ConditionApi>,
    records: Vec<ConditionRecord>,
    page: PageState,
    query: String,
    error: Option<String>,
    loading: bool,
    busy: bool,
    delete_guard: Option<i64>,
    editor: EditorSession,
    fetch_seq: u64,
    last_loaded_at: Option<DateTime<Utc>>,
}

impl ConditionTable {
    pub fn new(api: Arc<dyn ConditionApi>, per_page: u32) -> Self {
        Self {
            api,
            records: Vec::new(),
            page: PageState::new(per_page),
            query: String::new(),
            error: None,
            loading: false,
            busy: false,
            delete_guard: None,
            editor: EditorSession::Closed,
            fetch_seq: 0,
            last_loaded_at: None,
        }
    }

    pub fn records(&self) -> &[ConditionRecord] {
        &self.records
    }

    pub fn page(&self) -> PageState {
        self.page
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn delete_guard(&self) -> Option<i64> {
        self.delete_guard
    }

    pub fn editor(&self) -> &EditorSession {
        &self.editor
    }

    pub fn last_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.last_loaded_at
    }

    // ---- filter view -------------------------------------------------------

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn visible_rows(&self) -> Vec<&ConditionRecord> {
        filter_records(&self.records, &self.query)
    }

    /// Nothing matches the current query. Rendered as an explicit empty-state
    /// row rather than a bare table.
    pub fn shows_empty_state(&self) -> bool {
        self.visible_rows().is_empty()
    }

    // ---- paged collection store --------------------------------------------

    /// Issue a page fetch. Returns `None` (a no-op) for pages outside
    /// `[1, total_pages]`.
    pub fn begin_load(&mut self, page: u32) -> Option<FetchTicket> {
        if !self.page.contains(page) {
            debug!(page, total_pages = self.page.total_pages, "page out of range; ignoring");
            return None;
        }
        self.fetch_seq += 1;
        self.loading = true;
        Some(FetchTicket {
            seq: self.fetch_seq,
            page,
        })
    }

    /// Apply a fetch completion. Stale completions (a newer fetch was issued
    /// since the ticket) are dropped so they cannot clobber fresher state.
    pub fn complete_load(&mut self, ticket: FetchTicket, outcome: Result<ConditionPage, ApiError>) {
        if ticket.seq != self.fetch_seq {
            warn!(
                stale_seq = ticket.seq,
                latest_seq = self.fetch_seq,
                "discarding stale page response"
            );
            return;
        }
        self.loading = false;
        match outcome {
            Ok(fetched) => {
                self.records = fetched.allconditions;
                self.page.total_pages = fetched.total_pages.max(1);
                self.page.current_page = ticket.page.min(self.page.total_pages);
                self.last_loaded_at = Some(Utc::now());
                self.error = None;
            }
            Err(err) => {
                // already-loaded records are kept
                self.error = Some(err.surface_message());
            }
        }
    }

    /// Fetch page `n` and apply the result. Returns `true` when the page was
    /// applied without error.
    pub async fn load_page(&mut self, page: u32) -> bool {
        let Some(ticket) = self.begin_load(page) else {
            return false;
        };
        let outcome = self.api.list_page(ticket.page, self.page.per_page).await;
        self.complete_load(ticket, outcome);
        !self.loading && self.error.is_none()
    }

    /// Initial fetch when the table comes up.
    pub async fn mount(&mut self) -> bool {
        self.load_page(1).await
    }

    // ---- mutation coordinator ----------------------------------------------

    fn accepts_mutations(&self) -> bool {
        !self.loading && !self.busy
    }

    pub async fn create(&mut self, draft: ConditionDraft) -> MutationOutcome {
        if !self.accepts_mutations() {
            debug!("create rejected; table is loading or busy");
            return MutationOutcome::Rejected;
        }
        self.busy = true;
        let result = self.api.create(&draft).await;
        let outcome = match result {
            Ok(record) => {
                self.records.push(record);
                self.error = None;
                MutationOutcome::Applied
            }
            Err(err) => {
                self.error = Some(err.surface_message());
                MutationOutcome::Failed
            }
        };
        self.busy = false;
        outcome
    }

    pub async fn update(&mut self, id: i64, draft: ConditionDraft) -> MutationOutcome {
        if !self.accepts_mutations() {
            debug!(id, "update rejected; table is loading or busy");
            return MutationOutcome::Rejected;
        }
        self.busy = true;
        let result = self.api.update(id, &draft).await;
        let outcome = match result {
            // replace wholesale so server-derived fields are never masked
            Ok(record) => {
                if let Some(slot) = self.records.iter_mut().find(|r| r.id == id) {
                    *slot = record;
                }
                self.error = None;
                MutationOutcome::Applied
            }
            Err(err) => {
                self.error = Some(err.surface_message());
                MutationOutcome::Failed
            }
        };
        self.busy = false;
        outcome
    }

    /// Claim the single-slot delete guard. Refused while any delete is in
    /// flight or the table is loading.
    pub fn begin_delete(&mut self, id: i64) -> bool {
        if self.delete_guard.is_some() {
            debug!(id, in_flight = ?self.delete_guard, "delete rejected; another delete in flight");
            return false;
        }
        if self.loading {
            debug!(id, "delete rejected; table is loading");
            return false;
        }
        self.delete_guard = Some(id);
        self.busy = true;
        true
    }

    /// Apply a delete completion. The guard and busy flag are released on
    /// every path so a failure can never leave the table locked.
    pub fn complete_delete(
        &mut self,
        id: i64,
        outcome: Result<ConditionRecord, ApiError>,
    ) -> MutationOutcome {
        let applied = match outcome {
            Ok(_deleted) => {
                self.records.retain(|record| record.id != id);
                self.error = None;
                MutationOutcome::Applied
            }
            Err(err) => {
                self.error = Some(err.surface_message());
                MutationOutcome::Failed
            }
        };
        self.delete_guard = None;
        self.busy = false;
        applied
    }

    pub async fn delete(&mut self, id: i64) -> MutationOutcome {
        if !self.begin_delete(id) {
            return MutationOutcome::Rejected;
        }
        let result = self.api.delete(id).await;
        self.complete_delete(id, result)
    }

    // ---- editor session ----------------------------------------------------

    pub fn open_create(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.editor = EditorSession::Creating {
            draft: ConditionDraft::default(),
        };
        true
    }

    /// Open the editor on a copy of the selected record. Refused while the
    /// table is loading or when the id is not on the current page.
    pub fn open_edit(&mut self, id: i64) -> bool {
        if self.loading {
            return false;
        }
        match self.records.iter().find(|record| record.id == id) {
            Some(record) => {
                self.editor = EditorSession::Editing {
                    id,
                    draft: record.to_draft(),
                };
                true
            }
            None => false,
        }
    }

    pub fn cancel_editor(&mut self) {
        self.editor = EditorSession::Closed;
    }

    pub fn editor_draft_mut(&mut self) -> Option<&mut ConditionDraft> {
        self.editor.draft_mut()
    }

    /// Dispatch the draft as a create or update. The editor closes only on a
    /// confirmed mutation; a failed submission keeps the draft for retry.
    pub async fn submit_editor(&mut self) -> MutationOutcome {
        let outcome = match self.editor.clone() {
            EditorSession::Closed => return MutationOutcome::Rejected,
            EditorSession::Creating { draft } => self.create(draft).await,
            EditorSession::Editing { id, draft } => self.update(id, draft).await,
        };
        if outcome == MutationOutcome::Applied {
            self.editor = EditorSession::Closed;
        }
        outcome
    }
}
