//! Request diagnostics capture.
//!
//! A [`DiagnosticsContext`] accumulates an ordered timeline of everything
//! that happened while servicing one logical operation: timed scopes,
//! individual service exchanges, query pages and the timelines of nested
//! sub-operations. Rendering the timeline is left to the caller, which
//! reads it through [`DiagnosticsContext::snapshot`].
//!
//! Contexts are cheap handles. Clones share the same timeline, and
//! appends are serialized by an internal lock so concurrent branches of
//! one operation may record into the same context.
//!
//! When diagnostics are turned off, [`DiagnosticsContext::disabled`]
//! returns a stateless sentinel: every mutator is a no-op and nothing is
//! ever retained.

mod records;

pub use records::{DiagnosticEvent, PointOperationStatistics, QueryPageDiagnostics};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something that can be appended to a context.
#[derive(Debug, Clone)]
pub enum DiagnosticRecord {
    /// A single request/response exchange.
    PointOperation(PointOperationStatistics),
    /// A single query page.
    QueryPage(QueryPageDiagnostics),
    /// The whole timeline of a sub-operation.
    Child(DiagnosticsContext),
}

impl From<PointOperationStatistics> for DiagnosticRecord {
    fn from(stats: PointOperationStatistics) -> Self {
        DiagnosticRecord::PointOperation(stats)
    }
}

impl From<QueryPageDiagnostics> for DiagnosticRecord {
    fn from(page: QueryPageDiagnostics) -> Self {
        DiagnosticRecord::QueryPage(page)
    }
}

impl From<DiagnosticsContext> for DiagnosticRecord {
    fn from(child: DiagnosticsContext) -> Self {
        DiagnosticRecord::Child(child)
    }
}

impl From<&DiagnosticsContext> for DiagnosticRecord {
    fn from(child: &DiagnosticsContext) -> Self {
        DiagnosticRecord::Child(child.clone())
    }
}

/// Handle to a diagnostics timeline.
///
/// The default handle is the disabled sentinel.
#[derive(Clone, Default)]
pub struct DiagnosticsContext {
    state: Option<Arc<ContextState>>,
}

struct ContextState {
    start_utc: DateTime<Utc>,
    summary: Mutex<Summary>,
}

#[derive(Default)]
struct Summary {
    total_request_count: u64,
    failed_request_count: u64,
    total_elapsed: Option<Duration>,
    user_agent: Option<String>,
    events: Vec<DiagnosticEvent>,
}

impl DiagnosticsContext {
    /// Creates a context, or returns the disabled sentinel.
    pub fn create(disabled: bool) -> Self {
        if disabled {
            Self::disabled()
        } else {
            Self::new()
        }
    }

    /// Creates a fresh recording context.
    pub fn new() -> Self {
        Self {
            state: Some(Arc::new(ContextState {
                start_utc: Utc::now(),
                summary: Mutex::new(Summary::default()),
            })),
        }
    }

    /// The shared disabled context.
    pub const fn disabled() -> Self {
        Self { state: None }
    }

    /// Returns true if this is the disabled sentinel.
    pub fn is_disabled(&self) -> bool {
        self.state.is_none()
    }

    /// Returns true if both handles refer to the same timeline.
    ///
    /// All disabled handles are the same context.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.state, &other.state) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Opens the outermost timed scope of an operation.
    ///
    /// Releasing it also finalizes the context's total elapsed time.
    pub fn create_overall_scope(&self, name: impl Into<String>) -> DiagnosticScope {
        DiagnosticScope::start(self.clone(), name.into(), true)
    }

    /// Opens a nested timed scope.
    pub fn create_scope(&self, name: impl Into<String>) -> DiagnosticScope {
        DiagnosticScope::start(self.clone(), name.into(), false)
    }

    /// Appends a record to the timeline.
    ///
    /// Child contexts are folded in by appending their events in order and
    /// adding their request counts.
    pub fn add(&self, record: impl Into<DiagnosticRecord>) {
        let Some(state) = &self.state else {
            return;
        };

        match record.into() {
            DiagnosticRecord::PointOperation(stats) => {
                let mut summary = state.summary.lock();
                summary.total_request_count += 1;
                if stats.is_failure() {
                    summary.failed_request_count += 1;
                }
                summary.events.push(DiagnosticEvent::PointOperation(stats));
            }
            DiagnosticRecord::QueryPage(page) => {
                state.summary.lock().events.push(DiagnosticEvent::QueryPage(page));
            }
            DiagnosticRecord::Child(child) => {
                if self.ptr_eq(&child) {
                    return;
                }
                let Some(child_state) = &child.state else {
                    return;
                };
                let (total, failed, events) = {
                    let child_summary = child_state.summary.lock();
                    (
                        child_summary.total_request_count,
                        child_summary.failed_request_count,
                        child_summary.events.clone(),
                    )
                };
                let mut summary = state.summary.lock();
                summary.total_request_count += total;
                summary.failed_request_count += failed;
                summary.events.extend(events);
            }
        }
    }

    /// Records the client user agent. The last write wins.
    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        if let Some(state) = &self.state {
            state.summary.lock().user_agent = Some(user_agent.into());
        }
    }

    /// The recorded user agent.
    pub fn user_agent(&self) -> Option<String> {
        self.state
            .as_ref()
            .and_then(|s| s.summary.lock().user_agent.clone())
    }

    /// When the context was created. `None` for the disabled sentinel.
    pub fn start_utc(&self) -> Option<DateTime<Utc>> {
        self.state.as_ref().map(|s| s.start_utc)
    }

    /// Number of service exchanges recorded, including folded children.
    pub fn total_request_count(&self) -> u64 {
        self.state
            .as_ref()
            .map_or(0, |s| s.summary.lock().total_request_count)
    }

    /// Number of failed service exchanges recorded.
    pub fn failed_request_count(&self) -> u64 {
        self.state
            .as_ref()
            .map_or(0, |s| s.summary.lock().failed_request_count)
    }

    /// Total elapsed time, set once the overall scope is released.
    pub fn total_elapsed(&self) -> Option<Duration> {
        self.state.as_ref().and_then(|s| s.summary.lock().total_elapsed)
    }

    /// Copies the current timeline without modifying it.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        match &self.state {
            None => DiagnosticsSnapshot::default(),
            Some(state) => {
                let summary = state.summary.lock();
                DiagnosticsSnapshot {
                    start_utc: Some(state.start_utc),
                    total_request_count: summary.total_request_count,
                    failed_request_count: summary.failed_request_count,
                    total_elapsed: summary.total_elapsed,
                    user_agent: summary.user_agent.clone(),
                    events: summary.events.clone(),
                }
            }
        }
    }

    /// Copies the recorded events in insertion order.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.state
            .as_ref()
            .map(|s| s.summary.lock().events.clone())
            .unwrap_or_default()
    }

    fn push(&self, event: DiagnosticEvent) {
        if let Some(state) = &self.state {
            state.summary.lock().events.push(event);
        }
    }

    fn finalize(&self, elapsed: Duration) {
        if let Some(state) = &self.state {
            let mut summary = state.summary.lock();
            if summary.total_elapsed.is_none() {
                summary.total_elapsed = Some(elapsed);
            }
        }
    }
}

impl fmt::Debug for DiagnosticsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            None => write!(f, "DiagnosticsContext(disabled)"),
            Some(state) => {
                let summary = state.summary.lock();
                f.debug_struct("DiagnosticsContext")
                    .field("start_utc", &state.start_utc)
                    .field("total_request_count", &summary.total_request_count)
                    .field("failed_request_count", &summary.failed_request_count)
                    .field("events", &summary.events.len())
                    .finish()
            }
        }
    }
}

/// A timed span inside a context.
///
/// The span ends when the guard is dropped, on every exit path.
#[must_use = "a scope ends as soon as it is dropped"]
pub struct DiagnosticScope {
    context: DiagnosticsContext,
    name: String,
    overall: bool,
    started: Instant,
}

impl DiagnosticScope {
    fn start(context: DiagnosticsContext, name: String, overall: bool) -> Self {
        context.push(DiagnosticEvent::ScopeStarted {
            name: name.clone(),
            overall,
            at: Utc::now(),
        });
        Self {
            context,
            name,
            overall,
            started: Instant::now(),
        }
    }

    /// Name of the scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time spent in the scope so far.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for DiagnosticScope {
    fn drop(&mut self) {
        if self.context.is_disabled() {
            return;
        }
        let elapsed = self.started.elapsed();
        self.context.push(DiagnosticEvent::ScopeEnded {
            name: std::mem::take(&mut self.name),
            overall: self.overall,
            elapsed,
        });
        if self.overall {
            self.context.finalize(elapsed);
        }
    }
}

/// Read-only copy of a context's timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticsSnapshot {
    /// When the context was created.
    pub start_utc: Option<DateTime<Utc>>,
    /// Number of service exchanges.
    pub total_request_count: u64,
    /// Number of failed service exchanges.
    pub failed_request_count: u64,
    /// Total elapsed time, if finalized.
    pub total_elapsed: Option<Duration>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Events in insertion order.
    pub events: Vec<DiagnosticEvent>,
}

impl DiagnosticsSnapshot {
    /// Iterates over the events in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, DiagnosticEvent> {
        self.events.iter()
    }

    /// Returns true if no events were recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<'a> IntoIterator for &'a DiagnosticsSnapshot {
    type Item = &'a DiagnosticEvent;
    type IntoIter = std::slice::Iter<'a, DiagnosticEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn exchange(status: StatusCode) -> PointOperationStatistics {
        PointOperationStatistics::new(status, "GET", "dbs/db/colls/c/docs/1")
    }

    #[test]
    fn test_create_disabled_returns_sentinel() {
        let a = DiagnosticsContext::create(true);
        let b = DiagnosticsContext::disabled();
        assert!(a.is_disabled());
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&DiagnosticsContext::create(false)));
    }

    #[test]
    fn test_disabled_discards_everything() {
        let a = DiagnosticsContext::disabled();
        let b = DiagnosticsContext::disabled();
        {
            let _overall = a.create_overall_scope("ReadItem");
            let _scope = a.create_scope("Transport");
            a.add(exchange(StatusCode::OK));
            a.add(QueryPageDiagnostics::new("0"));
            a.add(DiagnosticsContext::new());
            a.set_user_agent("agent");
        }

        for ctx in [&a, &b] {
            assert!(ctx.events().is_empty());
            assert!(ctx.snapshot().is_empty());
            assert_eq!(ctx.total_request_count(), 0);
            assert!(ctx.user_agent().is_none());
            assert!(ctx.start_utc().is_none());
            assert!(ctx.total_elapsed().is_none());
        }
    }

    #[test]
    fn test_scopes_record_start_and_end() {
        let ctx = DiagnosticsContext::new();
        {
            let _overall = ctx.create_overall_scope("Query");
            let scope = ctx.create_scope("Page");
            assert_eq!(scope.name(), "Page");
        }

        let events = ctx.events();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            &events[0],
            DiagnosticEvent::ScopeStarted { name, overall: true, .. } if name == "Query"
        ));
        assert!(matches!(
            &events[1],
            DiagnosticEvent::ScopeStarted { name, overall: false, .. } if name == "Page"
        ));
        assert!(matches!(
            &events[2],
            DiagnosticEvent::ScopeEnded { name, overall: false, .. } if name == "Page"
        ));
        assert!(matches!(
            &events[3],
            DiagnosticEvent::ScopeEnded { name, overall: true, .. } if name == "Query"
        ));
        assert!(ctx.total_elapsed().is_some());
    }

    #[test]
    fn test_scope_ends_on_early_exit() {
        fn failing(ctx: &DiagnosticsContext) -> Result<(), &'static str> {
            let _scope = ctx.create_scope("Parse");
            Err::<(), _>("boom")?;
            Ok(())
        }

        let ctx = DiagnosticsContext::new();
        assert!(failing(&ctx).is_err());
        assert!(matches!(
            ctx.events().last(),
            Some(DiagnosticEvent::ScopeEnded { name, .. }) if name == "Parse"
        ));
    }

    #[test]
    fn test_point_operations_update_counts() {
        let ctx = DiagnosticsContext::new();
        ctx.add(exchange(StatusCode::OK));
        ctx.add(exchange(StatusCode::TOO_MANY_REQUESTS));

        assert_eq!(ctx.total_request_count(), 2);
        assert_eq!(ctx.failed_request_count(), 1);
    }

    #[test]
    fn test_child_fold_appends_in_order() {
        let parent = DiagnosticsContext::new();
        parent.add(QueryPageDiagnostics::new("parent"));

        let child = DiagnosticsContext::new();
        child.add(QueryPageDiagnostics::new("child-1"));
        child.add(exchange(StatusCode::NOT_FOUND));

        parent.add(&child);
        parent.add(QueryPageDiagnostics::new("after"));

        let ids: Vec<_> = parent
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::QueryPage(p) => Some(p.partition_key_range_id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["parent", "child-1", "after"]);
        assert_eq!(parent.total_request_count(), 1);
        assert_eq!(parent.failed_request_count(), 1);
    }

    #[test]
    fn test_fold_into_self_is_ignored() {
        let ctx = DiagnosticsContext::new();
        ctx.add(QueryPageDiagnostics::new("0"));
        ctx.add(ctx.clone());
        assert_eq!(ctx.events().len(), 1);
    }

    #[test]
    fn test_user_agent_last_write_wins() {
        let ctx = DiagnosticsContext::new();
        ctx.set_user_agent("first");
        ctx.set_user_agent("second");
        assert_eq!(ctx.user_agent().as_deref(), Some("second"));
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let ctx = DiagnosticsContext::new();
        ctx.add(exchange(StatusCode::OK));

        let first = ctx.snapshot();
        let second = ctx.snapshot();
        assert_eq!(first, second);
        assert_eq!((&first).into_iter().count(), 1);
    }

    #[test]
    fn test_overall_elapsed_first_release_wins() {
        let ctx = DiagnosticsContext::new();
        drop(ctx.create_overall_scope("first"));
        let first = ctx.total_elapsed();
        std::thread::sleep(Duration::from_millis(5));
        {
            let _second = ctx.create_overall_scope("second");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(ctx.total_elapsed(), first);
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let ctx = DiagnosticsContext::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    ctx.add(PointOperationStatistics::new(StatusCode::OK, "GET", "x"));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(ctx.total_request_count(), 200);
        assert_eq!(ctx.events().len(), 200);
    }
}
