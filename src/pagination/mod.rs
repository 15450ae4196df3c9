//! Typed pagination over query results.
//!
//! A [`PageIterator`] drives an external [`QueryExecutionContext`] one page
//! at a time. Every call to [`PageIterator::advance`] yields exactly one
//! [`PageOutcome`]: either a page of items or a typed service error.
//! Service failures, whether reported by the execution context or raised
//! as faults, never escape as `Err`; only cancellation, a call after the
//! last page, and faults that cannot be classified do.

mod faults;

pub use faults::{classify_fault, normalize_fault, AggregateFault, FaultClass};

use crate::config::SerializationOptions;
use crate::diagnostics::{DiagnosticsContext, QueryPageDiagnostics};
use crate::errors::{create_error, BoxError, CosmosError, ErrorDetails, PageError};
use crate::headers::Headers;
use async_trait::async_trait;
use futures::Stream;
use reqwest::StatusCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Resumption state reported with a page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Continuation {
    /// No further pages.
    #[default]
    None,
    /// Opaque token to resume from.
    Token(String),
    /// More results may exist but the query cannot be resumed.
    Disallowed {
        /// Why resuming is not allowed.
        reason: String,
    },
}

impl Continuation {
    /// The token, if resuming is possible.
    pub fn token(&self) -> Option<&str> {
        match self {
            Continuation::Token(token) => Some(token),
            _ => None,
        }
    }
}

/// Successful page reported by the execution context.
#[derive(Debug, Clone)]
pub struct PageSuccess<T> {
    /// Items in the page.
    pub items: Vec<T>,
    /// Request units consumed.
    pub request_charge: f64,
    /// Activity id of the page request.
    pub activity_id: Option<String>,
    /// Token to resume from.
    pub continuation_token: Option<String>,
    /// Set when the query cannot be resumed.
    pub disallow_continuation_reason: Option<String>,
    /// Size of the response payload.
    pub response_length_bytes: u64,
    /// Per-page diagnostics.
    pub diagnostics: Vec<QueryPageDiagnostics>,
}

impl<T> PageSuccess<T> {
    /// Creates a page with no metadata.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            request_charge: 0.0,
            activity_id: None,
            continuation_token: None,
            disallow_continuation_reason: None,
            response_length_bytes: 0,
            diagnostics: Vec::new(),
        }
    }
}

/// Failed page reported by the execution context.
#[derive(Debug, Clone)]
pub struct PageFailure {
    /// Response status.
    pub status_code: StatusCode,
    /// Response sub-status.
    pub sub_status_code: u32,
    /// Error message.
    pub error_message: Option<String>,
    /// Request units consumed.
    pub request_charge: f64,
    /// Activity id of the page request.
    pub activity_id: Option<String>,
    /// Response headers seen by the execution context.
    pub headers: Headers,
    /// Per-page diagnostics.
    pub diagnostics: Vec<QueryPageDiagnostics>,
}

impl PageFailure {
    /// Creates a failure with no metadata.
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            sub_status_code: 0,
            error_message: None,
            request_charge: 0.0,
            activity_id: None,
            headers: Headers::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// Result of one call into the execution context.
#[derive(Debug, Clone)]
pub enum PageResult<T> {
    /// A page was produced.
    Success(PageSuccess<T>),
    /// The service rejected the page request.
    Failure(PageFailure),
}

/// Source of query pages.
#[async_trait]
pub trait QueryExecutionContext: Send {
    /// Item type produced by the query.
    type Item: Send;

    /// Returns true once no further pages exist.
    fn is_done(&self) -> bool;

    /// Fetches the next page.
    async fn execute_next(
        &mut self,
        cancellation: &CancellationToken,
    ) -> Result<PageResult<Self::Item>, BoxError>;
}

/// A page of query results.
#[derive(Debug, Clone)]
pub struct QueryPage<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Number of items.
    pub item_count: usize,
    /// Size of the response payload.
    pub response_size_bytes: u64,
    /// Resumption state.
    pub continuation: Continuation,
    /// Request units consumed.
    pub request_charge: f64,
    /// Activity id of the page request.
    pub activity_id: Option<String>,
    /// Serialization options of the iterator.
    pub serialization: SerializationOptions,
    /// Diagnostics of this fetch.
    pub diagnostics: DiagnosticsContext,
}

impl<T> QueryPage<T> {
    /// Returns true if this page ends the result set.
    pub fn is_final(&self) -> bool {
        self.items.is_empty() && self.continuation == Continuation::None
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if this page is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A page request the service rejected.
#[derive(Debug, Clone)]
pub struct FailedPage {
    /// Response status.
    pub status_code: StatusCode,
    /// The typed error.
    pub error: Arc<CosmosError>,
    /// Response headers.
    pub response_headers: Headers,
}

/// Outcome of one page fetch.
#[derive(Debug, Clone)]
pub enum PageOutcome<T> {
    /// A page of items.
    Success(QueryPage<T>),
    /// A typed service error.
    Failure(FailedPage),
}

impl<T> PageOutcome<T> {
    /// Returns true for a successful page.
    pub fn is_success(&self) -> bool {
        matches!(self, PageOutcome::Success(_))
    }

    /// Diagnostics of this fetch.
    pub fn diagnostics(&self) -> &DiagnosticsContext {
        match self {
            PageOutcome::Success(page) => &page.diagnostics,
            PageOutcome::Failure(failed) => failed.error.diagnostics(),
        }
    }

    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<QueryPage<T>, Arc<CosmosError>> {
        match self {
            PageOutcome::Success(page) => Ok(page),
            PageOutcome::Failure(failed) => Err(failed.error),
        }
    }
}

/// Settings applied to every page fetched by an iterator.
#[derive(Debug, Clone)]
pub struct PageIteratorOptions {
    /// Name of the overall diagnostics scope.
    pub operation_name: String,
    /// Serialization options tagged onto successful pages.
    pub serialization: SerializationOptions,
    /// Whether to capture diagnostics.
    pub diagnostics_enabled: bool,
    /// User agent recorded in diagnostics.
    pub user_agent: Option<String>,
}

impl Default for PageIteratorOptions {
    fn default() -> Self {
        Self {
            operation_name: "Query".to_string(),
            serialization: SerializationOptions::default(),
            diagnostics_enabled: true,
            user_agent: None,
        }
    }
}

/// Cursor over the pages of a query.
///
/// Calls to [`advance`](Self::advance) must not overlap; check
/// [`has_more`](Self::has_more) before each one.
pub struct PageIterator<C: QueryExecutionContext> {
    context: C,
    done: bool,
    options: PageIteratorOptions,
}

impl<C: QueryExecutionContext> PageIterator<C> {
    /// Creates a new page iterator.
    pub fn new(context: C, options: PageIteratorOptions) -> Self {
        let done = context.is_done();
        Self {
            context,
            done,
            options,
        }
    }

    /// Returns true if there are more pages to fetch.
    pub fn has_more(&self) -> bool {
        !self.done
    }

    /// Options of this iterator.
    pub fn options(&self) -> &PageIteratorOptions {
        &self.options
    }

    /// Fetches the next page.
    pub async fn advance(
        &mut self,
        cancellation: &CancellationToken,
    ) -> Result<PageOutcome<C::Item>, PageError> {
        if self.done {
            return Err(PageError::Exhausted);
        }

        let diagnostics = DiagnosticsContext::create(!self.options.diagnostics_enabled);
        if let Some(user_agent) = &self.options.user_agent {
            diagnostics.set_user_agent(user_agent.clone());
        }

        let _scope = diagnostics.create_overall_scope(self.options.operation_name.clone());

        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(PageError::Cancelled),
            result = self.context.execute_next(cancellation) => result,
        };

        if self.context.is_done() {
            self.done = true;
        }

        match result {
            Ok(PageResult::Success(page)) => Ok(self.success_outcome(page, diagnostics)),
            Ok(PageResult::Failure(failure)) => Ok(Self::failure_outcome(failure, diagnostics)),
            Err(fault) => Self::fault_outcome(fault, diagnostics),
        }
    }

    /// Adapts the iterator into a stream of outcomes.
    ///
    /// The stream ends after the last page or after the first `PageError`.
    pub fn into_stream(
        self,
        cancellation: CancellationToken,
    ) -> impl Stream<Item = Result<PageOutcome<C::Item>, PageError>> {
        futures::stream::unfold(Some(self), move |state| {
            let cancellation = cancellation.clone();
            async move {
                let mut iterator = state?;
                if !iterator.has_more() {
                    return None;
                }
                match iterator.advance(&cancellation).await {
                    Ok(outcome) => Some((Ok(outcome), Some(iterator))),
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
    }

    fn success_outcome(
        &self,
        page: PageSuccess<C::Item>,
        diagnostics: DiagnosticsContext,
    ) -> PageOutcome<C::Item> {
        for record in page.diagnostics {
            diagnostics.add(record);
        }

        let continuation = match (page.disallow_continuation_reason, page.continuation_token) {
            (Some(reason), _) => Continuation::Disallowed { reason },
            (None, Some(token)) if !token.is_empty() => Continuation::Token(token),
            (None, _) => Continuation::None,
        };

        debug!(
            item_count = page.items.len(),
            request_charge = page.request_charge,
            activity_id = page.activity_id.as_deref().unwrap_or_default(),
            "Fetched query page"
        );

        PageOutcome::Success(QueryPage {
            item_count: page.items.len(),
            items: page.items,
            response_size_bytes: page.response_length_bytes,
            continuation,
            request_charge: page.request_charge,
            activity_id: page.activity_id,
            serialization: self.options.serialization,
            diagnostics,
        })
    }

    fn failure_outcome(
        failure: PageFailure,
        diagnostics: DiagnosticsContext,
    ) -> PageOutcome<C::Item> {
        for record in failure.diagnostics {
            diagnostics.add(record);
        }

        let mut headers = failure.headers;
        if failure.sub_status_code != 0 {
            headers.set_sub_status(failure.sub_status_code);
        }
        if failure.request_charge > 0.0 {
            headers.set_request_charge(failure.request_charge);
        }
        if let Some(activity_id) = &failure.activity_id {
            headers.set_activity_id(activity_id);
        }

        let details = ErrorDetails::from_headers(
            failure.status_code,
            failure.error_message.unwrap_or_default(),
            headers.clone(),
            diagnostics,
        );
        let error = create_error(details);

        debug!(
            status = failure.status_code.as_u16(),
            sub_status = failure.sub_status_code,
            "Query page failed"
        );

        PageOutcome::Failure(FailedPage {
            status_code: failure.status_code,
            error: Arc::new(error),
            response_headers: headers,
        })
    }

    fn fault_outcome(
        fault: BoxError,
        diagnostics: DiagnosticsContext,
    ) -> Result<PageOutcome<C::Item>, PageError> {
        // A shared typed error keeps its identity.
        let fault = match fault.downcast::<Arc<CosmosError>>() {
            Ok(typed) => return Ok(Self::typed_failure(*typed)),
            Err(fault) => fault,
        };

        let Some(error) = normalize_fault(&*fault, &diagnostics) else {
            warn!(error = %fault, "Unrecognized fault while fetching query page");
            return Err(PageError::Unhandled(fault));
        };

        Ok(Self::typed_failure(Arc::new(error)))
    }

    fn typed_failure(error: Arc<CosmosError>) -> PageOutcome<C::Item> {
        debug!(
            status = error.status_code().as_u16(),
            kind = ?error.kind(),
            "Query page fault normalized"
        );

        PageOutcome::Failure(FailedPage {
            status_code: error.status_code(),
            response_headers: error.headers().clone(),
            error,
        })
    }
}
