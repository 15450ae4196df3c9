//! Diagnostic event records.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::time::Duration;

/// A single entry in a diagnostics timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// A named scope was entered.
    ScopeStarted {
        /// Scope name.
        name: String,
        /// Whether this is the outermost span of the operation.
        overall: bool,
        /// Wall-clock start.
        at: DateTime<Utc>,
    },
    /// A named scope was released.
    ScopeEnded {
        /// Scope name.
        name: String,
        /// Whether this is the outermost span of the operation.
        overall: bool,
        /// Time spent inside the scope.
        elapsed: Duration,
    },
    /// One request against the service.
    PointOperation(PointOperationStatistics),
    /// One page fetched by a query.
    QueryPage(QueryPageDiagnostics),
}

/// Statistics for a single request/response exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOperationStatistics {
    /// Service activity id.
    pub activity_id: Option<String>,
    /// Response status.
    pub status_code: StatusCode,
    /// Response sub-status.
    pub sub_status_code: u32,
    /// Request units consumed.
    pub request_charge: f64,
    /// Error message, when the exchange failed.
    pub error_message: Option<String>,
    /// HTTP method used.
    pub method: String,
    /// Target resource address.
    pub request_uri: String,
    /// Time from send to response.
    pub elapsed: Duration,
}

impl PointOperationStatistics {
    /// Creates statistics for an exchange.
    pub fn new(
        status_code: StatusCode,
        method: impl Into<String>,
        request_uri: impl Into<String>,
    ) -> Self {
        Self {
            activity_id: None,
            status_code,
            sub_status_code: 0,
            request_charge: 0.0,
            error_message: None,
            method: method.into(),
            request_uri: request_uri.into(),
            elapsed: Duration::ZERO,
        }
    }

    /// Sets the activity id.
    pub fn with_activity_id(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    /// Sets the sub-status code.
    pub fn with_sub_status(mut self, sub_status_code: u32) -> Self {
        self.sub_status_code = sub_status_code;
        self
    }

    /// Sets the request charge.
    pub fn with_request_charge(mut self, request_charge: f64) -> Self {
        self.request_charge = request_charge;
        self
    }

    /// Sets the error message.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Sets the elapsed time.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Returns true if the exchange failed.
    pub fn is_failure(&self) -> bool {
        !self.status_code.is_success()
    }
}

/// Diagnostics for one query page, reported by the execution layer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPageDiagnostics {
    /// Partition key range the page was read from.
    pub partition_key_range_id: String,
    /// Raw query metrics reported by the service.
    pub query_metrics: Option<String>,
    /// Index utilization reported by the service.
    pub index_utilization: Option<String>,
    /// Activity id of the page request.
    pub activity_id: Option<String>,
    /// Request units consumed by the page.
    pub request_charge: f64,
}

impl QueryPageDiagnostics {
    /// Creates page diagnostics for a partition key range.
    pub fn new(partition_key_range_id: impl Into<String>) -> Self {
        Self {
            partition_key_range_id: partition_key_range_id.into(),
            query_metrics: None,
            index_utilization: None,
            activity_id: None,
            request_charge: 0.0,
        }
    }
}
