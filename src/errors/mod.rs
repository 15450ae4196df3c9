//! Error types for the Cosmos client core.
//!
//! Every failure reported by the service ends up as a [`CosmosError`], a
//! closed set of variants sharing one [`ErrorDetails`] payload. The
//! variant is chosen purely from the status code by
//! [`mapping::create_error`]; the payload always carries the request's
//! diagnostics.

pub mod mapping;
pub mod message;

pub use mapping::{create_error, from_request_fault, from_response, from_store_response};
pub use message::{extract_error, ErrorDocument, ExtractedError};

use crate::diagnostics::DiagnosticsContext;
use crate::headers::Headers;
use reqwest::StatusCode;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed fault raised by an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for operations that fail with a typed service error.
pub type CosmosResult<T> = Result<T, CosmosError>;

/// Typed service error.
#[derive(Debug, Clone, Error)]
pub enum CosmosError {
    /// Status 404.
    #[error(transparent)]
    NotFound(Box<ErrorDetails>),

    /// Status 500.
    #[error(transparent)]
    InternalServerError(Box<ErrorDetails>),

    /// Status 400.
    #[error(transparent)]
    BadRequest(Box<ErrorDetails>),

    /// Status 408.
    #[error(transparent)]
    RequestTimeout(Box<ErrorDetails>),

    /// Status 429.
    #[error(transparent)]
    Throttled(Box<ErrorDetails>),

    /// Any other status.
    #[error(transparent)]
    Generic(Box<ErrorDetails>),
}

/// Discriminant of a [`CosmosError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Status 404.
    NotFound,
    /// Status 500.
    InternalServerError,
    /// Status 400.
    BadRequest,
    /// Status 408.
    RequestTimeout,
    /// Status 429.
    Throttled,
    /// Any other status.
    Generic,
}

impl CosmosError {
    /// Returns the variant discriminant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CosmosError::NotFound(_) => ErrorKind::NotFound,
            CosmosError::InternalServerError(_) => ErrorKind::InternalServerError,
            CosmosError::BadRequest(_) => ErrorKind::BadRequest,
            CosmosError::RequestTimeout(_) => ErrorKind::RequestTimeout,
            CosmosError::Throttled(_) => ErrorKind::Throttled,
            CosmosError::Generic(_) => ErrorKind::Generic,
        }
    }

    /// Returns the shared payload.
    pub fn details(&self) -> &ErrorDetails {
        match self {
            CosmosError::NotFound(d)
            | CosmosError::InternalServerError(d)
            | CosmosError::BadRequest(d)
            | CosmosError::RequestTimeout(d)
            | CosmosError::Throttled(d)
            | CosmosError::Generic(d) => d,
        }
    }

    /// Consumes the error and returns its payload.
    pub fn into_details(self) -> ErrorDetails {
        match self {
            CosmosError::NotFound(d)
            | CosmosError::InternalServerError(d)
            | CosmosError::BadRequest(d)
            | CosmosError::RequestTimeout(d)
            | CosmosError::Throttled(d)
            | CosmosError::Generic(d) => *d,
        }
    }

    /// Protocol status code.
    pub fn status_code(&self) -> StatusCode {
        self.details().status_code
    }

    /// Finer-grained status code.
    pub fn sub_status_code(&self) -> u32 {
        self.details().sub_status_code
    }

    /// Error message.
    pub fn message(&self) -> &str {
        &self.details().message
    }

    /// Service activity id.
    pub fn activity_id(&self) -> Option<&str> {
        self.details().activity_id.as_deref()
    }

    /// Request units consumed.
    pub fn request_charge(&self) -> f64 {
        self.details().request_charge
    }

    /// Retry hint from the service.
    pub fn retry_after(&self) -> Option<Duration> {
        self.details().retry_after
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.details().headers
    }

    /// Diagnostics of the failed operation.
    pub fn diagnostics(&self) -> &DiagnosticsContext {
        &self.details().diagnostics
    }

    /// Parsed error body, if the service returned a structured one.
    pub fn error_document(&self) -> Option<&ErrorDocument> {
        self.details().error_document.as_ref()
    }

    /// Underlying failure, if this error wraps one.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.details().cause.as_deref()
    }

    /// Returns true if the service suggests the request may succeed later.
    ///
    /// This is only a hint; nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.status_code(),
            StatusCode::REQUEST_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GONE
        )
    }
}

/// Payload shared by every [`CosmosError`] variant.
#[derive(Debug, Clone, Error)]
#[error("Response status code {status_code} (sub-status {sub_status_code}): {message}")]
pub struct ErrorDetails {
    status_code: StatusCode,
    sub_status_code: u32,
    message: String,
    activity_id: Option<String>,
    request_charge: f64,
    retry_after: Option<Duration>,
    headers: Headers,
    diagnostics: DiagnosticsContext,
    error_document: Option<ErrorDocument>,
    location: Option<&'static Location<'static>>,
    #[source]
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ErrorDetails {
    /// Creates a payload with no request metadata.
    pub fn new(
        status_code: StatusCode,
        message: impl Into<String>,
        diagnostics: DiagnosticsContext,
    ) -> Self {
        Self {
            status_code,
            sub_status_code: 0,
            message: message.into(),
            activity_id: None,
            request_charge: 0.0,
            retry_after: None,
            headers: Headers::new(),
            diagnostics,
            error_document: None,
            location: None,
            cause: None,
        }
    }

    /// Creates a payload whose request metadata is read from the headers.
    pub fn from_headers(
        status_code: StatusCode,
        message: impl Into<String>,
        headers: Headers,
        diagnostics: DiagnosticsContext,
    ) -> Self {
        Self {
            status_code,
            sub_status_code: headers.sub_status(),
            message: message.into(),
            activity_id: headers.activity_id().map(str::to_string),
            request_charge: headers.request_charge(),
            retry_after: headers.retry_after(),
            headers,
            diagnostics,
            error_document: None,
            location: None,
            cause: None,
        }
    }

    /// Sets the sub-status code.
    pub fn with_sub_status(mut self, sub_status_code: u32) -> Self {
        self.sub_status_code = sub_status_code;
        self
    }

    /// Sets the activity id.
    pub fn with_activity_id(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    /// Sets the request charge.
    pub fn with_request_charge(mut self, request_charge: f64) -> Self {
        self.request_charge = request_charge;
        self
    }

    /// Sets the retry hint.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Replaces the headers without touching the metadata fields.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Attaches a parsed error body.
    pub fn with_error_document(mut self, document: ErrorDocument) -> Self {
        self.error_document = Some(document);
        self
    }

    /// Wraps an underlying failure.
    pub fn with_cause(mut self, cause: Arc<dyn std::error::Error + Send + Sync>) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Records where the error was raised.
    pub fn with_location(mut self, location: &'static Location<'static>) -> Self {
        self.location = Some(location);
        self
    }

    /// Protocol status code.
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Finer-grained status code.
    pub fn sub_status_code(&self) -> u32 {
        self.sub_status_code
    }

    /// Error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Service activity id.
    pub fn activity_id(&self) -> Option<&str> {
        self.activity_id.as_deref()
    }

    /// Request units consumed.
    pub fn request_charge(&self) -> f64 {
        self.request_charge
    }

    /// Retry hint.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Diagnostics of the failed operation.
    pub fn diagnostics(&self) -> &DiagnosticsContext {
        &self.diagnostics
    }

    /// Parsed error body.
    pub fn error_document(&self) -> Option<&ErrorDocument> {
        self.error_document.as_ref()
    }

    /// Source location that raised the error.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }
}

/// Fault raised while normalizing a failure.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The response body could not be read.
    #[error("Failed to read error body: {0}")]
    BodyRead(#[from] std::io::Error),

    /// The response body was JSON but could not be interpreted.
    #[error("Failed to interpret error body: {0}")]
    BodyParse(#[from] serde_json::Error),
}

/// Non-outcome result of advancing a page iterator.
#[derive(Debug, Error)]
pub enum PageError {
    /// The caller cancelled the fetch.
    #[error("Page fetch was cancelled")]
    Cancelled,

    /// `advance` was called after the last page.
    #[error("No more pages: check has_more() before advancing")]
    Exhausted,

    /// A fault that could not be classified as a service error.
    #[error("Unhandled fault while fetching page: {0}")]
    Unhandled(#[source] BoxError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid user agent.
    #[error("Invalid user agent: {0}")]
    InvalidUserAgent(String),
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Network(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}
