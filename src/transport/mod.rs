//! Failure signals produced by the request pipeline.
//!
//! The network stack itself lives outside this crate. These are the
//! shapes it hands over when something goes wrong: a [`RequestFault`]
//! raised before or while talking to the service, a [`ResponseMessage`]
//! from the gateway path, and a raw [`StoreResponse`] from the direct
//! store path together with its [`DocumentServiceRequest`].

use crate::diagnostics::DiagnosticsContext;
use crate::errors::{CosmosError, TransportError};
use crate::headers::Headers;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure raised by the document client layer.
///
/// Carries whatever the pipeline knew at the time: possibly a status
/// code, the response headers seen so far, and the low-level fault that
/// triggered it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RequestFault {
    status_code: Option<StatusCode>,
    message: String,
    headers: Headers,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl RequestFault {
    /// Creates a fault with no status code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
            headers: Headers::new(),
            source: None,
        }
    }

    /// Creates a fault wrapping a transport failure.
    pub fn from_transport(err: TransportError) -> Self {
        Self::new(err.to_string()).with_source(err)
    }

    /// Sets the status code.
    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Sets the response headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Wraps a lower-level failure.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Explicit status code, if one was received.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status_code
    }

    /// Fault message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Sub-status code.
    pub fn sub_status(&self) -> u32 {
        self.headers.sub_status()
    }

    /// Activity id.
    pub fn activity_id(&self) -> Option<&str> {
        self.headers.activity_id()
    }

    /// Request charge.
    pub fn request_charge(&self) -> f64 {
        self.headers.request_charge()
    }

    /// Retry hint.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers.retry_after()
    }

    /// Returns true if a [`TransportError`] appears in the source chain.
    pub fn is_transport_failure(&self) -> bool {
        let mut next: Option<&(dyn StdError + 'static)> = self
            .source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static));
        while let Some(err) = next {
            if err.is::<TransportError>() {
                return true;
            }
            next = err.source();
        }
        false
    }
}

impl From<reqwest::Error> for RequestFault {
    fn from(err: reqwest::Error) -> Self {
        let status_code = err.status();
        let fault = Self::from_transport(TransportError::from(err));
        match status_code {
            Some(status_code) => fault.with_status(status_code),
            None => fault,
        }
    }
}

/// Response returned by the gateway request pipeline.
///
/// A response may already own an error built earlier in the pipeline.
#[derive(Debug, Clone)]
pub struct ResponseMessage {
    status_code: StatusCode,
    headers: Headers,
    content: Option<Bytes>,
    error: Option<Arc<CosmosError>>,
    diagnostics: DiagnosticsContext,
}

impl ResponseMessage {
    /// Creates an empty response.
    pub fn new(status_code: StatusCode, diagnostics: DiagnosticsContext) -> Self {
        Self {
            status_code,
            headers: Headers::new(),
            content: None,
            error: None,
            diagnostics,
        }
    }

    /// Creates a content-less response that owns an existing error.
    pub fn from_error(error: Arc<CosmosError>) -> Self {
        Self {
            status_code: error.status_code(),
            headers: error.headers().clone(),
            content: None,
            diagnostics: error.diagnostics().clone(),
            error: Some(error),
        }
    }

    /// Sets the headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the body.
    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Attaches an error.
    pub fn with_error(mut self, error: Arc<CosmosError>) -> Self {
        self.error = Some(error);
        self
    }

    /// Replaces the body after construction.
    pub fn set_content(&mut self, content: Option<Bytes>) {
        self.content = content;
    }

    /// Status code.
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }

    /// Headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Body.
    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    /// Previously attached error.
    pub fn error(&self) -> Option<&Arc<CosmosError>> {
        self.error.as_ref()
    }

    /// Diagnostics of the request.
    pub fn diagnostics(&self) -> &DiagnosticsContext {
        &self.diagnostics
    }
}

/// Kind of operation a store request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    /// Point read.
    Read,
    /// Feed read.
    ReadFeed,
    /// Query.
    Query,
    /// Create.
    Create,
    /// Replace.
    Replace,
    /// Upsert.
    Upsert,
    /// Patch.
    Patch,
    /// Delete.
    Delete,
}

/// Request sent on the direct store path.
#[derive(Debug, Clone)]
pub struct DocumentServiceRequest {
    operation: OperationType,
    resource_address: String,
    diagnostics: DiagnosticsContext,
}

impl DocumentServiceRequest {
    /// Creates a request.
    pub fn new(
        operation: OperationType,
        resource_address: impl Into<String>,
        diagnostics: DiagnosticsContext,
    ) -> Self {
        Self {
            operation,
            resource_address: resource_address.into(),
            diagnostics,
        }
    }

    /// Operation type.
    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Target resource.
    pub fn resource_address(&self) -> &str {
        &self.resource_address
    }

    /// Diagnostics of the request.
    pub fn diagnostics(&self) -> &DiagnosticsContext {
        &self.diagnostics
    }
}

/// Raw response on the direct store path.
#[derive(Debug, Clone)]
pub struct StoreResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl StoreResponse {
    /// Creates a store response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Option<Bytes>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Native headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("channel closed")]
    struct ChannelClosed(#[source] TransportError);

    #[test]
    fn test_transport_failure_detection() {
        let fault = RequestFault::from_transport(TransportError::Timeout("idle".into()));
        assert!(fault.is_transport_failure());
        assert!(fault.status_code().is_none());

        let nested = RequestFault::new("closed")
            .with_source(ChannelClosed(TransportError::Network("rst".into())));
        assert!(nested.is_transport_failure());

        let plain = RequestFault::new("bug").with_source(std::fmt::Error);
        assert!(!plain.is_transport_failure());
    }

    #[test]
    fn test_fault_from_reqwest_error() {
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let fault = RequestFault::from(err);

        assert!(fault.is_transport_failure());
        assert!(fault.status_code().is_none());
        let error = crate::errors::from_request_fault(&fault, &DiagnosticsContext::disabled());
        assert_eq!(error.status_code(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_fault_header_accessors() {
        let mut headers = Headers::new();
        headers.set_sub_status(1002);
        headers.set_activity_id("a-1");
        headers.set_request_charge(3.0);

        let fault = RequestFault::new("gone")
            .with_status(StatusCode::GONE)
            .with_headers(headers);

        assert_eq!(fault.status_code(), Some(StatusCode::GONE));
        assert_eq!(fault.sub_status(), 1002);
        assert_eq!(fault.activity_id(), Some("a-1"));
        assert_eq!(fault.request_charge(), 3.0);
    }

    #[test]
    fn test_response_from_error_has_no_content() {
        let error = crate::errors::create_error(crate::errors::ErrorDetails::new(
            StatusCode::CONFLICT,
            "exists",
            DiagnosticsContext::disabled(),
        ));
        let response = ResponseMessage::from_error(Arc::new(error));

        assert!(response.content().is_none());
        assert!(!response.is_success());
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
    }
}
