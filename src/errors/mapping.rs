//! Normalization of failure signals into typed errors.
//!
//! Three shapes of failure reach this module: a [`RequestFault`] from the
//! document client layer, a [`ResponseMessage`] from the gateway path and
//! a [`StoreResponse`] from the direct store path. Each is reduced to an
//! [`ErrorDetails`] payload and handed to [`create_error`], which alone
//! decides the variant.

use super::message::extract_error;
use super::{CosmosError, ErrorDetails, NormalizeError};
use crate::diagnostics::DiagnosticsContext;
use crate::headers::Headers;
use crate::transport::{DocumentServiceRequest, RequestFault, ResponseMessage, StoreResponse};
use reqwest::StatusCode;
use std::io::Cursor;
use std::panic::Location;
use std::sync::Arc;
use tracing::debug;

/// Builds the typed error for a payload.
///
/// The status code alone selects the variant:
///
/// | status | variant |
/// |--------|---------|
/// | 404 | `NotFound` |
/// | 500 | `InternalServerError` |
/// | 400 | `BadRequest` |
/// | 408 | `RequestTimeout` |
/// | 429 | `Throttled` |
/// | other | `Generic` |
///
/// The caller's location is recorded unless the payload already has one.
#[track_caller]
pub fn create_error(details: ErrorDetails) -> CosmosError {
    let details = match details.location() {
        Some(_) => details,
        None => details.with_location(Location::caller()),
    };

    debug!(
        status = details.status_code().as_u16(),
        sub_status = details.sub_status_code(),
        activity_id = details.activity_id().unwrap_or_default(),
        "Normalized service error"
    );

    let details = Box::new(details);
    match details.status_code().as_u16() {
        404 => CosmosError::NotFound(details),
        500 => CosmosError::InternalServerError(details),
        400 => CosmosError::BadRequest(details),
        408 => CosmosError::RequestTimeout(details),
        429 => CosmosError::Throttled(details),
        _ => CosmosError::Generic(details),
    }
}

/// Converts a document client fault.
///
/// Without an explicit status code, a fault caused by the transport is a
/// request timeout and anything else is an internal server error. Headers
/// are copied as-is and the fault becomes the error's cause.
#[track_caller]
pub fn from_request_fault(fault: &RequestFault, diagnostics: &DiagnosticsContext) -> CosmosError {
    let status_code = fault.status_code().unwrap_or_else(|| {
        if fault.is_transport_failure() {
            StatusCode::REQUEST_TIMEOUT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    });

    let details = ErrorDetails::from_headers(
        status_code,
        fault.message(),
        fault.headers().clone(),
        diagnostics.clone(),
    )
    .with_cause(Arc::new(fault.clone()));

    create_error(details)
}

/// Converts a gateway response.
///
/// A response without a body, or with an empty one, that already owns an
/// error returns that same error. Otherwise the body message is merged with the existing
/// error's message as `"Error Message: {existing}; Content {body};"`
/// when both are present.
#[track_caller]
pub fn from_response(response: &ResponseMessage) -> Result<Arc<CosmosError>, NormalizeError> {
    if response.content().map_or(true, |c| c.is_empty()) {
        if let Some(existing) = response.error() {
            return Ok(Arc::clone(existing));
        }
    }

    let existing_message = response
        .error()
        .map(|e| e.message().to_string())
        .filter(|m| !m.is_empty());
    let extracted = extract_error(response.content().cloned().map(Cursor::new))?;

    let message = match (existing_message, extracted.message) {
        (Some(existing), Some(content)) => {
            format!("Error Message: {existing}; Content {content};")
        }
        (existing, content) => content.or(existing).unwrap_or_default(),
    };

    let mut details = ErrorDetails::from_headers(
        response.status_code(),
        message,
        response.headers().clone(),
        response.diagnostics().clone(),
    );
    if let Some(document) = extracted.document {
        details = details.with_error_document(document);
    }
    if let Some(existing) = response.error() {
        let cause: Arc<dyn std::error::Error + Send + Sync> = existing.clone();
        details = details.with_cause(cause);
    }

    Ok(Arc::new(create_error(details)))
}

/// Converts a raw store response and the request that produced it.
#[track_caller]
pub fn from_store_response(
    response: &StoreResponse,
    request: &DocumentServiceRequest,
) -> Result<CosmosError, NormalizeError> {
    let extracted = extract_error(response.body().cloned().map(Cursor::new))?;
    let headers = Headers::from_native(response.headers());

    debug!(
        operation = ?request.operation(),
        resource = request.resource_address(),
        status = response.status().as_u16(),
        "Store request failed"
    );

    let mut details = ErrorDetails::from_headers(
        response.status(),
        extracted.message.unwrap_or_default(),
        headers,
        request.diagnostics().clone(),
    );
    if let Some(document) = extracted.document {
        details = details.with_error_document(document);
    }

    Ok(create_error(details))
}
