//! Classification of faults raised while fetching a page.

use crate::diagnostics::DiagnosticsContext;
use crate::errors::{from_request_fault, BoxError, CosmosError};
use crate::transport::RequestFault;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Several faults raised together by a batched operation.
#[derive(Debug, Error)]
#[error("{} fault(s) occurred while fetching a page", .faults.len())]
pub struct AggregateFault {
    faults: Vec<BoxError>,
}

impl AggregateFault {
    /// Creates an aggregate of the given faults.
    pub fn new(faults: Vec<BoxError>) -> Self {
        Self { faults }
    }

    /// Creates an aggregate of a single fault.
    pub fn single<E>(fault: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(vec![Box::new(fault) as BoxError])
    }

    /// The wrapped faults.
    pub fn faults(&self) -> &[BoxError] {
        &self.faults
    }

    /// The first wrapped fault, which is treated as the inner cause.
    pub fn inner(&self) -> Option<&(dyn StdError + 'static)> {
        self.faults
            .first()
            .map(|f| &**f as &(dyn StdError + 'static))
    }
}

/// What a raised fault turned out to be.
#[derive(Debug)]
pub enum FaultClass<'a> {
    /// A document client fault.
    Request(&'a RequestFault),
    /// An already typed error.
    Typed(&'a CosmosError),
    /// A batch of faults.
    Aggregate(&'a AggregateFault),
    /// Anything else.
    Unrecognized,
}

/// Classifies a fault. Recognition is attempted in declaration order of
/// [`FaultClass`].
pub fn classify_fault<'a>(fault: &'a (dyn StdError + 'static)) -> FaultClass<'a> {
    if let Some(request) = fault.downcast_ref::<RequestFault>() {
        return FaultClass::Request(request);
    }
    if let Some(typed) = fault.downcast_ref::<CosmosError>() {
        return FaultClass::Typed(typed);
    }
    if let Some(typed) = fault.downcast_ref::<Arc<CosmosError>>() {
        return FaultClass::Typed(typed.as_ref());
    }
    if let Some(aggregate) = fault.downcast_ref::<AggregateFault>() {
        return FaultClass::Aggregate(aggregate);
    }
    FaultClass::Unrecognized
}

/// Converts a fault into a typed error, if it can be recognized.
///
/// Aggregates are unwrapped through their inner cause.
pub fn normalize_fault(
    fault: &(dyn StdError + 'static),
    diagnostics: &DiagnosticsContext,
) -> Option<CosmosError> {
    match classify_fault(fault) {
        FaultClass::Request(request) => Some(from_request_fault(request, diagnostics)),
        FaultClass::Typed(typed) => Some(typed.clone()),
        FaultClass::Aggregate(aggregate) => aggregate
            .inner()
            .and_then(|inner| normalize_fault(inner, diagnostics)),
        FaultClass::Unrecognized => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{create_error, ErrorDetails, ErrorKind, TransportError};
    use reqwest::StatusCode;

    #[test]
    fn test_classify_order() {
        let request = RequestFault::new("x");
        assert!(matches!(classify_fault(&request), FaultClass::Request(_)));

        let typed = create_error(ErrorDetails::new(
            StatusCode::NOT_FOUND,
            "missing",
            DiagnosticsContext::disabled(),
        ));
        assert!(matches!(classify_fault(&typed), FaultClass::Typed(_)));

        let aggregate = AggregateFault::single(RequestFault::new("y"));
        assert!(matches!(classify_fault(&aggregate), FaultClass::Aggregate(_)));

        let other = std::fmt::Error;
        assert!(matches!(classify_fault(&other), FaultClass::Unrecognized));
    }

    #[test]
    fn test_aggregate_unwraps_inner_cause() {
        let aggregate = AggregateFault::single(RequestFault::from_transport(
            TransportError::Timeout("slow".into()),
        ));
        let error = normalize_fault(&aggregate, &DiagnosticsContext::disabled()).unwrap();
        assert_eq!(error.kind(), ErrorKind::RequestTimeout);
    }

    #[test]
    fn test_aggregate_uses_first_fault() {
        let aggregate = AggregateFault::new(vec![
            Box::new(RequestFault::new("first").with_status(StatusCode::NOT_FOUND)) as BoxError,
            Box::new(RequestFault::new("second").with_status(StatusCode::BAD_REQUEST)),
        ]);
        assert_eq!(aggregate.faults().len(), 2);
        assert_eq!(aggregate.to_string(), "2 fault(s) occurred while fetching a page");

        let error = normalize_fault(&aggregate, &DiagnosticsContext::disabled()).unwrap();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.message(), "first");
    }

    #[test]
    fn test_nested_aggregate() {
        let inner = AggregateFault::single(
            RequestFault::new("throttled").with_status(StatusCode::TOO_MANY_REQUESTS),
        );
        let outer = AggregateFault::single(inner);
        let error = normalize_fault(&outer, &DiagnosticsContext::disabled()).unwrap();
        assert_eq!(error.kind(), ErrorKind::Throttled);
    }

    #[test]
    fn test_unclassifiable_aggregate() {
        let aggregate = AggregateFault::single(std::fmt::Error);
        assert!(normalize_fault(&aggregate, &DiagnosticsContext::disabled()).is_none());

        let empty = AggregateFault::new(Vec::new());
        assert!(empty.faults().is_empty());
        assert!(normalize_fault(&empty, &DiagnosticsContext::disabled()).is_none());
    }
}
