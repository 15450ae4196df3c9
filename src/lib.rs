//! Cosmos DB Client Core
//!
//! This crate turns the failure signals produced while talking to a Cosmos
//! DB service into one typed error taxonomy, captures per-request
//! diagnostics, and drives query pagination so that expected service
//! failures surface as data instead of raised faults.
//!
//! # Features
//!
//! - **Error Normalization**: Transport faults, gateway responses and raw
//!   store responses all become a [`CosmosError`] chosen by status code
//! - **Diagnostics**: Timed scopes, service exchanges and query pages
//!   recorded into a shareable [`DiagnosticsContext`]
//! - **Pagination**: A [`PageIterator`] that yields one typed
//!   [`PageOutcome`] per fetch
//!
//! # Example
//!
//! ```no_run
//! use integrations_cosmos::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example<C>(context: C) -> Result<(), Box<dyn std::error::Error>>
//! # where
//! #     C: QueryExecutionContext,
//! # {
//! let config = CosmosConfig::builder().build()?;
//! let mut pages = PageIterator::new(context, config.page_iterator_options("QueryItems"));
//! let cancel = CancellationToken::new();
//!
//! while pages.has_more() {
//!     match pages.advance(&cancel).await? {
//!         PageOutcome::Success(page) => println!("{} items", page.item_count),
//!         PageOutcome::Failure(failed) => println!("failed: {}", failed.error),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod headers;
pub mod pagination;
pub mod transport;

// Re-exports for convenience
pub use config::{CosmosConfig, CosmosConfigBuilder};
pub use diagnostics::{DiagnosticScope, DiagnosticsContext};
pub use errors::{CosmosError, CosmosResult, ErrorDetails, ErrorKind, PageError};
pub use headers::Headers;
pub use pagination::{PageIterator, PageOutcome, QueryExecutionContext, QueryPage};

/// Prelude module with commonly used types and traits.
///
/// ```no_run
/// use integrations_cosmos::prelude::*;
/// ```
pub mod prelude {
    // Configuration
    pub use crate::config::{
        ContentSerializationFormat, CosmosConfig, CosmosConfigBuilder, SerializationOptions,
    };

    // Diagnostics
    pub use crate::diagnostics::{
        DiagnosticEvent, DiagnosticScope, DiagnosticsContext, DiagnosticsSnapshot,
        PointOperationStatistics, QueryPageDiagnostics,
    };

    // Errors
    pub use crate::errors::{
        create_error, from_request_fault, from_response, from_store_response, BoxError,
        CosmosError, CosmosResult, ErrorDetails, ErrorKind, NormalizeError, PageError,
    };

    // Headers
    pub use crate::headers::Headers;

    // Pagination
    pub use crate::pagination::{
        AggregateFault, Continuation, FailedPage, PageFailure, PageIterator,
        PageIteratorOptions, PageOutcome, PageResult, PageSuccess, QueryExecutionContext,
        QueryPage,
    };

    // Transport
    pub use crate::transport::{
        DocumentServiceRequest, OperationType, RequestFault, ResponseMessage, StoreResponse,
    };
}
