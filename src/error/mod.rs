//! Error handling for export operations.
//!
//! This module provides:
//! - The export error taxonomy (`ExportError`) and the crate-wide `Result`
//! - A structured model of backend error bodies and client failure chains
//! - Classification of backend failures into the taxonomy
//!
//! # Example
//!
//! ```rust
//! use search_export::error::{classify_failure, ErrorInfo, ExportError, FailureCause};
//!
//! let failure = FailureCause::timeout("no response within 30s")
//!     .wrapped_in("Failed to execute search request");
//!
//! let err = classify_failure(&failure, ErrorInfo::from_body);
//! assert!(matches!(err, ExportError::Unavailable(_)));
//! ```

pub mod backend;
pub mod kinds;

// Re-export commonly used types
pub use backend::{
    ErrorBody, ErrorCause, ErrorInfo, FailureCause, FailureKind, ParsedBackendException,
    RootCause, classify_envelope, classify_failure,
};
pub use kinds::{ConfigError, ExportError, Result};
