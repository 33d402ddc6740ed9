//! Backend-level error type shared by every public operation.
//!
//! # Responsibility
//! - Classify failures into the kinds callers can act on.
//! - Wrap transport-layer errors without losing the NotFound distinction.
//!
//! # Invariants
//! - A CAS NotFound converts to `StoreError::NotFound`; every other CAS
//!   failure converts to `StoreError::Cas`.
//! - Errors captured by write-back workers are re-surfaced unchanged through
//!   the rethrow gate.

use crate::cas::CasError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for all public backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Backend error for configuration, codec, workspace and CAS failures.
#[derive(Debug)]
pub enum StoreError {
    /// Malformed backend URI string.
    BadUri(String),
    /// Unparseable CAS object or textual atom/value form.
    BadEncoding(String),
    /// A key or CID was absent where presence was required.
    NotFound(String),
    /// The workspace contradicts the identity cache.
    InvariantViolation(String),
    /// CAS client failure other than NotFound.
    Cas(CasError),
    /// Operation the backend does not support.
    NotImplemented(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadUri(details) => write!(f, "bad backend URI: {details}"),
            Self::BadEncoding(details) => write!(f, "bad encoding: {details}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::InvariantViolation(details) => {
                write!(f, "workspace invariant violation: {details}")
            }
            Self::Cas(err) => write!(f, "CAS failure: {err}"),
            Self::NotImplemented(what) => write!(f, "not implemented: {what}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Cas(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CasError> for StoreError {
    fn from(value: CasError) -> Self {
        match value {
            CasError::NotFound(path) => Self::NotFound(path),
            other => Self::Cas(other),
        }
    }
}
