//! Error types for the store.

use crate::summarize::SummaryError;
use serde::Serialize;
use std::fmt;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Dotted path of the offending field (e.g. `address.country`, `lineItems[1].quantity`).
    pub field: String,
    /// Human readable reason.
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldViolation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Error types for the store.
///
/// Every store operation returns `Result<T>`. `Conflict`, `NotFound` and
/// `ChildNotFound` are always propagated verbatim so the route layer can map
/// them onto HTTP statuses (see [`Error::http_status`]).
#[derive(Debug, Clone)]
pub enum Error {
    /// One or more fields violate the entity schema.
    ///
    /// Raised for malformed input and for derived-invariant violations
    /// detected after derivation, such as a negative computed invoice total.
    Validation(Vec<FieldViolation>),

    /// A unique index rejected the write.
    ///
    /// Raised by `create`/`update` when e.g. a customer email or an invoice
    /// number is already taken by another document.
    Conflict {
        collection: String,
        field: String,
        value: String,
    },

    /// Another writer changed the document between read and write.
    ///
    /// Nothing was written. **Recovery:** re-run the operation.
    WriteConflict { collection: String, id: String },

    /// The addressed document does not exist.
    NotFound { collection: String, id: String },

    /// The parent exists but holds no child with the given id.
    ChildNotFound {
        collection: String,
        parent_id: String,
        child: String,
        child_id: String,
    },

    /// No backend could serve the request.
    ///
    /// The volatile backend is always available as last resort, so this only
    /// surfaces when a durable backend is forced and turns out unreachable.
    Unavailable(String),

    /// The summarization collaborator failed.
    Summary(SummaryError),

    /// Encoding a document for storage failed.
    SerializationError(String),

    /// A stored document could not be decoded.
    ///
    /// Indicates a corrupted record or a record written by an incompatible schema.
    DeserializationError(String),

    /// Backend storage error (connection lost, protocol error, pool exhausted).
    ///
    /// **Recovery:** the store never retries; the caller decides.
    BackendError(String),

    /// Operation exceeded a configured timeout.
    Timeout(String),

    /// Invalid configuration (bad connection string, bad pool size).
    ConfigError(String),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// Shorthand for a single-field validation error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(vec![FieldViolation::new(field, message)])
    }

    pub fn write_conflict(collection: &str, id: &str) -> Self {
        Error::WriteConflict {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        Error::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// HTTP status the route layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Conflict { .. } | Error::WriteConflict { .. } => 409,
            Error::NotFound { .. } | Error::ChildNotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Field violations carried by a validation error, if any.
    pub fn violations(&self) -> Option<&[FieldViolation]> {
        match self {
            Error::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(violations) => {
                let joined: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                write!(f, "Validation error: {}", joined.join("; "))
            }
            Error::Conflict {
                collection,
                field,
                value,
            } => write!(
                f,
                "Conflict: {} with {} '{}' already exists",
                collection, field, value
            ),
            Error::WriteConflict { collection, id } => write!(
                f,
                "Write conflict: {} '{}' changed concurrently",
                collection, id
            ),
            Error::NotFound { collection, id } => {
                write!(f, "Not found: {} '{}'", collection, id)
            }
            Error::ChildNotFound {
                collection,
                parent_id,
                child,
                child_id,
            } => write!(
                f,
                "Not found: {} '{}' in {} '{}'",
                child, child_id, collection, parent_id
            ),
            Error::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
            Error::Summary(e) => write!(f, "Summary error: {}", e),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() || e.is_data() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<SummaryError> for Error {
    fn from(e: SummaryError) -> Self {
        Error::Summary(e)
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid("email", "is required");
        assert_eq!(err.to_string(), "Validation error: email: is required");
    }

    #[test]
    fn test_conflict_names_field() {
        let err = Error::Conflict {
            collection: "customers".to_string(),
            field: "email".to_string(),
            value: "a@b.io".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Conflict: customers with email 'a@b.io' already exists"
        );
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(Error::invalid("name", "too long").http_status(), 400);
        assert_eq!(Error::not_found("invoices", "x").http_status(), 404);
        assert_eq!(
            Error::ChildNotFound {
                collection: "queries".to_string(),
                parent_id: "q".to_string(),
                child: "note".to_string(),
                child_id: "n".to_string(),
            }
            .http_status(),
            404
        );
        assert_eq!(Error::BackendError("down".into()).http_status(), 500);
        assert_eq!(Error::write_conflict("queries", "q").http_status(), 409);
        assert_eq!(
            Error::Summary(SummaryError::RateLimited("slow down".into())).http_status(),
            500
        );
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "test error".into();
        assert!(matches!(err, Error::Other(_)));
    }
}
