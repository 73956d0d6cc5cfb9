//! Response envelopes for the HTTP route layer.
//!
//! Success: `{ "data": ..., "pagination"?: {...} }`.
//! Failure: `{ "error": "...", "errors"?: [{ "field", "message" }] }`.

use crate::error::{Error, FieldViolation};
use crate::page::{Page, Pagination};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        DataResponse {
            data,
            pagination: None,
        }
    }
}

impl<T> From<Page<T>> for DataResponse<Vec<T>> {
    fn from(page: Page<T>) -> Self {
        let pagination = page.pagination();
        DataResponse {
            data: page.items,
            pagination: Some(pagination),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldViolation>>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorResponse {
            error: message.into(),
            errors: None,
        }
    }
}

impl From<&Error> for ErrorResponse {
    fn from(e: &Error) -> Self {
        match e {
            Error::Validation(violations) => ErrorResponse {
                error: "Validation failed".to_string(),
                errors: Some(violations.clone()),
            },
            // Internal failure details stay in the logs.
            _ if e.http_status() == 500 => ErrorResponse::new("Internal server error"),
            _ => ErrorResponse::new(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageRequest;
    use serde_json::json;

    #[test]
    fn test_data_envelope_with_pagination() {
        let page = Page::slice(vec!["a", "b", "c"], PageRequest::new(1, 2));
        let v = serde_json::to_value(DataResponse::from(page)).unwrap();
        assert_eq!(v["data"], json!(["a", "b"]));
        assert_eq!(v["pagination"]["totalPages"], 2);
        assert_eq!(v["pagination"]["hasNext"], true);
    }

    #[test]
    fn test_data_envelope_without_pagination() {
        let v = serde_json::to_value(DataResponse::new(json!({"_id": "x"}))).unwrap();
        assert_eq!(v, json!({"data": {"_id": "x"}}));
    }

    #[test]
    fn test_error_envelopes() {
        let v = serde_json::to_value(ErrorResponse::from(&Error::invalid("email", "is required")))
            .unwrap();
        assert_eq!(
            v,
            json!({
                "error": "Validation failed",
                "errors": [{"field": "email", "message": "is required"}]
            })
        );

        let v = serde_json::to_value(ErrorResponse::from(&Error::not_found("customers", "c9")))
            .unwrap();
        assert_eq!(v, json!({"error": "Not found: customers 'c9'"}));

        let v = serde_json::to_value(ErrorResponse::from(&Error::BackendError(
            "pool exhausted".into(),
        )))
        .unwrap();
        assert_eq!(v, json!({"error": "Internal server error"}));
    }
}
