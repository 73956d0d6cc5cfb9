//! Document encoding for storage.
//!
//! Bodies are stored as the JSON form of the document, the same shape clients
//! see, so a record read from either backend decodes identically.

use crate::backend::DocumentRecord;
use crate::error::{Error, Result};
use crate::model::Document;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a value for storage.
///
/// # Errors
/// Returns `Error::SerializationError` if the value cannot be encoded.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::SerializationError(e.to_string()))
}

/// Deserialize a stored body.
///
/// # Errors
/// Returns `Error::DeserializationError` if the bytes are not a valid `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::DeserializationError(e.to_string()))
}

/// Build the backend record of a document.
pub fn record<T: Document>(doc: &T) -> Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: doc.id().to_string(),
        created_at: doc.created_at().timestamp_millis(),
        unique: doc.unique_keys(),
        body: encode(doc)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Customer, CustomerInput, UniqueKey};
    use chrono::Utc;

    #[test]
    fn test_record_carries_index_metadata() {
        let now = Utc::now();
        let customer =
            Customer::from_input("c1".into(), CustomerInput::new("Jane", "JANE@x.io"), now)
                .unwrap();
        let rec = record(&customer).unwrap();
        assert_eq!(rec.id, "c1");
        assert_eq!(rec.created_at, now.timestamp_millis());
        assert_eq!(rec.unique, vec![UniqueKey::new("email", "jane@x.io")]);

        let back: Customer = decode(&rec.body).unwrap();
        assert_eq!(back, customer);
    }

    #[test]
    fn test_corrupted_body_rejected() {
        let result: Result<Customer> = decode(b"{\"_id\": 1");
        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }
}
