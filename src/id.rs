//! Identity generation for documents and embedded child records.
//!
//! Ids are UUIDv7 rendered as 32 lowercase hex characters. Version 7 ids carry
//! a millisecond timestamp followed by a monotonic counter and random bits, so
//! ids allocated concurrently within one process never collide and sort by
//! allocation time. Callers must treat them as opaque strings.

use uuid::Uuid;

/// Allocate a fresh id.
pub fn generate() -> String {
    Uuid::now_v7().simple().to_string()
}
