//! Redis Backend Integration Tests
//!
//! These tests require a running Redis instance and are skipped otherwise.
//!
//! ## Quick Start
//!
//! ```bash
//! docker run --rm -p 6379:6379 redis:7
//! cargo test --features redis --test redis_integration_test
//! ```
//!
//! ## Environment Variables
//!
//! - `TEST_REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
//!
//! ## What's Tested
//!
//! 1. Connection, health check and durable mode selection
//! 2. Document insert/get/replace/delete and newest-first scans
//! 3. Unique index claims, moves and releases
//! 4. Store-level CRUD, derivation and embedded children on the durable backend
//! 5. Concurrent unique claims through the connection pool
//! 6. Compare-and-set writes: stale writes rejected, deleted documents stay gone

#![cfg(feature = "redis")]

use chrono::{Duration as ChronoDuration, Utc};
use crm_store::backend::{DocumentBackend, DocumentRecord, RedisBackend};
use crm_store::model::{
    CustomerFilter, CustomerInput, InvoiceInput, LineItemInput, NoteInput, QueryInput, UniqueKey,
};
use crm_store::{BackendMode, Error, PageRequest, Store, StoreBackend, StoreConfig};
use std::env;
use std::time::Duration;

/// Helper: Get Redis connection URL from environment or use default
fn get_redis_url() -> String {
    env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Helper: Fresh namespace so tests never see each other's keys.
fn namespace() -> String {
    format!("crmtest{}", crm_store::id::generate())
}

/// Helper: Create a test Redis backend in its own namespace
async fn create_test_backend() -> Option<RedisBackend> {
    let backend = RedisBackend::from_connection_string(&get_redis_url(), 4, &namespace())
        .await
        .ok()?;
    match backend.health_check().await {
        Ok(true) => Some(backend),
        _ => {
            println!("Skipping: Redis not available at {}", get_redis_url());
            None
        }
    }
}

fn record(id: &str, created_at: i64, email: Option<&str>) -> DocumentRecord {
    DocumentRecord {
        id: id.to_string(),
        created_at,
        unique: email
            .map(|e| vec![UniqueKey::new("email", e)])
            .unwrap_or_default(),
        body: format!("{{\"_id\":\"{}\"}}", id).into_bytes(),
    }
}

// =============================================================================
// Test 1: Document operations
// =============================================================================

#[tokio::test]
async fn test_redis_document_roundtrip() {
    let Some(backend) = create_test_backend().await else {
        return;
    };

    backend
        .insert("customers", record("a", 1, Some("a@x.io")))
        .await
        .expect("Failed to insert");
    backend
        .insert("customers", record("b", 2, Some("b@x.io")))
        .await
        .expect("Failed to insert");

    let body = backend.get("customers", "a").await.unwrap().expect("stored");
    assert_eq!(body, b"{\"_id\":\"a\"}".to_vec());
    assert!(backend.get("customers", "zzz").await.unwrap().is_none());
    assert_eq!(backend.count("customers").await.unwrap(), 2);

    let scanned = backend.scan("customers").await.unwrap();
    assert_eq!(scanned[0], b"{\"_id\":\"b\"}".to_vec());

    assert!(backend.delete("customers", "a").await.unwrap());
    assert!(!backend.delete("customers", "a").await.unwrap());
    assert!(!backend.exists("customers", "a").await.unwrap());

    backend.clear_all().await.expect("Failed to clear");
    assert_eq!(backend.count("customers").await.unwrap(), 0);
}

// =============================================================================
// Test 2: Unique indexes
// =============================================================================

#[tokio::test]
async fn test_redis_unique_index() {
    let Some(backend) = create_test_backend().await else {
        return;
    };

    backend
        .insert("customers", record("a", 1, Some("same@x.io")))
        .await
        .unwrap();
    let err = backend
        .insert("customers", record("b", 2, Some("same@x.io")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { ref field, .. } if field == "email"));
    assert!(!backend.exists("customers", "b").await.unwrap());

    // Moving "a" to a new email frees the old one.
    assert!(backend
        .replace("customers", record("a", 1, Some("moved@x.io")))
        .await
        .unwrap());
    backend
        .insert("customers", record("b", 2, Some("same@x.io")))
        .await
        .expect("released key can be claimed");

    // Replacing a missing document reports false and claims nothing.
    assert!(!backend
        .replace("customers", record("ghost", 3, Some("ghost@x.io")))
        .await
        .unwrap());
    backend
        .insert("customers", record("c", 4, Some("ghost@x.io")))
        .await
        .expect("key not left claimed");

    backend.clear_all().await.unwrap();
}

// =============================================================================
// Test 3: Store on the durable backend
// =============================================================================

#[tokio::test]
async fn test_store_durable_end_to_end() {
    let config = StoreConfig::default()
        .with_database_url(get_redis_url())
        .with_namespace(namespace())
        .with_probe_timeout(Duration::from_secs(2));
    let store = Store::connect(&config).await;
    if store.mode() != BackendMode::Durable {
        println!("Skipping: Redis not available");
        return;
    }

    let c = store
        .customers()
        .create(CustomerInput::new("Dur", "dur@example.com"))
        .await
        .unwrap();
    let err = store
        .customers()
        .create(CustomerInput::new("Dup", "DUR@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 409);

    let mut input = InvoiceInput::new("INV-R1", &c.id, Utc::now() + ChronoDuration::days(7));
    input.line_items = vec![
        LineItemInput::new("A", 2.0, 50.0),
        LineItemInput::new("B", 1.0, 30.0),
    ];
    input.tax_rate = Some(10.0);
    input.discount = Some(5.0);
    let inv = store.invoices().create(input).await.unwrap();
    assert_eq!(inv.total, 138.0);

    let fetched = store.invoices().get(&inv.id).await.unwrap();
    assert_eq!(fetched, inv);

    let q = store
        .queries()
        .create(QueryInput::new(&c.id, "durable question"))
        .await
        .unwrap();
    let note = store
        .queries()
        .add_child(&q.id, NoteInput::new("first"))
        .await
        .unwrap();
    store.queries().remove_child(&q.id, &note.id).await.unwrap();
    assert!(store.queries().list_children(&q.id).await.unwrap().is_empty());

    let page = store
        .customers()
        .list(&CustomerFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    store.backend().clear_all().await.unwrap();
}

// =============================================================================
// Test 4: Concurrency through the pool
// =============================================================================

#[tokio::test]
async fn test_redis_concurrent_unique_claims() {
    let Some(backend) = create_test_backend().await else {
        return;
    };
    let store = Store::new(StoreBackend::Durable(backend));

    let mut handles = Vec::new();
    for i in 0..12 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .customers()
                .create(CustomerInput::new(format!("Racer {}", i), "race@example.com"))
                .await
        }));
    }

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(Error::Conflict { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(won, 1);

    store.backend().clear_all().await.unwrap();
}

// =============================================================================
// Test 5: Compare-and-set writes
// =============================================================================

#[tokio::test]
async fn test_redis_replace_after_delete_stays_gone() {
    let Some(backend) = create_test_backend().await else {
        return;
    };

    backend
        .insert("customers", record("a", 1, Some("gone@x.io")))
        .await
        .unwrap();
    assert!(backend.delete("customers", "a").await.unwrap());

    assert!(!backend
        .replace("customers", record("a", 1, Some("back@x.io")))
        .await
        .unwrap());
    assert!(!backend
        .modify("customers", "a", |_| Ok(record("a", 1, None)))
        .await
        .unwrap());
    assert!(!backend.exists("customers", "a").await.unwrap());
    assert_eq!(backend.count("customers").await.unwrap(), 0);

    // Neither the old nor the attempted key is left claimed.
    backend
        .insert("customers", record("b", 2, Some("gone@x.io")))
        .await
        .expect("old key released");
    backend
        .insert("customers", record("c", 3, Some("back@x.io")))
        .await
        .expect("attempted key released");

    backend.clear_all().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_redis_concurrent_note_additions() {
    let Some(backend) = create_test_backend().await else {
        return;
    };
    let store = Store::new(StoreBackend::Durable(backend));
    let c = store
        .customers()
        .create(CustomerInput::new("Busy", "busy@example.com"))
        .await
        .unwrap();
    let q = store
        .queries()
        .create(QueryInput::new(&c.id, "many hands"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..24 {
        let store = store.clone();
        let id = q.id.clone();
        handles.push(tokio::spawn(async move {
            // Lost compare-and-set races are the caller's to retry.
            loop {
                match store
                    .queries()
                    .add_child(&id, NoteInput::new(format!("note {}", i)))
                    .await
                {
                    Err(Error::WriteConflict { .. }) => tokio::task::yield_now().await,
                    other => return other,
                }
            }
        }));
    }

    let mut acknowledged = Vec::new();
    for handle in handles {
        acknowledged.push(handle.await.unwrap().expect("Failed to add note").id);
    }

    let notes = store.queries().list_children(&q.id).await.unwrap();
    assert_eq!(notes.len(), 24);
    for id in &acknowledged {
        assert!(notes.iter().any(|n| &n.id == id), "note {} lost", id);
    }

    store.backend().clear_all().await.unwrap();
}
