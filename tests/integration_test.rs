//! Integration tests for crm-store
//!
//! These tests drive the public store API end to end on the volatile backend.

use chrono::{Duration, Utc};
use crm_store::model::{
    AddressInput, Customer, CustomerFilter, CustomerInput, CustomerPatch, CustomerStatus,
    Invoice, InvoiceFilter, InvoiceInput, InvoicePatch, InvoiceStatus, LineItemInput, NoteInput,
    NotePatch, Query, QueryFilter, QueryInput, QueryPatch, QueryStatus, SortOrder,
};
use crm_store::{BackendMode, DataResponse, Error, PageRequest, Store};
use std::time::Duration as StdDuration;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn customer(store: &Store, name: &str, email: &str) -> Customer {
    store
        .customers()
        .create(CustomerInput::new(name, email))
        .await
        .expect("Failed to create customer")
}

/// Test 1: Customer CRUD
///
/// Create, read, update, list, and delete one customer.
#[tokio::test]
async fn test_customer_crud() {
    init_logger();
    let store = Store::in_memory();
    assert_eq!(store.mode(), BackendMode::Volatile);

    let mut input = CustomerInput::new("  Jane Doe ", "Jane@Example.COM");
    input.address = Some(AddressInput {
        street: Some("1 Main St".into()),
        city: Some("Springfield".into()),
        state: Some("IL".into()),
        zip_code: Some("62701".into()),
        country: None,
    });
    let created = store.customers().create(input).await.unwrap();
    assert_eq!(created.name, "Jane Doe");
    assert_eq!(created.email, "jane@example.com");
    assert_eq!(created.status, CustomerStatus::Lead);
    assert_eq!(created.address.country, "United States");

    let view = store.customers().get_view(&created.id).await.unwrap();
    assert_eq!(
        view.full_address,
        "1 Main St, Springfield, IL 62701, United States"
    );

    // Let the clock move so updatedAt is observably bumped.
    tokio::time::sleep(StdDuration::from_millis(5)).await;
    let patch = CustomerPatch {
        status: Some(CustomerStatus::Active),
        company: Some("Acme".into()),
        ..Default::default()
    };
    let updated = store.customers().update(&created.id, patch).await.unwrap();
    assert_eq!(updated.status, CustomerStatus::Active);
    assert_eq!(updated.company.as_deref(), Some("Acme"));
    assert_eq!(updated.name, "Jane Doe");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);

    let page = store
        .customers()
        .list(&CustomerFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, created.id);

    store.customers().delete(&created.id).await.unwrap();
    let err = store.customers().get(&created.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    let err = store.customers().delete(&created.id).await.unwrap_err();
    assert_eq!(err.http_status(), 404);
}

/// Test 2: Unique indexes
///
/// Duplicate emails (case-insensitive) and invoice numbers are conflicts.
#[tokio::test]
async fn test_duplicate_unique_fields_conflict() {
    init_logger();
    let store = Store::in_memory();
    let jane = customer(&store, "Jane", "jane@example.com").await;

    let err = store
        .customers()
        .create(CustomerInput::new("Other Jane", "JANE@example.com"))
        .await
        .unwrap_err();
    match err {
        Error::Conflict { field, value, .. } => {
            assert_eq!(field, "email");
            assert_eq!(value, "jane@example.com");
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    // Moving another customer onto a taken email is a conflict too.
    let bob = customer(&store, "Bob", "bob@example.com").await;
    let err = store
        .customers()
        .update(
            &bob.id,
            CustomerPatch {
                email: Some("jane@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 409);

    // A freed email can be claimed again.
    store.customers().delete(&jane.id).await.unwrap();
    store
        .customers()
        .update(
            &bob.id,
            CustomerPatch {
                email: Some("jane@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let due = Utc::now() + Duration::days(30);
    store
        .invoices()
        .create(InvoiceInput::new("INV-7", &bob.id, due))
        .await
        .unwrap();
    let err = store
        .invoices()
        .create(InvoiceInput::new("INV-7", &bob.id, due))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { ref field, .. } if field == "invoiceNumber"));
}

/// Test 3: Invoice derivation
///
/// Line items [{2,50},{1,30}], tax 10%, discount 5 → 130 / 13 / 138.
#[tokio::test]
async fn test_invoice_totals_scenario() {
    init_logger();
    let store = Store::in_memory();
    let c = customer(&store, "Ann", "ann@example.com").await;

    let mut input = InvoiceInput::new("INV-001", &c.id, Utc::now() + Duration::days(14));
    input.line_items = vec![
        LineItemInput::new("Consulting", 2.0, 50.0).with_notes("phase one"),
        LineItemInput::new("Support", 1.0, 30.0),
    ];
    input.tax_rate = Some(10.0);
    input.discount = Some(5.0);

    let invoice = store.invoices().create(input).await.unwrap();
    assert_eq!(invoice.subtotal, 130.0);
    assert_eq!(invoice.tax_amount, 13.0);
    assert_eq!(invoice.total, 138.0);
    assert_eq!(invoice.customer_name.as_deref(), Some("Ann"));
    assert_eq!(invoice.customer_email.as_deref(), Some("ann@example.com"));
    assert_eq!(invoice.currency, "USD");

    let ids: Vec<_> = invoice.line_items.iter().map(|li| li.id.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);

    // Replacing the discount re-derives the total.
    let updated = store
        .invoices()
        .update(
            &invoice.id,
            InvoicePatch {
                discount: Some(0.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.total, 143.0);

    let view = store.invoices().get_view(&invoice.id).await.unwrap();
    assert_eq!(view.all_line_item_notes, "phase one");
    assert_eq!(view.days_overdue, 0);
}

/// Test 4: Negative totals are rejected, not clamped.
#[tokio::test]
async fn test_negative_total_is_validation_error() {
    let store = Store::in_memory();
    let c = customer(&store, "Neg", "neg@example.com").await;

    let mut input = InvoiceInput::new("INV-NEG", &c.id, Utc::now() + Duration::days(1));
    input.line_items = vec![LineItemInput::new("Thing", 1.0, 10.0)];
    input.discount = Some(50.0);

    let err = store.invoices().create(input).await.unwrap_err();
    let violations = err.violations().expect("validation error");
    assert!(violations.iter().any(|v| v.field == "total"));
    assert_eq!(store.count::<Invoice>().await.unwrap(), 0);
}

/// Test 5: Overdue transition
///
/// Sent + past due becomes Overdue on its next write; Paid never does.
#[tokio::test]
async fn test_overdue_transition() {
    let store = Store::in_memory();
    let c = customer(&store, "Late", "late@example.com").await;
    let past = Utc::now() - Duration::days(3);

    let mut sent = InvoiceInput::new("INV-S", &c.id, past);
    sent.status = Some(InvoiceStatus::Sent);
    let sent = store.invoices().create(sent).await.unwrap();
    assert_eq!(sent.status, InvoiceStatus::Overdue);
    let view = store.invoices().get_view(&sent.id).await.unwrap();
    assert!(view.days_overdue >= 2);

    let mut paid = InvoiceInput::new("INV-P", &c.id, past);
    paid.status = Some(InvoiceStatus::Paid);
    let paid = store.invoices().create(paid).await.unwrap();
    let paid = store
        .invoices()
        .update(
            &paid.id,
            InvoicePatch {
                notes: Some("thanks".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);

    let draft = store
        .invoices()
        .create(InvoiceInput::new("INV-D", &c.id, past))
        .await
        .unwrap();
    assert_eq!(draft.status, InvoiceStatus::Draft);
}

/// Test 6: Closing a query stamps the resolution time exactly once.
#[tokio::test]
async fn test_query_close_stamps_once() {
    let store = Store::in_memory();
    let c = customer(&store, "Quinn", "quinn@example.com").await;
    let q = store
        .queries()
        .create(QueryInput::new(&c.id, "Login loop"))
        .await
        .unwrap();
    assert_eq!(q.customer_name.as_deref(), Some("Quinn"));
    assert!(q.actual_resolution_time.is_none());

    let closed = store
        .queries()
        .update(&q.id, QueryPatch::status(QueryStatus::Closed))
        .await
        .unwrap();
    let stamped = closed.actual_resolution_time.expect("stamped on close");

    tokio::time::sleep(StdDuration::from_millis(5)).await;
    let again = store
        .queries()
        .update(
            &q.id,
            QueryPatch {
                status: Some(QueryStatus::Closed),
                resolution: Some("Cleared cookies".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(again.actual_resolution_time, Some(stamped));

    let view = store.queries().get_view(&q.id).await.unwrap();
    assert!(view.time_to_resolution.is_some_and(|ms| ms >= 0));
    assert!(!view.is_overdue);
}

/// Test 7: Notes add/remove round trip
///
/// Adding a note then deleting it restores the list; unknown ids change nothing.
#[tokio::test]
async fn test_note_add_then_remove_restores_list() {
    let store = Store::in_memory();
    let c = customer(&store, "Nia", "nia@example.com").await;
    let mut input = QueryInput::new(&c.id, "Refund request");
    input.notes = vec![NoteInput::new("opened by phone")];
    let q = store.queries().create(input).await.unwrap();
    let before = store.queries().list_children(&q.id).await.unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].created_by, "System");

    let note = store
        .queries()
        .add_child(&q.id, NoteInput::new("escalated"))
        .await
        .unwrap();
    let during = store.queries().list_children(&q.id).await.unwrap();
    assert_eq!(during.len(), 2);
    assert_eq!(during[1].id, note.id);

    let edited = store
        .queries()
        .update_child(
            &q.id,
            &note.id,
            NotePatch {
                text: Some("escalated to tier 2".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.text, "escalated to tier 2");
    assert_eq!(edited.created_at, note.created_at);

    store.queries().remove_child(&q.id, &note.id).await.unwrap();
    assert_eq!(store.queries().list_children(&q.id).await.unwrap(), before);

    let snapshot: Query = store.get(&q.id).await.unwrap();
    let err = store
        .queries()
        .remove_child(&q.id, &note.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ChildNotFound { .. }));
    let after: Query = store.get(&q.id).await.unwrap();
    assert_eq!(after.updated_at, snapshot.updated_at);
}

/// Test 8: References to missing customers are NotFound.
#[tokio::test]
async fn test_missing_customer_reference() {
    let store = Store::in_memory();
    let err = store
        .invoices()
        .create(InvoiceInput::new("INV-X", "ghost", Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { ref collection, .. } if collection == "customers"));

    let err = store
        .queries()
        .create(QueryInput::new("ghost", "hello"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 404);
}

/// Test 9: Filters, ordering and pagination.
#[tokio::test]
async fn test_list_filters_and_pages() {
    let store = Store::in_memory();
    let mut ids = Vec::new();
    for i in 0..12 {
        let mut input = CustomerInput::new(format!("Customer {}", i), format!("c{}@example.com", i));
        if i % 3 == 0 {
            input.status = Some(CustomerStatus::Active);
            input.tags = vec!["vip".into()];
        }
        ids.push(store.customers().create(input).await.unwrap().id);
        tokio::time::sleep(StdDuration::from_millis(2)).await;
    }

    let newest = store
        .customers()
        .list(&CustomerFilter::default(), PageRequest::new(1, 5))
        .await
        .unwrap();
    assert_eq!(newest.items[0].id, ids[11]);
    let meta = newest.pagination();
    assert_eq!((meta.total, meta.total_pages), (12, 3));
    assert!(meta.has_next && !meta.has_prev);

    let oldest = store
        .customers()
        .list(
            &CustomerFilter {
                sort: SortOrder::Oldest,
                ..Default::default()
            },
            PageRequest::new(3, 5),
        )
        .await
        .unwrap();
    assert_eq!(oldest.items.len(), 2);
    assert_eq!(oldest.items[1].id, ids[11]);

    let vip = store
        .customers()
        .list(
            &CustomerFilter {
                tag: Some("vip".into()),
                status: Some(CustomerStatus::Active),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(vip.total, 4);

    let search = store
        .customers()
        .list(
            &CustomerFilter {
                search: Some("CUSTOMER 1".into()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    // "Customer 1", "Customer 10", "Customer 11"
    assert_eq!(search.total, 3);

    let body = serde_json::to_value(DataResponse::from(newest)).unwrap();
    assert_eq!(body["pagination"]["totalPages"], 3);
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(5));
    assert!(body["data"][0]["_id"].is_string());
}

/// Test 10: Invoice and query filters.
#[tokio::test]
async fn test_invoice_and_query_filters() {
    let store = Store::in_memory();
    let a = customer(&store, "A", "a@example.com").await;
    let b = customer(&store, "B", "b@example.com").await;
    let due = Utc::now() + Duration::days(10);

    let mut eur = InvoiceInput::new("INV-A", &a.id, due);
    eur.currency = Some("eur".into());
    store.invoices().create(eur).await.unwrap();
    store
        .invoices()
        .create(InvoiceInput::new("INV-B", &b.id, due))
        .await
        .unwrap();

    let by_customer = store
        .invoices()
        .list(
            &InvoiceFilter {
                customer_id: Some(a.id.clone()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_customer.total, 1);
    assert_eq!(by_customer.items[0].currency, "EUR");

    let usd = store
        .invoices()
        .list(
            &InvoiceFilter {
                currency: Some("usd".into()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(usd.items[0].invoice_number, "INV-B");

    store
        .queries()
        .create(QueryInput::new(&a.id, "one"))
        .await
        .unwrap();
    let q = store
        .queries()
        .create(QueryInput::new(&b.id, "two"))
        .await
        .unwrap();
    store
        .queries()
        .update(&q.id, QueryPatch::status(QueryStatus::InProgress))
        .await
        .unwrap();

    let in_progress = store
        .queries()
        .list_views(
            &QueryFilter {
                status: Some(QueryStatus::InProgress),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(in_progress.total, 1);
    assert_eq!(in_progress.items[0].query.description, "two");
}

/// Test 11: Concurrent creates claiming the same email
///
/// Exactly one of many concurrent writers wins the unique key.
#[tokio::test]
async fn test_concurrent_unique_claims() {
    let store = Store::in_memory();
    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .customers()
                .create(CustomerInput::new(format!("Racer {}", i), "race@example.com"))
                .await
        }));
    }

    let mut won = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(Error::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(store.count::<Customer>().await.unwrap(), 1);
}

/// Test 12: Concurrent note additions on one query
///
/// Every acknowledged note is persisted; interleaved status updates keep them.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_child_additions_are_serialized() {
    init_logger();
    let store = Store::in_memory();
    let c = customer(&store, "Busy", "busy@example.com").await;
    let q = store
        .queries()
        .create(QueryInput::new(&c.id, "Many hands"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..64 {
        let store = store.clone();
        let id = q.id.clone();
        handles.push(tokio::spawn(async move {
            if i % 4 == 0 {
                store
                    .queries()
                    .update(&id, QueryPatch::status(QueryStatus::InProgress))
                    .await
                    .map(|_| None)
            } else {
                store
                    .queries()
                    .add_child(&id, NoteInput::new(format!("note {}", i)))
                    .await
                    .map(|n| Some(n.id))
            }
        }));
    }

    let mut acknowledged = Vec::new();
    for handle in handles {
        if let Some(note_id) = handle.await.unwrap().expect("Failed to write") {
            acknowledged.push(note_id);
        }
    }
    assert_eq!(acknowledged.len(), 48);

    let stored: Query = store.get(&q.id).await.unwrap();
    assert_eq!(stored.notes.len(), 48);
    assert_eq!(stored.status, QueryStatus::InProgress);
    for note_id in &acknowledged {
        assert!(stored.notes.get(note_id).is_some(), "note {} lost", note_id);
    }
}

/// Test 13: Concurrent line item additions and invoice updates
///
/// Totals always reflect every persisted line item.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_invoice_mutations_keep_totals() {
    init_logger();
    let store = Store::in_memory();
    let c = customer(&store, "Ledger", "ledger@example.com").await;
    let inv = store
        .invoices()
        .create(InvoiceInput::new("INV-RACE", &c.id, Utc::now() + Duration::days(30)))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..48 {
        let store = store.clone();
        let id = inv.id.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                let patch = InvoicePatch {
                    tax_rate: Some(10.0),
                    ..Default::default()
                };
                store.invoices().update(&id, patch).await.map(|_| ())
            } else {
                store
                    .invoices()
                    .add_child(&id, LineItemInput::new(format!("item {}", i), 1.0, 10.0))
                    .await
                    .map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().expect("Failed to write");
    }

    let stored: Invoice = store.get(&inv.id).await.unwrap();
    assert_eq!(stored.line_items.len(), 24);
    assert_eq!(stored.subtotal, 240.0);
    assert_eq!(stored.tax_rate, 10.0);
    assert_eq!(stored.total, 264.0);
}
