//! Basic usage example of the CRM store.

use chrono::{Duration, Utc};
use crm_store::model::{
    CustomerInput, InvoiceInput, InvoicePatch, InvoiceStatus, LineItemInput, NoteInput,
    QueryInput, QueryPatch, QueryStatus,
};
use crm_store::summarize::{Summarizer, SummaryError};
use crm_store::{error::Result, RetryingSummarizer, Store, StoreConfig};

/// Stand-in for the external summarization service.
struct FirstSentences;

impl Summarizer for FirstSentences {
    async fn summarize(&self, notes: &[String]) -> std::result::Result<String, SummaryError> {
        Ok(notes
            .iter()
            .map(|n| n.split('.').next().unwrap_or(n).trim().to_string())
            .collect::<Vec<_>>()
            .join("; "))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== CRM Store - Basic Example ===\n");

    // 1. Connect: durable if DATABASE_URL/REDIS_URL answers, volatile otherwise
    println!("1. Connecting...");
    let store = Store::connect(&StoreConfig::from_env()?).await;
    println!("   ✓ Using {} backend\n", store.mode());

    // 2. Customer
    println!("2. Creating a customer:");
    let mut input = CustomerInput::new("Jane Doe", "Jane.Doe@Example.com");
    input.company = Some("Acme Corp".to_string());
    let jane = store.customers().create(input).await?;
    println!("   ✓ {} <{}> ({})\n", jane.name, jane.email, jane.status);

    // 3. Invoice with derived totals
    println!("3. Creating an invoice:");
    let mut input = InvoiceInput::new("INV-001", &jane.id, Utc::now() + Duration::days(30));
    input.line_items = vec![
        LineItemInput::new("Consulting", 2.0, 50.0).with_notes("Kickoff workshop. Two sessions."),
        LineItemInput::new("Support", 1.0, 30.0),
    ];
    input.tax_rate = Some(10.0);
    input.discount = Some(5.0);
    let invoice = store.invoices().create(input).await?;
    println!(
        "   ✓ subtotal {:.2}, tax {:.2}, total {:.2} {}\n",
        invoice.subtotal, invoice.tax_amount, invoice.total, invoice.currency
    );

    // 4. Line item added later re-derives the totals
    println!("4. Adding a line item:");
    store
        .invoices()
        .add_child(&invoice.id, LineItemInput::new("Travel", 1.0, 120.0))
        .await?;
    let invoice = store
        .invoices()
        .update(
            &invoice.id,
            InvoicePatch {
                status: Some(InvoiceStatus::Sent),
                ..Default::default()
            },
        )
        .await?;
    println!(
        "   ✓ {} line items, total now {:.2} ({})\n",
        invoice.line_items.len(),
        invoice.total,
        invoice.status
    );

    // 5. Support query with notes
    println!("5. Opening a support query:");
    let query = store
        .queries()
        .create(QueryInput::new(&jane.id, "Invoice shows the wrong address"))
        .await?;
    store
        .queries()
        .add_child(&query.id, NoteInput::new("Customer called. Billing address changed in May."))
        .await?;
    store
        .queries()
        .add_child(&query.id, NoteInput::new("Reissued invoice. Awaiting confirmation."))
        .await?;
    let summarizer = RetryingSummarizer::new(FirstSentences);
    let summary = store.summarize_query_notes(&query.id, &summarizer).await?;
    println!("   ✓ Notes summary: {}\n", summary);

    // 6. Close it
    println!("6. Closing the query:");
    store
        .queries()
        .update(&query.id, QueryPatch::status(QueryStatus::Closed))
        .await?;
    let view = store.queries().get_view(&query.id).await?;
    println!(
        "   ✓ Resolved in {} ms, overdue: {}\n",
        view.time_to_resolution.unwrap_or_default(),
        view.is_overdue
    );

    // 7. Reports
    println!("7. Summary report:");
    let report = store.summary_report().await?;
    println!(
        "   ✓ {}\n",
        serde_json::to_string_pretty(&report).unwrap_or_default()
    );

    println!("=== Example Complete ===\n");
    Ok(())
}
