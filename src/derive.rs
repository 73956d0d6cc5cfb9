//! Derived-field computation.
//!
//! `derive_invoice` and `derive_query` are pure: they take a document and the
//! current time and return the document with every dependent field recomputed.
//! The store calls them exactly once per create and once per update, right
//! before persisting. The remaining helpers compute read-time virtual fields
//! that are never stored.

use crate::model::{Address, Invoice, InvoiceStatus, Query, QueryStatus};
use chrono::{DateTime, Utc};

/// Recompute line totals, subtotal, tax amount and total, in that order, then
/// apply the Sent to Overdue transition.
///
/// A negative total is left as computed; validation rejects it afterwards.
pub fn derive_invoice(mut invoice: Invoice, now: DateTime<Utc>) -> Invoice {
    for item in invoice.line_items.iter_mut() {
        item.total = item.quantity * item.unit_price;
    }
    invoice.subtotal = invoice.line_items.iter().map(|i| i.total).sum();
    invoice.tax_amount = invoice.subtotal * invoice.tax_rate / 100.0;
    invoice.total = invoice.subtotal + invoice.tax_amount - invoice.discount;

    if invoice.status == InvoiceStatus::Sent && now > invoice.due_date {
        debug!("invoice {} past due, marking Overdue", invoice.id);
        invoice.status = InvoiceStatus::Overdue;
    }
    invoice
}

/// Stamp `actualResolutionTime` the first time a query is seen Closed.
pub fn derive_query(mut query: Query, now: DateTime<Utc>) -> Query {
    if query.status == QueryStatus::Closed && query.actual_resolution_time.is_none() {
        query.actual_resolution_time = Some(now);
    }
    query
}

/// `"street, city, state zip, country"` with empty parts skipped.
pub fn full_address(address: &Address) -> String {
    let Some(street) = non_blank(address.street.as_deref()) else {
        return String::new();
    };

    let region: Vec<&str> = [address.state.as_deref(), address.zip_code.as_deref()]
        .into_iter()
        .filter_map(non_blank)
        .collect();
    let region = region.join(" ");

    [
        Some(street),
        non_blank(address.city.as_deref()),
        non_blank(Some(region.as_str())),
        non_blank(Some(address.country.as_str())),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ")
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Whole days past due for an Overdue invoice, 0 otherwise.
pub fn days_overdue(invoice: &Invoice, now: DateTime<Utc>) -> i64 {
    if invoice.status != InvoiceStatus::Overdue {
        return 0;
    }
    (now - invoice.due_date).num_days().max(0)
}

/// Trimmed, non-empty line item notes in list order.
pub fn line_item_notes(invoice: &Invoice) -> Vec<String> {
    invoice
        .line_items
        .iter()
        .filter_map(|i| non_blank(i.notes.as_deref()))
        .map(str::to_string)
        .collect()
}

pub fn all_line_item_notes(invoice: &Invoice) -> String {
    line_item_notes(invoice).join("\n")
}

/// Milliseconds between creation and resolution, when resolved.
pub fn time_to_resolution(query: &Query) -> Option<i64> {
    query
        .actual_resolution_time
        .map(|resolved| (resolved - query.created_at).num_milliseconds())
}

pub fn is_overdue(query: &Query, now: DateTime<Utc>) -> bool {
    match query.estimated_resolution_time {
        Some(eta) => query.status != QueryStatus::Closed && now > eta,
        None => false,
    }
}
