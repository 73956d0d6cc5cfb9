//! # crm-store
//!
//! Dual-mode persistence and derived-state layer for a small ERP/CRM:
//! customers, invoices with embedded line items, and support queries with
//! embedded notes.
//!
//! ## Features
//!
//! - **One contract, two backends:** a durable Redis-backed store and a volatile
//!   in-process store, selected once at startup by probing connectivity
//! - **Derived state:** invoice totals, overdue transitions and resolution
//!   timestamps are recomputed right before every write
//! - **Embedded children:** ordered, id-addressable line items and notes
//! - **Schema validation:** one generic validator driven by per-entity field rules
//! - **Unique indexes:** customer email and invoice number, enforced by both backends
//!
//! ## Quick Start
//!
//! ```no_run
//! use crm_store::model::{CustomerInput, InvoiceInput, LineItemInput};
//! use crm_store::{Store, StoreConfig};
//! use chrono::{Duration, Utc};
//!
//! # async fn example() -> crm_store::Result<()> {
//! // Durable if DATABASE_URL/REDIS_URL answers, volatile otherwise.
//! let store = Store::connect(&StoreConfig::from_env()?).await;
//!
//! let customer = store
//!     .customers()
//!     .create(CustomerInput::new("Jane Doe", "jane@example.com"))
//!     .await?;
//!
//! let mut input = InvoiceInput::new("INV-001", &customer.id, Utc::now() + Duration::days(30));
//! input.line_items = vec![
//!     LineItemInput::new("Consulting", 2.0, 50.0),
//!     LineItemInput::new("Support", 1.0, 30.0),
//! ];
//! input.tax_rate = Some(10.0);
//! input.discount = Some(5.0);
//!
//! let invoice = store.invoices().create(input).await?;
//! assert_eq!(invoice.total, 138.0);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod codec;
pub mod config;
pub mod derive;
pub mod embedded;
pub mod error;
pub mod id;
pub mod key;
pub mod lead;
pub mod mode;
pub mod model;
pub mod observability;
pub mod page;
pub mod reports;
pub mod response;
pub mod schema;
pub mod store;
pub mod summarize;

// Re-exports for convenience
pub use backend::{DocumentBackend, StoreBackend};
pub use config::StoreConfig;
pub use embedded::{ChildRecord, Children, Parent};
pub use error::{Error, FieldViolation, Result};
pub use lead::{LeadOutcome, LeadWebhook};
pub use mode::BackendMode;
pub use model::Document;
pub use page::{Page, PageRequest, Pagination};
pub use response::{DataResponse, ErrorResponse};
pub use store::{Collection, Store};
pub use summarize::{RetryingSummarizer, Summarizer, SummaryError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
