use super::{clean, clean_tags, Customer, Document, SortOrder, UniqueKey};
use crate::derive;
use crate::embedded::{ChildRecord, Children, Parent};
use crate::error::{Error, Result};
use crate::id;
use crate::schema::{FieldRule, Schema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "Draft",
            InvoiceStatus::Sent => "Sent",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Overdue => "Overdue",
            InvoiceStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Check,
    #[serde(rename = "Credit Card")]
    CreditCard,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
    PayPal,
    Other,
}

/// One billable line embedded in an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub item_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    /// `quantity * unitPrice`, recomputed on every write.
    #[serde(default)]
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl LineItemInput {
    pub fn new(item_name: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        LineItemInput {
            item_name: item_name.into(),
            description: None,
            quantity,
            unit_price,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineItemPatch {
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub notes: Option<String>,
}

impl ChildRecord for LineItem {
    type Input = LineItemInput;
    type Patch = LineItemPatch;

    fn kind() -> &'static str {
        "lineItem"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn from_input(id: String, input: LineItemInput, now: DateTime<Utc>) -> Result<Self> {
        Ok(LineItem {
            id,
            item_name: input.item_name.trim().to_string(),
            description: clean(input.description),
            quantity: input.quantity,
            unit_price: input.unit_price,
            total: input.quantity * input.unit_price,
            notes: clean(input.notes),
            created_at: now,
            updated_at: now,
        })
    }

    fn apply_patch(&mut self, patch: LineItemPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.item_name {
            self.item_name = name.trim().to_string();
        }
        if patch.description.is_some() {
            self.description = clean(patch.description);
        }
        if let Some(q) = patch.quantity {
            self.quantity = q;
        }
        if let Some(p) = patch.unit_price {
            self.unit_price = p;
        }
        if patch.notes.is_some() {
            self.notes = clean(patch.notes);
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub line_items: Children<LineItem>,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub tax_amount: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub total: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create payload. Subtotal, tax amount and total are not accepted from clients.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceInput {
    pub invoice_number: String,
    pub customer_id: String,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<InvoiceStatus>,
    pub line_items: Vec<LineItemInput>,
    pub tax_rate: Option<f64>,
    pub discount: Option<f64>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub paid_date: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub tags: Vec<String>,
}

impl InvoiceInput {
    pub fn new(
        invoice_number: impl Into<String>,
        customer_id: impl Into<String>,
        due_date: DateTime<Utc>,
    ) -> Self {
        InvoiceInput {
            invoice_number: invoice_number.into(),
            customer_id: customer_id.into(),
            due_date: Some(due_date),
            ..Default::default()
        }
    }
}

/// Partial update. `lineItems`, when present, replaces the whole list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoicePatch {
    pub invoice_number: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<InvoiceStatus>,
    pub line_items: Option<Vec<LineItemInput>>,
    pub tax_rate: Option<f64>,
    pub discount: Option<f64>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub paid_date: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<String>,
    pub currency: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub days_overdue: i64,
    pub all_line_item_notes: String,
}

fn normalize_currency(currency: Option<String>) -> Option<String> {
    clean(currency).map(|c| c.to_uppercase())
}

fn build_line_items(inputs: Vec<LineItemInput>, now: DateTime<Utc>) -> Result<Children<LineItem>> {
    inputs
        .into_iter()
        .map(|li| LineItem::from_input(id::generate(), li, now))
        .collect()
}

const INVOICE_STATUSES: &[&str] = &["Draft", "Sent", "Paid", "Overdue", "Cancelled"];
const PAYMENT_METHODS: &[&str] = &[
    "Cash",
    "Check",
    "Credit Card",
    "Bank Transfer",
    "PayPal",
    "Other",
];

const INVOICE_FIELDS: &[FieldRule] = &[
    FieldRule::string("_id").required().derived(),
    FieldRule::string("invoiceNumber").required(),
    FieldRule::string("customerId").required(),
    FieldRule::string("customerName"),
    FieldRule::string("customerEmail"),
    FieldRule::timestamp("issueDate"),
    FieldRule::timestamp("dueDate").required(),
    FieldRule::string("status").one_of(INVOICE_STATUSES),
    FieldRule::array("lineItems"),
    FieldRule::string("lineItems[]._id").required().derived(),
    FieldRule::string("lineItems[].itemName").required(),
    FieldRule::string("lineItems[].description"),
    FieldRule::number("lineItems[].quantity").required().min(0.0),
    FieldRule::number("lineItems[].unitPrice").required().min(0.0),
    FieldRule::number("lineItems[].total").derived().min(0.0),
    FieldRule::string("lineItems[].notes").max_len(500),
    FieldRule::number("subtotal").derived().min(0.0),
    FieldRule::number("taxRate").min(0.0).max(100.0),
    FieldRule::number("taxAmount").derived().min(0.0),
    FieldRule::number("discount").min(0.0),
    FieldRule::number("total").required().derived().min(0.0),
    FieldRule::string("currency").max_len(3),
    FieldRule::string("notes").max_len(1000),
    FieldRule::string("terms").max_len(2000),
    FieldRule::string("paymentMethod").one_of(PAYMENT_METHODS),
    FieldRule::timestamp("paidDate"),
    FieldRule::string("paymentReference"),
    FieldRule::array("tags"),
    FieldRule::string("tags[]"),
    FieldRule::timestamp("createdAt").required().derived(),
    FieldRule::timestamp("updatedAt").required().derived(),
];

static INVOICE_SCHEMA: Schema = Schema::new("invoice", INVOICE_FIELDS);

impl Document for Invoice {
    type Input = InvoiceInput;
    type Patch = InvoicePatch;
    type Filter = InvoiceFilter;
    type View = InvoiceView;

    fn collection() -> &'static str {
        "invoices"
    }

    fn schema() -> &'static Schema {
        &INVOICE_SCHEMA
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_input(id: String, input: InvoiceInput, now: DateTime<Utc>) -> Result<Self> {
        let due_date = input
            .due_date
            .ok_or_else(|| Error::invalid("dueDate", "is required"))?;
        Ok(Invoice {
            id,
            invoice_number: input.invoice_number.trim().to_string(),
            customer_id: input.customer_id.trim().to_string(),
            customer_name: None,
            customer_email: None,
            issue_date: input.issue_date.unwrap_or(now),
            due_date,
            status: input.status.unwrap_or_default(),
            line_items: build_line_items(input.line_items, now)?,
            subtotal: 0.0,
            tax_rate: input.tax_rate.unwrap_or(0.0),
            tax_amount: 0.0,
            discount: input.discount.unwrap_or(0.0),
            total: 0.0,
            currency: normalize_currency(input.currency)
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            notes: clean(input.notes),
            terms: clean(input.terms),
            payment_method: input.payment_method,
            paid_date: input.paid_date,
            payment_reference: clean(input.payment_reference),
            tags: clean_tags(input.tags),
            created_at: now,
            updated_at: now,
        })
    }

    fn apply_patch(&mut self, patch: InvoicePatch, now: DateTime<Utc>) -> Result<()> {
        if let Some(number) = patch.invoice_number {
            self.invoice_number = number.trim().to_string();
        }
        if let Some(at) = patch.issue_date {
            self.issue_date = at;
        }
        if let Some(at) = patch.due_date {
            self.due_date = at;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(items) = patch.line_items {
            self.line_items = build_line_items(items, now)?;
        }
        if let Some(rate) = patch.tax_rate {
            self.tax_rate = rate;
        }
        if let Some(discount) = patch.discount {
            self.discount = discount;
        }
        if let Some(currency) = normalize_currency(patch.currency) {
            self.currency = currency;
        }
        if patch.notes.is_some() {
            self.notes = clean(patch.notes);
        }
        if patch.terms.is_some() {
            self.terms = clean(patch.terms);
        }
        if patch.payment_method.is_some() {
            self.payment_method = patch.payment_method;
        }
        if patch.paid_date.is_some() {
            self.paid_date = patch.paid_date;
        }
        if patch.payment_reference.is_some() {
            self.payment_reference = clean(patch.payment_reference);
        }
        if let Some(tags) = patch.tags {
            self.tags = clean_tags(tags);
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn derive(self, now: DateTime<Utc>) -> Self {
        derive::derive_invoice(self, now)
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("invoiceNumber", self.invoice_number.as_str())]
    }

    fn customer_ref(&self) -> Option<&str> {
        Some(&self.customer_id)
    }

    fn snapshot_customer(&mut self, customer: &Customer) {
        self.customer_name = Some(customer.name.clone());
        self.customer_email = Some(customer.email.clone());
    }

    fn matches(&self, filter: &InvoiceFilter) -> bool {
        filter.status.map_or(true, |s| s == self.status)
            && filter
                .customer_id
                .as_deref()
                .map_or(true, |c| c == self.customer_id)
            && filter
                .currency
                .as_deref()
                .map_or(true, |c| c.eq_ignore_ascii_case(&self.currency))
    }

    fn sort_order(filter: &InvoiceFilter) -> SortOrder {
        filter.sort
    }

    fn view(self, now: DateTime<Utc>) -> InvoiceView {
        InvoiceView {
            days_overdue: derive::days_overdue(&self, now),
            all_line_item_notes: derive::all_line_item_notes(&self),
            invoice: self,
        }
    }
}

impl Parent for Invoice {
    type Child = LineItem;

    const CHILDREN_FEED_DERIVATION: bool = true;

    fn children(&self) -> &Children<LineItem> {
        &self.line_items
    }

    fn children_mut(&mut self) -> &mut Children<LineItem> {
        &mut self.line_items
    }
}
