use super::{clean, clean_tags, Document, SortOrder, UniqueKey};
use crate::derive;
use crate::error::Result;
use crate::schema::{FieldRule, Schema, EMAIL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_COUNTRY: &str = "United States";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Inactive,
    #[default]
    Lead,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "active",
            CustomerStatus::Inactive => "inactive",
            CustomerStatus::Lead => "lead",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

impl Default for Address {
    fn default() -> Self {
        Address {
            street: None,
            city: None,
            state: None,
            zip_code: None,
            country: default_country(),
        }
    }
}

/// Address fields as sent by a client. Present fields overwrite, absent ones are kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressInput {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

impl AddressInput {
    fn merge_into(self, address: &mut Address) {
        if let Some(v) = clean(self.street) {
            address.street = Some(v);
        }
        if let Some(v) = clean(self.city) {
            address.city = Some(v);
        }
        if let Some(v) = clean(self.state) {
            address.state = Some(v);
        }
        if let Some(v) = clean(self.zip_code) {
            address.zip_code = Some(v);
        }
        if let Some(v) = clean(self.country) {
            address.country = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default)]
    pub status: CustomerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub total_revenue: f64,
    pub last_contact: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<AddressInput>,
    pub company: Option<String>,
    pub status: Option<CustomerStatus>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub total_revenue: Option<f64>,
    pub last_contact: Option<DateTime<Utc>>,
}

impl CustomerInput {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        CustomerInput {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<AddressInput>,
    pub company: Option<String>,
    pub status: Option<CustomerStatus>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub total_revenue: Option<f64>,
    pub last_contact: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerFilter {
    pub status: Option<CustomerStatus>,
    pub tag: Option<String>,
    /// Case-insensitive substring over name, email and company.
    pub search: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    #[serde(flatten)]
    pub customer: Customer,
    pub full_address: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

const CUSTOMER_STATUSES: &[&str] = &["active", "inactive", "lead"];

const CUSTOMER_FIELDS: &[FieldRule] = &[
    FieldRule::string("_id").required().derived(),
    FieldRule::string("name").required().max_len(100),
    FieldRule::string("email").required().pattern(EMAIL),
    FieldRule::string("phone").max_len(20),
    FieldRule::object("address"),
    FieldRule::string("address.street"),
    FieldRule::string("address.city"),
    FieldRule::string("address.state"),
    FieldRule::string("address.zipCode"),
    FieldRule::string("address.country"),
    FieldRule::string("company").max_len(100),
    FieldRule::string("status").one_of(CUSTOMER_STATUSES),
    FieldRule::string("notes").max_len(1000),
    FieldRule::array("tags"),
    FieldRule::string("tags[]"),
    FieldRule::number("totalRevenue").min(0.0),
    FieldRule::timestamp("lastContact"),
    FieldRule::timestamp("createdAt").required().derived(),
    FieldRule::timestamp("updatedAt").required().derived(),
];

static CUSTOMER_SCHEMA: Schema = Schema::new("customer", CUSTOMER_FIELDS);

impl Document for Customer {
    type Input = CustomerInput;
    type Patch = CustomerPatch;
    type Filter = CustomerFilter;
    type View = CustomerView;

    fn collection() -> &'static str {
        "customers"
    }

    fn schema() -> &'static Schema {
        &CUSTOMER_SCHEMA
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_input(id: String, input: CustomerInput, now: DateTime<Utc>) -> Result<Self> {
        let mut address = Address::default();
        if let Some(a) = input.address {
            a.merge_into(&mut address);
        }
        Ok(Customer {
            id,
            name: input.name.trim().to_string(),
            email: normalize_email(&input.email),
            phone: clean(input.phone),
            address,
            company: clean(input.company),
            status: input.status.unwrap_or_default(),
            notes: clean(input.notes),
            tags: clean_tags(input.tags),
            total_revenue: input.total_revenue.unwrap_or(0.0),
            last_contact: input.last_contact.unwrap_or(now),
            created_at: now,
            updated_at: now,
        })
    }

    fn apply_patch(&mut self, patch: CustomerPatch, _now: DateTime<Utc>) -> Result<()> {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = patch.email {
            self.email = normalize_email(&email);
        }
        if patch.phone.is_some() {
            self.phone = clean(patch.phone);
        }
        if let Some(address) = patch.address {
            address.merge_into(&mut self.address);
        }
        if patch.company.is_some() {
            self.company = clean(patch.company);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if patch.notes.is_some() {
            self.notes = clean(patch.notes);
        }
        if let Some(tags) = patch.tags {
            self.tags = clean_tags(tags);
        }
        if let Some(revenue) = patch.total_revenue {
            self.total_revenue = revenue;
        }
        if let Some(at) = patch.last_contact {
            self.last_contact = at;
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("email", self.email.as_str())]
    }

    fn matches(&self, filter: &CustomerFilter) -> bool {
        if filter.status.is_some_and(|s| s != self.status) {
            return false;
        }
        if let Some(tag) = &filter.tag {
            if !self.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = self.name.to_lowercase().contains(&term)
                || self.email.contains(&term)
                || self
                    .company
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        true
    }

    fn sort_order(filter: &CustomerFilter) -> SortOrder {
        filter.sort
    }

    fn view(self, _now: DateTime<Utc>) -> CustomerView {
        CustomerView {
            full_address: derive::full_address(&self.address),
            customer: self,
        }
    }
}
