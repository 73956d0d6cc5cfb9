use super::{clean, clean_tags, Customer, Document, SortOrder};
use crate::derive;
use crate::embedded::{ChildRecord, Children, Parent};
use crate::error::Result;
use crate::id;
use crate::schema::{FieldRule, Schema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_NOTE_AUTHOR: &str = "System";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QueryStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress", alias = "InProgress")]
    InProgress,
    Closed,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Open => "Open",
            QueryStatus::InProgress => "In Progress",
            QueryStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    General,
    Technical,
    Billing,
    Account,
    #[serde(rename = "Feature Request")]
    FeatureRequest,
    #[serde(rename = "Bug Report")]
    BugReport,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Source {
    #[default]
    #[serde(rename = "Web Form")]
    WebForm,
    Email,
    Phone,
    Chat,
    #[serde(rename = "Social Media")]
    SocialMedia,
    Other,
}

/// A dated comment embedded in a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    pub text: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NoteInput {
    pub fn new(text: impl Into<String>) -> Self {
        NoteInput {
            text: text.into(),
            created_by: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotePatch {
    pub text: Option<String>,
}

impl ChildRecord for Note {
    type Input = NoteInput;
    type Patch = NotePatch;

    fn kind() -> &'static str {
        "note"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn from_input(id: String, input: NoteInput, now: DateTime<Utc>) -> Result<Self> {
        Ok(Note {
            id,
            text: input.text.trim().to_string(),
            created_by: clean(input.created_by).unwrap_or_else(|| DEFAULT_NOTE_AUTHOR.to_string()),
            created_at: now,
            updated_at: now,
        })
    }

    fn apply_patch(&mut self, patch: NotePatch, now: DateTime<Utc>) {
        if let Some(text) = patch.text {
            self.text = text.trim().to_string();
        }
        self.updated_at = now;
    }
}

/// File metadata attached to a query. Content lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default = "Utc::now")]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(rename = "_id")]
    pub id: String,
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub description: String,
    #[serde(default)]
    pub status: QueryStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_resolution_time: Option<DateTime<Utc>>,
    /// Stamped once, on the first write that sees the query Closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_resolution_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Children<Note>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Source,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryInput {
    pub customer_id: String,
    pub description: String,
    pub status: Option<QueryStatus>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub resolution: Option<String>,
    pub assigned_to: Option<String>,
    pub estimated_resolution_time: Option<DateTime<Utc>>,
    pub notes: Vec<NoteInput>,
    pub attachments: Vec<Attachment>,
    pub tags: Vec<String>,
    pub source: Option<Source>,
}

impl QueryInput {
    pub fn new(customer_id: impl Into<String>, description: impl Into<String>) -> Self {
        QueryInput {
            customer_id: customer_id.into(),
            description: description.into(),
            ..Default::default()
        }
    }
}

/// Partial update. Notes are managed through the child operations, and the
/// actual resolution time is never client-supplied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryPatch {
    pub description: Option<String>,
    pub status: Option<QueryStatus>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub resolution: Option<String>,
    pub assigned_to: Option<String>,
    pub estimated_resolution_time: Option<DateTime<Utc>>,
    pub attachments: Option<Vec<Attachment>>,
    pub tags: Option<Vec<String>>,
    pub source: Option<Source>,
}

impl QueryPatch {
    pub fn status(status: QueryStatus) -> Self {
        QueryPatch {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilter {
    pub status: Option<QueryStatus>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub customer_id: Option<String>,
    pub assigned_to: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryView {
    #[serde(flatten)]
    pub query: Query,
    /// Milliseconds from creation to resolution.
    pub time_to_resolution: Option<i64>,
    pub is_overdue: bool,
}

const QUERY_STATUSES: &[&str] = &["Open", "In Progress", "InProgress", "Closed"];
const PRIORITIES: &[&str] = &["Low", "Medium", "High", "Critical"];
const CATEGORIES: &[&str] = &[
    "General",
    "Technical",
    "Billing",
    "Account",
    "Feature Request",
    "Bug Report",
    "Other",
];
const SOURCES: &[&str] = &["Web Form", "Email", "Phone", "Chat", "Social Media", "Other"];

const QUERY_FIELDS: &[FieldRule] = &[
    FieldRule::string("_id").required().derived(),
    FieldRule::string("customerId").required(),
    FieldRule::string("customerName"),
    FieldRule::string("description").required().max_len(2000),
    FieldRule::string("status").one_of(QUERY_STATUSES),
    FieldRule::string("priority").one_of(PRIORITIES),
    FieldRule::string("category").one_of(CATEGORIES),
    FieldRule::string("resolution").max_len(2000),
    FieldRule::string("assignedTo"),
    FieldRule::timestamp("estimatedResolutionTime"),
    FieldRule::timestamp("actualResolutionTime").derived(),
    FieldRule::array("notes"),
    FieldRule::string("notes[]._id").required().derived(),
    FieldRule::string("notes[].text").required().max_len(1000),
    FieldRule::string("notes[].createdBy"),
    FieldRule::timestamp("notes[].createdAt").required().derived(),
    FieldRule::timestamp("notes[].updatedAt").required().derived(),
    FieldRule::array("attachments"),
    FieldRule::string("attachments[].fileName").required(),
    FieldRule::string("attachments[].fileUrl").required(),
    FieldRule::string("attachments[].fileType"),
    FieldRule::number("attachments[].fileSize").min(0.0),
    FieldRule::array("tags"),
    FieldRule::string("tags[]"),
    FieldRule::string("source").one_of(SOURCES),
    FieldRule::timestamp("createdAt").required().derived(),
    FieldRule::timestamp("updatedAt").required().derived(),
];

static QUERY_SCHEMA: Schema = Schema::new("query", QUERY_FIELDS);

impl Document for Query {
    type Input = QueryInput;
    type Patch = QueryPatch;
    type Filter = QueryFilter;
    type View = QueryView;

    fn collection() -> &'static str {
        "queries"
    }

    fn schema() -> &'static Schema {
        &QUERY_SCHEMA
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_input(id: String, input: QueryInput, now: DateTime<Utc>) -> Result<Self> {
        let notes = input
            .notes
            .into_iter()
            .map(|n| Note::from_input(id::generate(), n, now))
            .collect::<Result<Children<Note>>>()?;
        Ok(Query {
            id,
            customer_id: input.customer_id.trim().to_string(),
            customer_name: None,
            description: input.description.trim().to_string(),
            status: input.status.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            category: input.category.unwrap_or_default(),
            resolution: clean(input.resolution),
            assigned_to: clean(input.assigned_to),
            estimated_resolution_time: input.estimated_resolution_time,
            actual_resolution_time: None,
            notes,
            attachments: input.attachments,
            tags: clean_tags(input.tags),
            source: input.source.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        })
    }

    fn apply_patch(&mut self, patch: QueryPatch, _now: DateTime<Utc>) -> Result<()> {
        if let Some(description) = patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if patch.resolution.is_some() {
            self.resolution = clean(patch.resolution);
        }
        if patch.assigned_to.is_some() {
            self.assigned_to = clean(patch.assigned_to);
        }
        if patch.estimated_resolution_time.is_some() {
            self.estimated_resolution_time = patch.estimated_resolution_time;
        }
        if let Some(attachments) = patch.attachments {
            self.attachments = attachments;
        }
        if let Some(tags) = patch.tags {
            self.tags = clean_tags(tags);
        }
        if let Some(source) = patch.source {
            self.source = source;
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn derive(self, now: DateTime<Utc>) -> Self {
        derive::derive_query(self, now)
    }

    fn customer_ref(&self) -> Option<&str> {
        Some(&self.customer_id)
    }

    fn snapshot_customer(&mut self, customer: &Customer) {
        self.customer_name = Some(customer.name.clone());
    }

    fn matches(&self, filter: &QueryFilter) -> bool {
        filter.status.map_or(true, |s| s == self.status)
            && filter.priority.map_or(true, |p| p == self.priority)
            && filter.category.map_or(true, |c| c == self.category)
            && filter
                .customer_id
                .as_deref()
                .map_or(true, |c| c == self.customer_id)
            && filter
                .assigned_to
                .as_deref()
                .map_or(true, |a| self.assigned_to.as_deref() == Some(a))
    }

    fn sort_order(filter: &QueryFilter) -> SortOrder {
        filter.sort
    }

    fn view(self, now: DateTime<Utc>) -> QueryView {
        QueryView {
            time_to_resolution: derive::time_to_resolution(&self),
            is_overdue: derive::is_overdue(&self, now),
            query: self,
        }
    }
}

impl Parent for Query {
    type Child = Note;

    const CHILDREN_FEED_DERIVATION: bool = false;

    fn children(&self) -> &Children<Note> {
        &self.notes
    }

    fn children_mut(&mut self) -> &mut Children<Note> {
        &mut self.notes
    }
}
