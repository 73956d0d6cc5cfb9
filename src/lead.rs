//! Lead ingestion from inbound webhooks.

use crate::error::{Error, Result};
use crate::model::{CustomerInput, CustomerStatus};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const LEAD_TAGS: [&str; 2] = ["webhook", "lead"];

/// Inbound lead payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadWebhook {
    pub lead_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_source() -> String {
    "webhook".to_string()
}

impl LeadWebhook {
    pub fn new(lead_id: impl Into<String>) -> Self {
        LeadWebhook {
            lead_id: lead_id.into(),
            email: None,
            name: None,
            company: None,
            phone: None,
            source: default_source(),
            metadata: Map::new(),
        }
    }

    pub fn contact(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.email = Some(email.into());
        self
    }

    /// Name and email, when both are present and non-blank.
    fn identity(&self) -> Option<(&str, &str)> {
        let name = self.name.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let email = self.email.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((name, email))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadOutcome {
    pub lead_id: String,
    /// The customer created for this lead, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub created: bool,
}

impl Store {
    /// Turn a lead into a `lead` customer unless its email is already known.
    pub async fn ingest_lead(&self, lead: LeadWebhook) -> Result<LeadOutcome> {
        let skipped = LeadOutcome {
            lead_id: lead.lead_id.clone(),
            customer_id: None,
            created: false,
        };

        let Some((name, email)) = lead.identity() else {
            debug!("Lead {} carries no name/email, nothing to create", lead.lead_id);
            return Ok(skipped);
        };

        let input = CustomerInput {
            phone: lead.phone.clone(),
            company: lead.company.clone(),
            status: Some(CustomerStatus::Lead),
            tags: LEAD_TAGS.iter().map(|t| t.to_string()).collect(),
            ..CustomerInput::new(name, email)
        };

        match self.customers().create(input).await {
            Ok(customer) => {
                info!(
                    "✓ Created customer {} from lead {} ({})",
                    customer.id, lead.lead_id, lead.source
                );
                Ok(LeadOutcome {
                    lead_id: lead.lead_id,
                    customer_id: Some(customer.id),
                    created: true,
                })
            }
            // The email index already holds this address.
            Err(Error::Conflict { ref field, .. }) if field == "email" => {
                debug!("Lead {} matches an existing customer", lead.lead_id);
                Ok(skipped)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Customer, CustomerFilter};
    use crate::page::PageRequest;

    #[tokio::test]
    async fn test_lead_creates_customer_once() {
        let store = Store::in_memory();
        let mut lead = LeadWebhook::new("L-1").contact("Kim", "Kim@Example.com");
        lead.company = Some("Acme".into());

        let first = store.ingest_lead(lead.clone()).await.unwrap();
        assert!(first.created);
        let customer: Customer = store.get(first.customer_id.as_deref().unwrap()).await.unwrap();
        assert_eq!(customer.status, CustomerStatus::Lead);
        assert_eq!(customer.tags, vec!["webhook", "lead"]);
        assert_eq!(customer.company.as_deref(), Some("Acme"));

        let again = store
            .ingest_lead(LeadWebhook::new("L-2").contact("Kimberly", "kim@example.com"))
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.customer_id, None);

        let page = store
            .customers()
            .list(&CustomerFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_lead_for_existing_customer_leaves_it_untouched() {
        let store = Store::in_memory();
        let mut input = CustomerInput::new("Sam", "sam@example.com");
        input.status = Some(CustomerStatus::Active);
        let sam = store.customers().create(input).await.unwrap();

        let outcome = store
            .ingest_lead(LeadWebhook::new("L-4").contact("Samuel", "  SAM@example.com "))
            .await
            .unwrap();
        assert!(!outcome.created);

        let stored: Customer = store.get(&sam.id).await.unwrap();
        assert_eq!(stored, sam);
        assert_eq!(store.count::<Customer>().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lead_without_contact_is_acknowledged() {
        let store = Store::in_memory();
        let mut lead = LeadWebhook::new("L-3");
        lead.email = Some("x@example.com".into());

        let outcome = store.ingest_lead(lead).await.unwrap();
        assert_eq!(
            outcome,
            LeadOutcome {
                lead_id: "L-3".into(),
                customer_id: None,
                created: false
            }
        );
        assert_eq!(store.count::<Customer>().await.unwrap(), 0);
    }

    #[test]
    fn test_payload_defaults() {
        let lead: LeadWebhook = serde_json::from_str(r#"{"leadId": "L-9"}"#).unwrap();
        assert_eq!(lead.source, "webhook");
        assert!(lead.metadata.is_empty());
        assert!(lead.identity().is_none());
    }
}
