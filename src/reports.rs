//! Aggregate reports over the three collections.
//!
//! Each report is a pure function of the scanned documents and `now`; the
//! [`Store`] methods fetch the collections (concurrently where several are
//! needed) and hand them over.

use crate::error::Result;
use crate::model::{Customer, CustomerStatus, Invoice, InvoiceStatus, Query, QueryStatus};
use crate::store::Store;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Months kept in the summary's invoice breakdown.
pub const SUMMARY_MONTHS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    /// Query count per status.
    pub queries: BTreeMap<String, usize>,
    /// Invoice totals per issue month, newest first.
    pub invoices: Vec<MonthTotals>,
    /// Customer count and revenue per status.
    pub customers: BTreeMap<String, StatusTotals>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthTotals {
    /// `YYYY-MM`
    pub month: String,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotals {
    pub count: usize,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub period: String,
    pub revenue_data: Vec<MonthlyRevenue>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub total_revenue: f64,
    pub invoice_count: usize,
    pub avg_invoice_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalytics {
    pub period: String,
    pub analytics: Vec<QueryBucket>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBucket {
    /// `YYYY-MM-DD`
    pub date: String,
    pub status: String,
    pub priority: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCustomer {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub total_revenue: f64,
    pub status: CustomerStatus,
}

pub fn summary(
    queries: &[Query],
    invoices: &[Invoice],
    customers: &[Customer],
    now: DateTime<Utc>,
) -> SummaryReport {
    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    for q in queries {
        *by_status.entry(q.status.as_str().to_string()).or_default() += 1;
    }

    let mut by_month: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for inv in invoices {
        let slot = by_month
            .entry(inv.issue_date.format("%Y-%m").to_string())
            .or_default();
        slot.0 += inv.total;
        slot.1 += 1;
    }
    let invoices = by_month
        .into_iter()
        .rev()
        .take(SUMMARY_MONTHS)
        .map(|(month, (total, count))| MonthTotals {
            month,
            total,
            count,
        })
        .collect();

    let mut by_customer_status: BTreeMap<String, StatusTotals> = BTreeMap::new();
    for c in customers {
        let slot = by_customer_status
            .entry(c.status.as_str().to_string())
            .or_default();
        slot.count += 1;
        slot.total_revenue += c.total_revenue;
    }

    SummaryReport {
        queries: by_status,
        invoices,
        customers: by_customer_status,
        generated_at: now,
    }
}

/// Paid and Sent invoices issued in the last `months * 30` days, by month ascending.
pub fn revenue_by_month(invoices: &[Invoice], months: u32, now: DateTime<Utc>) -> RevenueReport {
    let start = now - Duration::days(i64::from(months) * 30);

    let mut groups: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for inv in invoices.iter().filter(|i| {
        matches!(i.status, InvoiceStatus::Paid | InvoiceStatus::Sent)
            && i.issue_date >= start
            && i.issue_date <= now
    }) {
        let slot = groups
            .entry((inv.issue_date.year(), inv.issue_date.month()))
            .or_default();
        slot.0 += inv.total;
        slot.1 += 1;
    }

    RevenueReport {
        period: format!("Last {} months", months),
        revenue_data: groups
            .into_iter()
            .map(|((year, month), (total, count))| MonthlyRevenue {
                year,
                month,
                total_revenue: total,
                invoice_count: count,
                avg_invoice_value: total / count as f64,
            })
            .collect(),
        generated_at: now,
    }
}

/// Queries created in the last `days` days, counted per (date, status, priority).
pub fn query_analytics(
    queries: &[Query],
    days: u32,
    status: Option<QueryStatus>,
    now: DateTime<Utc>,
) -> QueryAnalytics {
    let start = now - Duration::days(i64::from(days));

    let mut groups: BTreeMap<(String, String, String), usize> = BTreeMap::new();
    for q in queries.iter().filter(|q| {
        q.created_at >= start && q.created_at <= now && status.map_or(true, |s| s == q.status)
    }) {
        let key = (
            q.created_at.format("%Y-%m-%d").to_string(),
            q.status.as_str().to_string(),
            q.priority.as_str().to_string(),
        );
        *groups.entry(key).or_default() += 1;
    }

    QueryAnalytics {
        period: format!("Last {} days", days),
        analytics: groups
            .into_iter()
            .map(|((date, status, priority), count)| QueryBucket {
                date,
                status,
                priority,
                count,
            })
            .collect(),
        generated_at: now,
    }
}

/// Customers with positive revenue, highest first.
pub fn top_customers(customers: &[Customer], limit: usize) -> Vec<TopCustomer> {
    let mut ranked: Vec<&Customer> = customers.iter().filter(|c| c.total_revenue > 0.0).collect();
    ranked.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    ranked
        .into_iter()
        .take(limit)
        .map(|c| TopCustomer {
            id: c.id.clone(),
            name: c.name.clone(),
            email: c.email.clone(),
            company: c.company.clone(),
            total_revenue: c.total_revenue,
            status: c.status,
        })
        .collect()
}

impl Store {
    pub async fn summary_report(&self) -> Result<SummaryReport> {
        let (queries, invoices, customers) = futures::try_join!(
            self.all::<Query>(),
            self.all::<Invoice>(),
            self.all::<Customer>()
        )?;
        debug!(
            "✓ Summary over {} queries, {} invoices, {} customers",
            queries.len(),
            invoices.len(),
            customers.len()
        );
        Ok(summary(&queries, &invoices, &customers, Utc::now()))
    }

    pub async fn revenue_by_month(&self, months: u32) -> Result<RevenueReport> {
        let invoices = self.all::<Invoice>().await?;
        Ok(revenue_by_month(&invoices, months, Utc::now()))
    }

    pub async fn query_analytics(
        &self,
        days: u32,
        status: Option<QueryStatus>,
    ) -> Result<QueryAnalytics> {
        let queries = self.all::<Query>().await?;
        Ok(query_analytics(&queries, days, status, Utc::now()))
    }

    pub async fn top_customers(&self, limit: usize) -> Result<Vec<TopCustomer>> {
        let customers = self.all::<Customer>().await?;
        Ok(top_customers(&customers, limit))
    }
}
