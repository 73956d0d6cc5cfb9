use super::Store;
use crate::derive;
use crate::error::{Error, Result};
use crate::model::{Invoice, Query};
use crate::summarize::{self, Summarizer};

impl Store {
    /// Summarize the notes of a query through `summarizer`.
    ///
    /// # Errors
    /// `Validation` on field `notes` when the query has no non-blank notes;
    /// `Summary` when the collaborator fails.
    pub async fn summarize_query_notes<S: Summarizer>(
        &self,
        query_id: &str,
        summarizer: &S,
    ) -> Result<String> {
        let query: Query = self.get(query_id).await?;
        run(summarize::note_texts(&query), summarizer).await
    }

    /// Summarize the line-item notes of an invoice through `summarizer`.
    pub async fn summarize_invoice_notes<S: Summarizer>(
        &self,
        invoice_id: &str,
        summarizer: &S,
    ) -> Result<String> {
        let invoice: Invoice = self.get(invoice_id).await?;
        run(derive::line_item_notes(&invoice), summarizer).await
    }
}

async fn run<S: Summarizer>(notes: Vec<String>, summarizer: &S) -> Result<String> {
    if notes.is_empty() {
        return Err(Error::invalid("notes", "no notes to summarize"));
    }
    summarizer.summarize(&notes).await.map_err(Error::Summary)
}
