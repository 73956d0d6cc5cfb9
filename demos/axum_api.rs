//! HTTP routes over the CRM store, using axum.
//!
//! ```bash
//! cargo run --example axum_api
//! curl -X POST localhost:3000/api/customers \
//!      -H 'content-type: application/json' \
//!      -d '{"name":"Jane Doe","email":"jane@example.com"}'
//! ```

use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use crm_store::lead::LeadWebhook;
use crm_store::model::{
    Customer, CustomerFilter, CustomerInput, CustomerPatch, Invoice, InvoiceFilter, InvoiceInput,
    InvoicePatch, LineItemInput, LineItemPatch, NoteInput, NotePatch, Query, QueryFilter,
    QueryInput, QueryPatch,
};
use crm_store::{DataResponse, Error, ErrorResponse, PageRequest, Store, StoreConfig};
use serde::Deserialize;
use serde_json::json;

/// Store error rendered as `{ error, errors? }` with the mapped status.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("request failed: {}", self.0);
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<DataResponse<T>>, ApiError>;

fn data<T>(value: T) -> ApiResult<T> {
    Ok(Json(DataResponse::new(value)))
}

// ---- customers -------------------------------------------------------------

async fn list_customers(
    State(store): State<Store>,
    QueryParams(page): QueryParams<PageRequest>,
    QueryParams(filter): QueryParams<CustomerFilter>,
) -> ApiResult<Vec<crm_store::model::CustomerView>> {
    let page = store.customers().list_views(&filter, page).await?;
    Ok(Json(page.into()))
}

async fn create_customer(
    State(store): State<Store>,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<DataResponse<Customer>>), ApiError> {
    let customer = store.customers().create(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(customer))))
}

async fn get_customer(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> ApiResult<crm_store::model::CustomerView> {
    data(store.customers().get_view(&id).await?)
}

async fn update_customer(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(patch): Json<CustomerPatch>,
) -> ApiResult<Customer> {
    data(store.customers().update(&id, patch).await?)
}

async fn delete_customer(State(store): State<Store>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    store.customers().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- invoices --------------------------------------------------------------

async fn list_invoices(
    State(store): State<Store>,
    QueryParams(page): QueryParams<PageRequest>,
    QueryParams(filter): QueryParams<InvoiceFilter>,
) -> ApiResult<Vec<crm_store::model::InvoiceView>> {
    let page = store.invoices().list_views(&filter, page).await?;
    Ok(Json(page.into()))
}

async fn create_invoice(
    State(store): State<Store>,
    Json(input): Json<InvoiceInput>,
) -> Result<(StatusCode, Json<DataResponse<Invoice>>), ApiError> {
    let invoice = store.invoices().create(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(invoice))))
}

async fn get_invoice(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> ApiResult<crm_store::model::InvoiceView> {
    data(store.invoices().get_view(&id).await?)
}

async fn update_invoice(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(patch): Json<InvoicePatch>,
) -> ApiResult<Invoice> {
    data(store.invoices().update(&id, patch).await?)
}

async fn delete_invoice(State(store): State<Store>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    store.invoices().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_line_item(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(input): Json<LineItemInput>,
) -> Result<(StatusCode, Json<DataResponse<crm_store::model::LineItem>>), ApiError> {
    let item = store.invoices().add_child(&id, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(item))))
}

async fn update_line_item(
    State(store): State<Store>,
    Path((id, item_id)): Path<(String, String)>,
    Json(patch): Json<LineItemPatch>,
) -> ApiResult<crm_store::model::LineItem> {
    data(store.invoices().update_child(&id, &item_id, patch).await?)
}

async fn remove_line_item(
    State(store): State<Store>,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    store.invoices().remove_child(&id, &item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- queries ---------------------------------------------------------------

async fn list_queries(
    State(store): State<Store>,
    QueryParams(page): QueryParams<PageRequest>,
    QueryParams(filter): QueryParams<QueryFilter>,
) -> ApiResult<Vec<crm_store::model::QueryView>> {
    let page = store.queries().list_views(&filter, page).await?;
    Ok(Json(page.into()))
}

async fn create_query(
    State(store): State<Store>,
    Json(input): Json<QueryInput>,
) -> Result<(StatusCode, Json<DataResponse<Query>>), ApiError> {
    let query = store.queries().create(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(query))))
}

async fn get_query(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> ApiResult<crm_store::model::QueryView> {
    data(store.queries().get_view(&id).await?)
}

async fn update_query(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(patch): Json<QueryPatch>,
) -> ApiResult<Query> {
    data(store.queries().update(&id, patch).await?)
}

async fn delete_query(State(store): State<Store>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    store.queries().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_note(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(input): Json<NoteInput>,
) -> Result<(StatusCode, Json<DataResponse<crm_store::model::Note>>), ApiError> {
    let note = store.queries().add_child(&id, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(note))))
}

async fn update_note(
    State(store): State<Store>,
    Path((id, note_id)): Path<(String, String)>,
    Json(patch): Json<NotePatch>,
) -> ApiResult<crm_store::model::Note> {
    data(store.queries().update_child(&id, &note_id, patch).await?)
}

async fn remove_note(
    State(store): State<Store>,
    Path((id, note_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    store.queries().remove_child(&id, &note_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- integration -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TopParams {
    #[serde(default = "default_top")]
    limit: usize,
}

fn default_top() -> usize {
    10
}

async fn summary_report(State(store): State<Store>) -> Result<Response, ApiError> {
    Ok(Json(store.summary_report().await?).into_response())
}

async fn top_customers(
    State(store): State<Store>,
    QueryParams(params): QueryParams<TopParams>,
) -> Result<Response, ApiError> {
    let top = store.top_customers(params.limit).await?;
    Ok(Json(json!({ "topCustomers": top })).into_response())
}

async fn webhook(
    State(store): State<Store>,
    Json(lead): Json<LeadWebhook>,
) -> Result<Response, ApiError> {
    Ok(Json(store.ingest_lead(lead).await?).into_response())
}

/// Health check endpoint
async fn health(State(store): State<Store>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "backend": store.mode(),
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .ok();

    let store = Store::connect(&StoreConfig::from_env()?).await;

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/customers", get(list_customers).post(create_customer))
        .route(
            "/api/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/api/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/api/invoices/{id}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/api/invoices/{id}/line-items", post(add_line_item))
        .route(
            "/api/invoices/{id}/line-items/{item_id}",
            put(update_line_item).delete(remove_line_item),
        )
        .route("/api/queries", get(list_queries).post(create_query))
        .route(
            "/api/queries/{id}",
            get(get_query).put(update_query).delete(delete_query),
        )
        .route("/api/queries/{id}/notes", post(add_note))
        .route(
            "/api/queries/{id}/notes/{note_id}",
            put(update_note).delete(remove_note),
        )
        .route("/integration/reports/summary", get(summary_report))
        .route("/integration/customers/top", get(top_customers))
        .route("/integration/webhook", post(webhook))
        .with_state(store);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    log::info!("✓ Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
