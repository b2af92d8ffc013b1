use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{required_text, RequestHandler, Service, ServiceError};
use crate::analytics::{self, AnalyticsReport};
use crate::models::invoices::{AmountSort, Invoice, InvoiceWithClient, NewInvoice};
use crate::repositories::invoices::InvoiceRepository;
use crate::utils;

pub enum InvoiceRequest {
    Create {
        owner: String,
        body: NewInvoice,
        response: oneshot::Sender<Result<Invoice, ServiceError>>,
    },
    List {
        owner: String,
        paid: Option<bool>,
        sort: AmountSort,
        response: oneshot::Sender<Result<Vec<InvoiceWithClient>, ServiceError>>,
    },
    Analytics {
        owner: String,
        response: oneshot::Sender<Result<AnalyticsReport, ServiceError>>,
    },
}

#[derive(Debug)]
struct ValidInvoice {
    fy_year: String,
    client_id: Option<String>,
    name: String,
    date: NaiveDate,
    number: String,
    amount: f64,
    description: String,
    is_paid: bool,
    payment_date: Option<NaiveDate>,
    pdf_url: String,
}

/// Amounts arrive as a JSON number or a numeric string; anything else is
/// not numeric.
fn numeric_amount(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// All invoice validation in one place, before any write is attempted.
fn validate_new_invoice(body: NewInvoice) -> Result<ValidInvoice, ServiceError> {
    let fy_year = required_text(body.fy_year, "fyYear")?;
    let name = required_text(body.name, "name")?;
    let raw_date = required_text(body.date, "date")?;
    let number = required_text(body.number, "number")?;
    let pdf_url = required_text(body.pdf_url, "pdfUrl")?;

    let date = utils::parse_date(&raw_date)
        .ok_or_else(|| ServiceError::Validation("date is not a valid date".to_string()))?;

    let amount = body
        .amount
        .as_ref()
        .and_then(numeric_amount)
        .ok_or_else(|| ServiceError::Validation("amount must be numeric".to_string()))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(ServiceError::Validation(
            "amount must be a finite, non-negative number".to_string(),
        ));
    }

    let payment_date = match body.payment_date.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(utils::parse_date(raw).ok_or_else(|| {
            ServiceError::Validation("paymentDate is not a valid date".to_string())
        })?),
        _ => None,
    };

    Ok(ValidInvoice {
        fy_year,
        client_id: body.client_id.filter(|id| !id.trim().is_empty()),
        name,
        date,
        number,
        amount,
        description: body.description.unwrap_or_default(),
        is_paid: body.is_paid.unwrap_or(false),
        payment_date,
        pdf_url,
    })
}

#[derive(Clone)]
pub struct InvoiceRequestHandler {
    repository: InvoiceRepository,
    enforce_unique_numbers: bool,
}

impl InvoiceRequestHandler {
    pub fn new(sql_conn: PgPool, enforce_unique_numbers: bool) -> Self {
        let repository = InvoiceRepository::new(sql_conn);

        InvoiceRequestHandler {
            repository,
            enforce_unique_numbers,
        }
    }

    async fn create_invoice(&self, owner: &str, body: NewInvoice) -> Result<Invoice, ServiceError> {
        let valid = validate_new_invoice(body)?;

        if self.enforce_unique_numbers {
            let existing = self
                .repository
                .count_by_number(owner, &valid.number)
                .await
                .map_err(|e| ServiceError::Database(e.to_string()))?;
            if existing > 0 {
                return Err(ServiceError::Validation(format!(
                    "Invoice number {} already exists",
                    valid.number
                )));
            }
        }

        self.repository
            .insert_invoice(
                owner,
                valid.client_id.as_deref(),
                &valid.fy_year,
                &valid.name,
                valid.date,
                &valid.number,
                valid.amount,
                &valid.description,
                valid.is_paid,
                valid.payment_date,
                &valid.pdf_url,
            )
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn list_invoices(
        &self,
        owner: &str,
        paid: Option<bool>,
        sort: AmountSort,
    ) -> Result<Vec<InvoiceWithClient>, ServiceError> {
        self.repository
            .list_for_owner(owner, paid, sort)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    /// Recomputed from the owner's full invoice set on every call; the
    /// engine itself holds no state to invalidate.
    async fn analytics(&self, owner: &str) -> Result<AnalyticsReport, ServiceError> {
        let items = self.list_invoices(owner, None, AmountSort::Desc).await?;

        Ok(analytics::report(&items, Utc::now().date_naive()))
    }
}

#[async_trait]
impl RequestHandler<InvoiceRequest> for InvoiceRequestHandler {
    async fn handle_request(&self, request: InvoiceRequest) {
        match request {
            InvoiceRequest::Create {
                owner,
                body,
                response,
            } => {
                let invoice = self.create_invoice(&owner, body).await;
                let _ = response.send(invoice);
            }
            InvoiceRequest::List {
                owner,
                paid,
                sort,
                response,
            } => {
                let invoices = self.list_invoices(&owner, paid, sort).await;
                let _ = response.send(invoices);
            }
            InvoiceRequest::Analytics { owner, response } => {
                let report = self.analytics(&owner).await;
                let _ = response.send(report);
            }
        }
    }
}

pub struct InvoiceService;

impl InvoiceService {
    pub fn new() -> Self {
        InvoiceService {}
    }
}

#[async_trait]
impl Service<InvoiceRequest, InvoiceRequestHandler> for InvoiceService {}
