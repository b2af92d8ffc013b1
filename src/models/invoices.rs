use serde::{Deserialize, Serialize};

use crate::utils;

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub owner_email: String,
    pub client_id: Option<String>,
    pub fy_year: String,
    pub name: String,
    pub date: Option<chrono::NaiveDate>,
    pub number: String,
    pub amount: f64,
    pub description: String,
    pub is_paid: bool,
    pub payment_date: Option<chrono::NaiveDate>,
    pub pdf_url: String,
    pub created_at: chrono::NaiveDateTime,
}

/// Invoice creation body. `amount` is kept as raw JSON because callers
/// send it both as a number and as a numeric string; the invoice service
/// coerces and validates it.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    pub fy_year: Option<String>,
    pub client_id: Option<String>,
    pub name: Option<String>,
    pub date: Option<String>,
    pub number: Option<String>,
    pub amount: Option<serde_json::Value>,
    pub description: Option<String>,
    pub is_paid: Option<bool>,
    pub payment_date: Option<String>,
    pub pdf_url: Option<String>,
}

/// Owner-scoped invoice joined with the client it references. The join is
/// a weak reference: a deleted client simply leaves `client_name` empty.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceWithClient {
    pub id: String,
    pub fy_year: String,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub name: String,
    pub date: Option<chrono::NaiveDate>,
    pub number: String,
    pub amount: f64,
    pub description: String,
    pub is_paid: bool,
    pub payment_date: Option<chrono::NaiveDate>,
    pub pdf_url: String,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRef {
    pub id: String,
    pub name: String,
}

/// The list-endpoint item shape: the resolved client nested (or null) and
/// the document URL exposed both raw and normalized for inline preview.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    pub id: String,
    pub fy_year: String,
    pub client: Option<ClientRef>,
    pub name: String,
    pub date: Option<chrono::NaiveDate>,
    pub number: String,
    pub amount: f64,
    pub description: String,
    pub is_paid: bool,
    pub payment_date: Option<chrono::NaiveDate>,
    pub pdf_url: String,
    pub pdf_preview_url: String,
    pub created_at: chrono::NaiveDateTime,
}

impl InvoiceView {
    pub fn from_record(record: &InvoiceWithClient) -> Self {
        let client = match (&record.client_id, &record.client_name) {
            (Some(id), Some(name)) => Some(ClientRef {
                id: id.clone(),
                name: name.clone(),
            }),
            _ => None,
        };

        InvoiceView {
            id: record.id.clone(),
            fy_year: record.fy_year.clone(),
            client,
            name: record.name.clone(),
            date: record.date,
            number: record.number.clone(),
            amount: record.amount,
            description: record.description.clone(),
            is_paid: record.is_paid,
            payment_date: record.payment_date,
            pdf_url: record.pdf_url.clone(),
            pdf_preview_url: utils::normalize_preview_url(&record.pdf_url),
            created_at: record.created_at,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmountSort {
    Asc,
    Desc,
}

impl AmountSort {
    /// `sortBy=amountAsc` selects ascending; anything else keeps the
    /// default highest-amount-first ordering.
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some("amountAsc") => AmountSort::Asc,
            _ => AmountSort::Desc,
        }
    }
}
