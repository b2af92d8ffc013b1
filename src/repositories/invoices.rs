use crate::models::invoices::{self, AmountSort};

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct InvoiceRepository {
    conn: PgPool,
}

impl InvoiceRepository {
    pub fn new(conn: PgPool) -> Self {
        InvoiceRepository { conn }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_invoice(
        &self,
        owner: &str,
        client_id: Option<&str>,
        fy_year: &str,
        name: &str,
        date: NaiveDate,
        number: &str,
        amount: f64,
        description: &str,
        is_paid: bool,
        payment_date: Option<NaiveDate>,
        pdf_url: &str,
    ) -> Result<invoices::Invoice, anyhow::Error> {
        let invoice_id = Uuid::new_v4().hyphenated().to_string();

        let invoice = sqlx::query_as::<_, invoices::Invoice>(
            r#"
                INSERT INTO invoices
                (id, owner_email, client_id, fy_year, name, date, number, amount, description, is_paid, payment_date, pdf_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING *
            "#,
        )
        .bind(&invoice_id)
        .bind(owner)
        .bind(client_id)
        .bind(fy_year)
        .bind(name)
        .bind(date)
        .bind(number)
        .bind(amount)
        .bind(description)
        .bind(is_paid)
        .bind(payment_date)
        .bind(pdf_url)
        .fetch_one(&self.conn)
        .await?;

        Ok(invoice)
    }

    /// Owner-scoped listing with the client name resolved through a LEFT
    /// JOIN: a deleted client leaves the invoice intact with a null name.
    pub async fn list_for_owner(
        &self,
        owner: &str,
        paid: Option<bool>,
        sort: AmountSort,
    ) -> Result<Vec<invoices::InvoiceWithClient>, anyhow::Error> {
        let mut sql = String::from(
            r#"
                SELECT i.id, i.fy_year, i.client_id, c.name AS client_name,
                       i.name, i.date, i.number, i.amount, i.description,
                       i.is_paid, i.payment_date, i.pdf_url, i.created_at
                FROM invoices i
                LEFT JOIN clients c ON c.id = i.client_id
                WHERE i.owner_email = $1
            "#,
        );
        if paid.is_some() {
            sql.push_str(" AND i.is_paid = $2");
        }
        sql.push_str(match sort {
            AmountSort::Asc => " ORDER BY i.amount ASC",
            AmountSort::Desc => " ORDER BY i.amount DESC",
        });

        let mut query = sqlx::query_as::<_, invoices::InvoiceWithClient>(&sql).bind(owner);
        if let Some(paid) = paid {
            query = query.bind(paid);
        }

        let invoices = query.fetch_all(&self.conn).await?;

        Ok(invoices)
    }

    pub async fn count_by_number(&self, owner: &str, number: &str) -> Result<i64, anyhow::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM invoices WHERE owner_email = $1 AND number = $2",
        )
        .bind(owner)
        .bind(number)
        .fetch_one(&self.conn)
        .await?;

        Ok(count)
    }
}
