use crate::models::clients;

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ClientRepository {
    conn: PgPool,
}

impl ClientRepository {
    pub fn new(conn: PgPool) -> Self {
        ClientRepository { conn }
    }

    pub async fn insert_client(
        &self,
        owner: &str,
        name: &str,
        address: &str,
        service_type: &str,
        joining_date: NaiveDate,
    ) -> Result<clients::Client, anyhow::Error> {
        let client_id = Uuid::new_v4().hyphenated().to_string();

        let client = sqlx::query_as::<_, clients::Client>(
            r#"
                INSERT INTO clients (id, owner_email, name, address, service_type, joining_date)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            "#,
        )
        .bind(&client_id)
        .bind(owner)
        .bind(name)
        .bind(address)
        .bind(service_type)
        .bind(joining_date)
        .fetch_one(&self.conn)
        .await?;

        Ok(client)
    }

    pub async fn list_for_owner(&self, owner: &str) -> Result<Vec<clients::Client>, anyhow::Error> {
        let clients = sqlx::query_as::<_, clients::Client>(
            "SELECT * FROM clients WHERE owner_email = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.conn)
        .await?;

        Ok(clients)
    }

    /// Deletes only when both id and owner match, so "missing" and "not
    /// yours" are indistinguishable to the caller. Invoices referencing
    /// the client are left untouched.
    pub async fn delete_scoped(&self, owner: &str, id: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND owner_email = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
