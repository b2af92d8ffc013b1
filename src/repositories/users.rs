use crate::models::users;

use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        UserRepository { conn }
    }

    /// `email` must already be normalized; the unique index on the column
    /// is the final guard against duplicate identities.
    pub async fn insert_user(
        &self,
        email: &str,
        full_name: &str,
        phone: &str,
        company: &str,
        address: &str,
        password_hash: &str,
    ) -> Result<users::User, anyhow::Error> {
        let user_id = Uuid::new_v4().hyphenated().to_string();

        let user = sqlx::query_as::<_, users::User>(
            r#"
                INSERT INTO users (id, email, full_name, phone, company, address, password_hash, role)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 'user')
                RETURNING *
            "#,
        )
        .bind(&user_id)
        .bind(email)
        .bind(full_name)
        .bind(phone)
        .bind(company)
        .bind(address)
        .bind(password_hash)
        .fetch_one(&self.conn)
        .await?;

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    pub async fn update_profile(
        &self,
        email: &str,
        phone: &str,
        address: &str,
        company: &str,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>(
            r#"
                UPDATE users
                SET phone = $2, address = $3, company = $4, updated_at = CURRENT_TIMESTAMP
                WHERE email = $1
                RETURNING *
            "#,
        )
        .bind(email)
        .bind(phone)
        .bind(address)
        .bind(company)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::normalize_email;

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must point at a migrated test database");
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("could not connect to test database")
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres with the factura schema"]
    async fn lookup_is_case_insensitive_through_normalization() {
        let repo = UserRepository::new(test_pool().await);
        let email = format!("{}@example.com", Uuid::new_v4().hyphenated());

        repo.insert_user(&email, "Test User", "", "", "", "hash")
            .await
            .unwrap();

        let shouting = email.to_ascii_uppercase();
        let found = repo
            .find_by_email(&normalize_email(&shouting))
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().email, email);
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres with the factura schema"]
    async fn duplicate_emails_are_rejected_by_the_unique_index() {
        let repo = UserRepository::new(test_pool().await);
        let email = format!("{}@example.com", Uuid::new_v4().hyphenated());

        repo.insert_user(&email, "First", "", "", "", "hash")
            .await
            .unwrap();
        // The service checks first, but the index is the final guard.
        assert!(repo
            .insert_user(&email, "Second", "", "", "", "hash")
            .await
            .is_err());
    }
}
