use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub owner_email: String,
    pub name: String,
    pub address: String,
    pub service_type: String,
    pub joining_date: chrono::NaiveDate,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub name: Option<String>,
    pub address: Option<String>,
    pub service_type: Option<String>,
    pub joining_date: Option<String>,
}
