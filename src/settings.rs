use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub url: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoices {
    pub enforce_unique_numbers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub http: Http,
    pub auth: Auth,
    pub storage: Storage,
    pub invoices: Invoices,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        config.try_deserialize()
    }
}
