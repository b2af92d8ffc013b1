use axum::http::{header, HeaderMap};
use bcrypt::DEFAULT_COST;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Fixed demonstration identity. It authenticates without touching the
/// database and is treated as an ordinary owner afterwards, so it never
/// needs a stored credential.
pub const DEMO_EMAIL: &str = "demo@demo.com";
pub const DEMO_PASSWORD: &str = "demo123";
pub const DEMO_NAME: &str = "Demo User";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    MissingToken,
    #[error("invalid session token: {0}")]
    InvalidToken(String),
    #[error("could not issue session token: {0}")]
    TokenIssue(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Owner keys are always the trimmed, lowercased email. Every stored
/// record and every comparison goes through this, so letter casing can
/// neither fork an identity nor bypass an ownership check.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn is_demo_identity(email: &str, password: &str) -> bool {
    normalize_email(email) == DEMO_EMAIL && password == DEMO_PASSWORD
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: usize,
    exp: usize,
}

/// Issues and verifies the signed session tokens that gate every
/// owner-scoped operation.
#[derive(Clone)]
pub struct SessionAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: i64,
}

impl SessionAuth {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        SessionAuth {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        }
    }

    pub fn issue(&self, owner: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: normalize_email(owner),
            iat: now as usize,
            exp: (now + self.expiry_hours * 3600) as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(data.claims.sub)
    }

    /// Resolve the calling owner from `Authorization: Bearer <token>`.
    /// Failure here fails the whole request before any data access.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;
        let token = value.strip_prefix("Bearer ").ok_or(AuthError::MissingToken)?;

        self.verify(token)
    }
}

/// Bcrypt runs on the blocking pool so a hash never stalls the runtime.
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();

    tokio::task::spawn_blocking(move || {
        bcrypt::hash(password, DEFAULT_COST).map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hashing(e.to_string()))?
}

pub async fn verify_password(password: &str, hashed: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let hashed = hashed.to_string();

    tokio::task::spawn_blocking(move || {
        bcrypt::verify(password, &hashed).map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hashing(e.to_string()))?
}
