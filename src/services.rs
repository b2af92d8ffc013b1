use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::auth::SessionAuth;
use crate::settings::Settings;

mod clients;
mod http;
mod invoices;
mod upload;
mod users;

#[derive(Debug, thiserror::Error)]
enum ServiceError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Database error: {0}")]
    Database(String),
    #[error("External service error: {0} -> {1} => {2}")]
    ExternalService(String, String, String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Required-field check shared by the validating services; the message
/// names the violated field so the 400 body is self-explanatory. The
/// stored value is the trimmed one.
fn required_text(value: Option<String>, field: &str) -> Result<String, ServiceError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ServiceError::Validation(format!("{} is required", field))),
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (user_tx, mut user_rx) = mpsc::channel(512);
    let (client_tx, mut client_rx) = mpsc::channel(512);
    let (invoice_tx, mut invoice_rx) = mpsc::channel(512);
    let (upload_tx, mut upload_rx) = mpsc::channel(512);

    let mut user_service = users::UserService::new();
    let mut client_service = clients::ClientService::new();
    let mut invoice_service = invoices::InvoiceService::new();
    let mut upload_service = upload::UploadService::new();

    log::info!("Starting user service.");
    let user_pool = pool.clone();
    tokio::spawn(async move {
        user_service
            .run(users::UserRequestHandler::new(user_pool), &mut user_rx)
            .await;
    });

    log::info!("Starting client service.");
    let client_pool = pool.clone();
    tokio::spawn(async move {
        client_service
            .run(
                clients::ClientRequestHandler::new(client_pool),
                &mut client_rx,
            )
            .await;
    });

    log::info!("Starting invoice service.");
    let invoice_pool = pool.clone();
    let enforce_unique_numbers = settings.invoices.enforce_unique_numbers;
    tokio::spawn(async move {
        invoice_service
            .run(
                invoices::InvoiceRequestHandler::new(invoice_pool, enforce_unique_numbers),
                &mut invoice_rx,
            )
            .await;
    });

    log::info!("Starting upload service.");
    let storage_token = settings.storage.auth_token.clone();
    let storage_url = settings.storage.url.clone();
    tokio::spawn(async move {
        upload_service
            .run(
                upload::UploadRequestHandler::new(storage_token, storage_url),
                &mut upload_rx,
            )
            .await;
    });

    log::info!("Starting HTTP server.");
    let session_auth = SessionAuth::new(&settings.auth.jwt_secret, settings.auth.token_expiry_hours);
    http::start_http_server(
        &settings.http.listen,
        session_auth,
        user_tx,
        client_tx,
        invoice_tx,
        upload_tx,
    )
    .await
}
