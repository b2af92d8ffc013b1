use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::clients::ClientRequest;
use super::invoices::InvoiceRequest;
use super::upload::UploadRequest;
use super::users::UserRequest;
use super::ServiceError;
use crate::auth::{self, SessionAuth};
use crate::models::clients::NewClient;
use crate::models::invoices::{AmountSort, InvoiceView, NewInvoice};
use crate::models::users::{Credentials, NewUser, Profile, ProfileUpdate};

#[derive(Clone)]
struct AppState {
    auth: SessionAuth,
    user_channel: mpsc::Sender<UserRequest>,
    client_channel: mpsc::Sender<ClientRequest>,
    invoice_channel: mpsc::Sender<InvoiceRequest>,
    upload_channel: mpsc::Sender<UploadRequest>,
}

fn error_response(error: ServiceError) -> (StatusCode, Json<Value>) {
    match error {
        ServiceError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        ),
        ServiceError::Validation(message) => {
            (StatusCode::BAD_REQUEST, Json(json!({"error": message})))
        }
        ServiceError::NotFound(what) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("{} not found", what)})),
        ),
        other => {
            // Upstream detail goes to the log, never to the caller.
            log::error!("Request failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
        }
    }
}

/// Resolve the owner identity before anything else runs; no handler
/// touches data without it.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<String, (StatusCode, Json<Value>)> {
    state.auth.authorize(headers).map_err(|e| {
        log::debug!("Rejected session token: {}", e);
        error_response(ServiceError::Unauthorized)
    })
}

async fn dispatch<T, R>(
    channel: &mpsc::Sender<T>,
    request: T,
    receiver: oneshot::Receiver<Result<R, ServiceError>>,
) -> Result<R, ServiceError> {
    if channel.send(request).await.is_err() {
        return Err(ServiceError::Internal("service channel closed".to_string()));
    }

    match receiver.await {
        Ok(result) => result,
        Err(e) => Err(ServiceError::Internal(format!(
            "service dropped the response: {}",
            e
        ))),
    }
}

async fn signup(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> (StatusCode, Json<Value>) {
    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.user_channel,
        UserRequest::Signup { body, response: tx },
        rx,
    )
    .await
    {
        Ok(user) => (
            StatusCode::CREATED,
            Json(json!({"id": user.id, "email": user.email})),
        ),
        Err(e) => error_response(e),
    }
}

async fn login(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> (StatusCode, Json<Value>) {
    // The demo identity validates with no stored credential at all.
    if auth::is_demo_identity(&creds.email, &creds.password) {
        return match state.auth.issue(auth::DEMO_EMAIL) {
            Ok(token) => (
                StatusCode::OK,
                Json(json!({
                    "token": token,
                    "email": auth::DEMO_EMAIL,
                    "fullName": auth::DEMO_NAME,
                })),
            ),
            Err(e) => error_response(ServiceError::Internal(e.to_string())),
        };
    }

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.user_channel,
        UserRequest::VerifyCredentials {
            email: creds.email,
            password: creds.password,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(Some(user)) => match state.auth.issue(&user.email) {
            Ok(token) => (
                StatusCode::OK,
                Json(json!({
                    "token": token,
                    "email": user.email,
                    "fullName": user.full_name,
                })),
            ),
            Err(e) => error_response(ServiceError::Internal(e.to_string())),
        },
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid email or password"})),
        ),
        Err(e) => error_response(e),
    }
}

async fn list_clients(State(state): State<AppState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let owner = match authorize(&state, &headers) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.client_channel,
        ClientRequest::List {
            owner,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(clients) => (
            StatusCode::OK,
            Json(json!({"success": true, "clients": clients})),
        ),
        Err(e) => error_response(e),
    }
}

async fn create_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewClient>,
) -> (StatusCode, Json<Value>) {
    let owner = match authorize(&state, &headers) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.client_channel,
        ClientRequest::Create {
            owner,
            body,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(client) => (
            StatusCode::CREATED,
            Json(json!({"success": true, "client": client})),
        ),
        Err(e) => error_response(e),
    }
}

async fn delete_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let owner = match authorize(&state, &headers) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.client_channel,
        ClientRequest::Delete {
            owner,
            id,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({"success": true}))),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceListQuery {
    is_paid: Option<String>,
    sort_by: Option<String>,
}

async fn list_invoices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<InvoiceListQuery>,
) -> (StatusCode, Json<Value>) {
    let owner = match authorize(&state, &headers) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };

    let paid = match query.is_paid.as_deref() {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    };
    let sort = AmountSort::from_query(query.sort_by.as_deref());

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.invoice_channel,
        InvoiceRequest::List {
            owner,
            paid,
            sort,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(records) => {
            let items: Vec<InvoiceView> = records.iter().map(InvoiceView::from_record).collect();
            (
                StatusCode::OK,
                Json(json!({"items": items, "total": items.len()})),
            )
        }
        Err(e) => error_response(e),
    }
}

async fn create_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewInvoice>,
) -> (StatusCode, Json<Value>) {
    let owner = match authorize(&state, &headers) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.invoice_channel,
        InvoiceRequest::Create {
            owner,
            body,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(invoice) => (StatusCode::CREATED, Json(json!(invoice))),
        Err(e) => error_response(e),
    }
}

async fn invoice_analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let owner = match authorize(&state, &headers) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.invoice_channel,
        InvoiceRequest::Analytics {
            owner,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(report) => (StatusCode::OK, Json(json!(report))),
        Err(e) => error_response(e),
    }
}

async fn upload_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    let mut file: Option<(String, String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let filename = field.file_name().unwrap_or("document.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(data) => {
                        file = Some((filename, content_type, data.to_vec()));
                        break;
                    }
                    Err(e) => {
                        log::debug!("Unreadable file field: {}", e);
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"error": "Could not read file field"})),
                        );
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                log::debug!("Malformed multipart body: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "Malformed multipart body"})),
                );
            }
        }
    }

    let Some((filename, content_type, data)) = file else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No file"})));
    };

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.upload_channel,
        UploadRequest::StoreDocument {
            filename,
            content_type,
            data,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(document) => (StatusCode::OK, Json(json!(document))),
        Err(e) => error_response(e),
    }
}

async fn get_profile(State(state): State<AppState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let owner = match authorize(&state, &headers) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.user_channel,
        UserRequest::GetProfile {
            owner,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(Some(user)) => (StatusCode::OK, Json(json!(Profile::from(&user)))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found"})),
        ),
        Err(e) => error_response(e),
    }
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> (StatusCode, Json<Value>) {
    let owner = match authorize(&state, &headers) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };

    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.user_channel,
        UserRequest::UpdateProfile {
            owner,
            update,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(Some(user)) => (StatusCode::OK, Json(json!(Profile::from(&user)))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found"})),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn start_http_server(
    listen: &str,
    session_auth: SessionAuth,
    user_channel: mpsc::Sender<UserRequest>,
    client_channel: mpsc::Sender<ClientRequest>,
    invoice_channel: mpsc::Sender<InvoiceRequest>,
    upload_channel: mpsc::Sender<UploadRequest>,
) -> Result<(), anyhow::Error> {
    let app_state = AppState {
        auth: session_auth,
        user_channel,
        client_channel,
        invoice_channel,
        upload_channel,
    };

    let app = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/clients", get(list_clients).post(create_client))
        .route("/clients/{id}", delete(delete_client))
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/analytics", get(invoice_analytics))
        .route("/upload", post(upload_document))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
