use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::uploads::StoredDocument;
use crate::repositories::storage::StorageApi;
use std::sync::Arc;

pub enum UploadRequest {
    StoreDocument {
        filename: String,
        content_type: String,
        data: Vec<u8>,
        response: oneshot::Sender<Result<StoredDocument, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UploadRequestHandler {
    storage: Arc<StorageApi>,
}

impl UploadRequestHandler {
    pub fn new(auth_token: String, url: String) -> Self {
        UploadRequestHandler {
            storage: Arc::new(StorageApi::new(auth_token, url)),
        }
    }

    async fn store_document(
        &self,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<StoredDocument, ServiceError> {
        self.storage
            .upload_document(filename, content_type, data)
            .await
            .map_err(|e| {
                ServiceError::ExternalService(
                    "upload".to_string(),
                    "storage".to_string(),
                    e.to_string(),
                )
            })
    }
}

#[async_trait]
impl RequestHandler<UploadRequest> for UploadRequestHandler {
    async fn handle_request(&self, request: UploadRequest) {
        match request {
            UploadRequest::StoreDocument {
                filename,
                content_type,
                data,
                response,
            } => {
                let document = self.store_document(&filename, &content_type, data).await;
                let _ = response.send(document);
            }
        }
    }
}

pub struct UploadService;

impl UploadService {
    pub fn new() -> Self {
        UploadService {}
    }
}

#[async_trait]
impl Service<UploadRequest, UploadRequestHandler> for UploadService {}
