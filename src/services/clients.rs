use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{required_text, RequestHandler, Service, ServiceError};
use crate::models::clients::{Client, NewClient};
use crate::repositories::clients::ClientRepository;
use crate::utils;

pub enum ClientRequest {
    Create {
        owner: String,
        body: NewClient,
        response: oneshot::Sender<Result<Client, ServiceError>>,
    },
    List {
        owner: String,
        response: oneshot::Sender<Result<Vec<Client>, ServiceError>>,
    },
    Delete {
        owner: String,
        id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Debug)]
struct ValidClient {
    name: String,
    address: String,
    service_type: String,
    joining_date: NaiveDate,
}

/// All client validation in one place, before any write is attempted.
fn validate_new_client(body: NewClient) -> Result<ValidClient, ServiceError> {
    let name = required_text(body.name, "name")?;
    let address = required_text(body.address, "address")?;
    let service_type = required_text(body.service_type, "serviceType")?;
    let raw_date = required_text(body.joining_date, "joiningDate")?;

    let joining_date = utils::parse_date(&raw_date).ok_or_else(|| {
        ServiceError::Validation("joiningDate is not a valid date".to_string())
    })?;

    Ok(ValidClient {
        name,
        address,
        service_type,
        joining_date,
    })
}

#[derive(Clone)]
pub struct ClientRequestHandler {
    repository: ClientRepository,
}

impl ClientRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = ClientRepository::new(sql_conn);

        ClientRequestHandler { repository }
    }

    async fn create_client(&self, owner: &str, body: NewClient) -> Result<Client, ServiceError> {
        let valid = validate_new_client(body)?;

        self.repository
            .insert_client(
                owner,
                &valid.name,
                &valid.address,
                &valid.service_type,
                valid.joining_date,
            )
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn list_clients(&self, owner: &str) -> Result<Vec<Client>, ServiceError> {
        self.repository
            .list_for_owner(owner)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn delete_client(&self, owner: &str, id: &str) -> Result<(), ServiceError> {
        let deleted = self
            .repository
            .delete_scoped(owner, id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        if deleted {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Client"))
        }
    }
}

#[async_trait]
impl RequestHandler<ClientRequest> for ClientRequestHandler {
    async fn handle_request(&self, request: ClientRequest) {
        match request {
            ClientRequest::Create {
                owner,
                body,
                response,
            } => {
                let client = self.create_client(&owner, body).await;
                let _ = response.send(client);
            }
            ClientRequest::List { owner, response } => {
                let clients = self.list_clients(&owner).await;
                let _ = response.send(clients);
            }
            ClientRequest::Delete {
                owner,
                id,
                response,
            } => {
                let result = self.delete_client(&owner, &id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct ClientService;

impl ClientService {
    pub fn new() -> Self {
        ClientService {}
    }
}

#[async_trait]
impl Service<ClientRequest, ClientRequestHandler> for ClientService {}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(
        name: Option<&str>,
        address: Option<&str>,
        service_type: Option<&str>,
        joining_date: Option<&str>,
    ) -> NewClient {
        NewClient {
            name: name.map(str::to_string),
            address: address.map(str::to_string),
            service_type: service_type.map(str::to_string),
            joining_date: joining_date.map(str::to_string),
        }
    }

    #[test]
    fn valid_input_round_trips_the_joining_date() {
        let valid = validate_new_client(body(
            Some("Acme"),
            Some("1 Main St"),
            Some("Consulting"),
            Some("2024-05-17"),
        ))
        .unwrap();

        assert_eq!(valid.name, "Acme");
        assert_eq!(
            valid.joining_date,
            NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
        );
    }

    #[test]
    fn missing_fields_name_the_violated_rule() {
        let err = validate_new_client(body(None, Some("x"), Some("y"), Some("2024-05-17")))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg == "name is required"));

        let err = validate_new_client(body(Some("Acme"), Some("x"), Some("y"), None)).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg == "joiningDate is required"));
    }

    #[test]
    fn surrounding_whitespace_is_stripped_before_storage() {
        let valid = validate_new_client(body(
            Some("  Acme "),
            Some(" 1 Main St"),
            Some("Consulting "),
            Some(" 2024-05-17 "),
        ))
        .unwrap();

        assert_eq!(valid.name, "Acme");
        assert_eq!(valid.address, "1 Main St");
        assert_eq!(valid.service_type, "Consulting");
    }

    #[test]
    fn unparsable_dates_are_rejected() {
        let err = validate_new_client(body(Some("Acme"), Some("x"), Some("y"), Some("17/05/2024")))
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::Validation(msg) if msg == "joiningDate is not a valid date")
        );
    }
}
