use crate::{
    db::DbPool,
    entities::customer::{self, ActiveModel as CustomerActiveModel, Entity as CustomerEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Admin payload for syncing a shadow identity from the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerRequest {
    /// The auth provider's subject id for this user.
    pub id: Uuid,
    #[validate(email)]
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<customer::Model> for CustomerResponse {
    fn from(model: customer::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            created_at: model.created_at,
        }
    }
}

/// Lookup against the hosted auth provider's admin API, for purchasers who
/// paid with an account email that has no local customer row yet.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthDirectory: Send + Sync {
    async fn find_user_id_by_email(&self, email: &str) -> Result<Option<Uuid>, ServiceError>;
}

/// `AuthDirectory` backed by the provider's `GET /admin/users` endpoint.
#[derive(Clone)]
pub struct HostedAuthDirectory {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct DirectoryUsersPage {
    users: Vec<DirectoryUser>,
}

#[derive(Debug, Deserialize)]
struct DirectoryUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl HostedAuthDirectory {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, service_key)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }
}

#[async_trait]
impl AuthDirectory for HostedAuthDirectory {
    #[instrument(skip(self, email))]
    async fn find_user_id_by_email(&self, email: &str) -> Result<Option<Uuid>, ServiceError> {
        let response = self
            .client
            .get(format!("{}/admin/users", self.base_url))
            .bearer_auth(&self.service_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("auth directory unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "auth directory returned status {}",
                status
            )));
        }

        let page: DirectoryUsersPage = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("auth directory response unreadable: {}", e))
        })?;

        Ok(page
            .users
            .into_iter()
            .find(|user| {
                user.email
                    .as_deref()
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(email))
            })
            .map(|user| user.id))
    }
}

/// Local shadow of purchaser identities. Rows appear when a paid checkout
/// resolves an email, not through any signup flow of this service.
#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CustomerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, email))]
    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<customer::Model>, ServiceError> {
        let db = &*self.db_pool;
        let normalized = email.trim().to_lowercase();

        CustomerEntity::find()
            .filter(customer::Column::Email.eq(normalized))
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up customer by email");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<customer::Model>, ServiceError> {
        let db = &*self.db_pool;

        CustomerEntity::find_by_id(customer_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, customer_id = %customer_id, "Failed to fetch customer");
                ServiceError::DatabaseError(e)
            })
    }

    /// Materializes the shadow row for a directory-known user, reusing the
    /// directory's id so both systems agree on identity. Races with another
    /// delivery inserting the same email resolve to the winner's row.
    #[instrument(skip(self, email), fields(customer_id = %customer_id))]
    pub async fn ensure_customer(
        &self,
        customer_id: Uuid,
        email: &str,
        name: Option<String>,
    ) -> Result<customer::Model, ServiceError> {
        let db = &*self.db_pool;
        let normalized = email.trim().to_lowercase();

        if let Some(existing) = CustomerEntity::find_by_id(customer_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
        {
            return Ok(existing);
        }

        let active_model = CustomerActiveModel {
            id: Set(customer_id),
            email: Set(normalized.clone()),
            name: Set(name),
            created_at: Set(Utc::now()),
        };

        match active_model.insert(db).await {
            Ok(model) => {
                info!(customer_id = %customer_id, "Customer created");
                self.event_sender
                    .send_or_log(Event::CustomerCreated(customer_id))
                    .await;
                Ok(model)
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                warn!(customer_id = %customer_id, "Customer insert raced a concurrent write");
                self.find_by_email(&normalized)
                    .await?
                    .ok_or(ServiceError::DatabaseError(e))
            }
            Err(e) => {
                error!(error = %e, customer_id = %customer_id, "Failed to create customer");
                Err(ServiceError::DatabaseError(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn directory_finds_user_by_email_case_insensitively() {
        let id = Uuid::new_v4();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/users"))
            .and(header("authorization", "Bearer service_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": [
                    {"id": Uuid::new_v4(), "email": "other@example.com"},
                    {"id": id, "email": "Ada@Example.com"},
                    {"id": Uuid::new_v4(), "email": null}
                ]
            })))
            .mount(&server)
            .await;

        let directory = HostedAuthDirectory::new(server.uri(), "service_key");
        let found = directory
            .find_user_id_by_email("ada@example.com")
            .await
            .unwrap();

        assert_eq!(found, Some(id));
    }

    #[tokio::test]
    async fn directory_returns_none_for_unknown_email() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/users"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"users": []})),
            )
            .mount(&server)
            .await;

        let directory = HostedAuthDirectory::new(server.uri(), "service_key");
        let found = directory
            .find_user_id_by_email("nobody@example.com")
            .await
            .unwrap();

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn directory_failure_surfaces_as_external_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/users"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let directory = HostedAuthDirectory::new(server.uri(), "service_key");
        let err = directory
            .find_user_id_by_email("ada@example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }
}
