use crate::auth::AuthToken;
use crate::errors::AppError;
use crate::lead_import::ValidatedLead;
use crate::lead_stage::LeadStage;
use crate::models::{NewSubscription, SubscriptionList, SubscriptionRecord};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Client for the REST backend that persists clients, leads and subscriptions.
///
/// Every call forwards the caller's bearer token.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Creates a new `BackendClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the backend API, without trailing slash.
    /// * `timeout` - Per-request timeout.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create backend client: {}", e))
            })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches every subscription of one client.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<SubscriptionRecord>, AppError>` - Records in backend order.
    pub async fn list_client_subscriptions(
        &self,
        token: &AuthToken,
        client_id: &str,
    ) -> Result<Vec<SubscriptionRecord>, AppError> {
        let url = format!("{}/subscriptions/", self.base_url);
        tracing::info!("Fetching subscriptions for client {}", client_id);

        let request = self.client.get(&url).query(&[("client", client_id)]);
        let list: SubscriptionList = self.send_json(request, token, "list subscriptions").await?;
        let records = list.into_records();

        tracing::debug!(
            "Backend returned {} subscription(s) for client {}",
            records.len(),
            client_id
        );
        Ok(records)
    }

    /// Creates a subscription and returns the stored record.
    pub async fn create_subscription(
        &self,
        token: &AuthToken,
        subscription: &NewSubscription,
    ) -> Result<SubscriptionRecord, AppError> {
        let url = format!("{}/subscriptions/", self.base_url);
        tracing::info!(
            "Creating subscription for client {}: {} -> {}",
            subscription.client,
            subscription.start_date,
            subscription.end_date
        );

        let request = self.client.post(&url).json(subscription);
        let record: SubscriptionRecord = self
            .send_json(request, token, "create subscription")
            .await?;

        tracing::info!("Subscription created: {:?}", record.id);
        Ok(record)
    }

    /// Stores a lead's new pipeline stage.
    pub async fn update_lead_stage(
        &self,
        token: &AuthToken,
        lead_id: &str,
        stage: LeadStage,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/leads/{}/", self.base_url, lead_id);
        tracing::info!("Updating lead {} stage to {}", lead_id, stage);

        let request = self.client.patch(&url).json(&json!({ "stage": stage }));
        self.send_json(request, token, "update lead stage").await
    }

    /// Creates leads in one batch.
    pub async fn bulk_create_leads(
        &self,
        token: &AuthToken,
        leads: &[ValidatedLead],
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/leads/bulk/", self.base_url);
        tracing::info!("Creating {} lead(s) in bulk", leads.len());

        let request = self.client.post(&url).json(&json!({ "leads": leads }));
        self.send_json(request, token, "bulk create leads").await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        token: &AuthToken,
        action: &str,
    ) -> Result<T, AppError> {
        let response = request
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("{} request failed: {}", action, e)))?;

        let response = check_status(response, action).await?;

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse {} response: {}", action, e))
        })
    }
}

async fn check_status(response: Response, action: &str) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::Unauthorized(format!(
            "Backend rejected credentials for {}",
            action
        ))),
        StatusCode::NOT_FOUND => Err(AppError::NotFound(format!(
            "Backend has no resource for {}",
            action
        ))),
        _ => Err(AppError::ExternalApiError(format!(
            "{} returned {}: {}",
            action, status, error_text
        ))),
    }
}
