use crate::auth::AuthToken;
use crate::backend_client::BackendClient;
use crate::clock::Clock;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::lead_import::validate_rows;
use crate::lead_stage::apply_stage_change;
use crate::models::*;
use crate::notifier::{Notice, Notifier};
use crate::subscription_timeline::{future_date_from_interval, next_renewal_date, SubscriptionTimeline};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use moka::future::Cache;
use phonenumber::country::Id as CountryId;
use serde_json::json;
use std::sync::Arc;

/// Cache key: client id plus the caller's token, so one user's cached view is
/// never served to another.
pub type SubscriptionCacheKey = (String, String);

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client for the persistence backend.
    pub backend: BackendClient,
    /// Short-lived per-client subscription lists, refreshed after renewals.
    pub subscription_cache: Cache<SubscriptionCacheKey, Vec<SubscriptionRecord>>,
    /// Source of "today" for classification and renewal defaults.
    pub clock: Arc<dyn Clock>,
    /// Receives user-facing outcome notices.
    pub notifier: Arc<dyn Notifier>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "advisory-backoffice",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn load_subscriptions(
    state: &AppState,
    token: &AuthToken,
    client_id: &str,
) -> Result<Vec<SubscriptionRecord>, AppError> {
    let key = (client_id.to_string(), token.as_str().to_string());
    if let Some(cached) = state.subscription_cache.get(&key).await {
        tracing::debug!("Subscription cache hit for client {}", client_id);
        return Ok(cached);
    }

    let records = state
        .backend
        .list_client_subscriptions(token, client_id)
        .await?;
    state.subscription_cache.insert(key, records.clone()).await;
    Ok(records)
}

/// GET /api/v1/clients/:client_id/subscriptions/timeline
///
/// Splits a client's subscriptions into the active plan, upcoming plans and
/// past plans as of today.
pub async fn get_subscription_timeline(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    token: AuthToken,
) -> Result<Json<SubscriptionTimeline>, AppError> {
    tracing::info!("GET /clients/{}/subscriptions/timeline", client_id);

    let records = load_subscriptions(&state, &token, &client_id)
        .await
        .with_context(|| format!("Loading subscriptions for client {}", client_id))?;
    let timeline = SubscriptionTimeline::classify(&records, state.clock.today());

    tracing::info!(
        "Client {} timeline: active={}, upcoming={}, past={}",
        client_id,
        timeline.current.is_some(),
        timeline.upcoming.as_ref().map_or(0, Vec::len),
        timeline.past.as_ref().map_or(0, Vec::len)
    );

    Ok(Json(timeline))
}

/// POST /api/v1/clients/:client_id/renewals
///
/// Creates the next subscription for a client. Without an explicit start
/// date the new plan begins the day after existing coverage ends.
pub async fn renew_subscription(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    token: AuthToken,
    Json(request): Json<RenewalRequest>,
) -> Result<(StatusCode, Json<SubscriptionRecord>), AppError> {
    tracing::info!(
        "POST /clients/{}/renewals - cadence: {}",
        client_id,
        request.cadence
    );

    match create_renewal(&state, &token, &client_id, request).await {
        Ok((record, end_date)) => {
            state
                .subscription_cache
                .invalidate(&(client_id.clone(), token.as_str().to_string()))
                .await;
            state
                .notifier
                .notify(Notice::success(format!("Subscription renewed until {}", end_date)));
            Ok((StatusCode::CREATED, Json(record)))
        }
        Err(e) => {
            state
                .notifier
                .notify(Notice::error("Failed to renew subscription"));
            Err(e).with_context(|| format!("Renewing subscription for client {}", client_id))
        }
    }
}

/// Resolves the renewal range and stores the new subscription.
///
/// Returns the created record and its end date.
async fn create_renewal(
    state: &AppState,
    token: &AuthToken,
    client_id: &str,
    request: RenewalRequest,
) -> Result<(SubscriptionRecord, String), AppError> {
    let start = match request.start_date {
        Some(start) => start,
        None => {
            let records = load_subscriptions(state, token, client_id).await?;
            SubscriptionTimeline::classify(&records, state.clock.today()).renewal_start()
        }
    };
    let end_date = next_renewal_date(request.cadence, Some(start)).ok_or_else(|| {
        AppError::BadRequest(format!(
            "A {} renewal from {} has no end date",
            request.cadence, start
        ))
    })?;

    let subscription = NewSubscription {
        client: client_id.to_string(),
        plan_name: request.plan_name,
        plan_type: request.plan_type,
        amount_paid: request.amount_paid,
        start_date: start.format("%Y-%m-%d").to_string(),
        end_date,
    };

    let record = state.backend.create_subscription(token, &subscription).await?;
    Ok((record, subscription.end_date))
}

/// GET /api/v1/renewals/next-date?cadence=Monthly&anchor=2024-01-31
///
/// Calendar-based end date for a renewal starting at `anchor` (default today).
pub async fn preview_next_renewal(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NextRenewalQuery>,
) -> Result<Json<RenewalDateResponse>, AppError> {
    let anchor = query.anchor.unwrap_or_else(|| state.clock.today());
    let renewal_date = next_renewal_date(query.cadence, Some(anchor)).ok_or_else(|| {
        AppError::BadRequest(format!(
            "A {} renewal from {} has no end date",
            query.cadence, anchor
        ))
    })?;

    Ok(Json(RenewalDateResponse { renewal_date }))
}

/// GET /api/v1/renewals/scheduled-date?interval=monthly&start=2024-01-31
///
/// Fixed-day-count schedule used after a renewal is confirmed.
pub async fn preview_scheduled_date(
    Query(query): Query<ScheduledDateQuery>,
) -> Result<Json<RenewalDateResponse>, AppError> {
    let renewal_date = future_date_from_interval(&query.interval, &query.start).ok_or_else(|| {
        AppError::BadRequest(format!("'{}' is not a valid start date", query.start))
    })?;

    Ok(Json(RenewalDateResponse { renewal_date }))
}

/// PATCH /api/v1/leads/:lead_id/stage
///
/// Stores a manually selected pipeline stage and tells the dashboard which
/// tab to show.
pub async fn update_lead_stage(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<String>,
    token: AuthToken,
    Json(request): Json<StageUpdateRequest>,
) -> Result<Json<StageUpdateResponse>, AppError> {
    tracing::info!("PATCH /leads/{}/stage - {}", lead_id, request.stage);

    let change = apply_stage_change(request.previous_stage, request.stage);
    state
        .backend
        .update_lead_stage(&token, &lead_id, change.to)
        .await
        .with_context(|| format!("Updating stage of lead {}", lead_id))?;

    if change.is_backward() {
        state.notifier.notify(Notice::warning(format!(
            "Lead {} moved back to {}",
            lead_id, change.to
        )));
    } else {
        state
            .notifier
            .notify(Notice::success(format!("Lead {} is now {}", lead_id, change.to)));
    }

    Ok(Json(StageUpdateResponse {
        lead_id,
        stage: change.to,
        previous_stage: change.from,
        active_tab: change.active_tab,
        backward: change.is_backward(),
    }))
}

/// POST /api/v1/leads/import
///
/// Validates uploaded lead rows and forwards the accepted ones. Any rejected
/// row blocks the upload unless `partial=true`.
pub async fn import_leads(
    State(state): State<Arc<AppState>>,
    token: AuthToken,
    Query(query): Query<ImportQuery>,
    Json(request): Json<LeadImportRequest>,
) -> Result<Json<LeadImportResponse>, AppError> {
    tracing::info!(
        "POST /leads/import - {} row(s), partial: {}",
        request.rows.len(),
        query.partial
    );

    if request.rows.is_empty() {
        return Err(AppError::BadRequest("Upload contains no rows".to_string()));
    }

    let region: CountryId = state.config.default_phone_region.parse().map_err(|_| {
        AppError::InternalError(format!(
            "Configured phone region '{}' is invalid",
            state.config.default_phone_region
        ))
    })?;

    let report = validate_rows(&request.rows, region);
    let forward = !report.accepted.is_empty() && (report.is_clean() || query.partial);

    let backend = if forward {
        let response = state
            .backend
            .bulk_create_leads(&token, &report.accepted)
            .await
            .context("Forwarding imported leads")?;
        state.notifier.notify(Notice::success(format!(
            "Imported {} lead(s)",
            report.accepted.len()
        )));
        Some(response)
    } else {
        state.notifier.notify(Notice::error(format!(
            "Import blocked: {} row(s) need fixing",
            report.rejected.len()
        )));
        None
    };

    Ok(Json(LeadImportResponse {
        accepted: report.accepted.len(),
        rejected: report.rejected,
        forwarded: forward,
        backend,
    }))
}
