use actix_web::{web, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::db::record_store::RecordStore;
use crate::errors::AppError;
use crate::handlers::owner_id;
use crate::middleware::auth::Claims;
use crate::models::common::ApiResponse;
use crate::models::health_record::{MetricType, RecordSource};
use crate::models::provider_settings::{ProviderPreferences, ProviderSettingsResponse, SaveProviderSettingsRequest};

async fn current_preferences(
    store: &dyn RecordStore,
    owner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ProviderPreferences, AppError> {
    Ok(store
        .provider_preferences(owner_id)
        .await?
        .unwrap_or_else(|| ProviderPreferences::defaults_for(owner_id, now)))
}

async fn last_sync(store: &dyn RecordStore, owner_id: Uuid) -> Result<Option<DateTime<Utc>>, AppError> {
    Ok(store
        .sync_cursor(owner_id, RecordSource::ExternalProvider)
        .await?
        .map(|cursor| cursor.last_sync))
}

/// Settings of the owner, or the defaults when nothing was saved yet.
pub async fn load_settings(
    store: &dyn RecordStore,
    owner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ProviderSettingsResponse, AppError> {
    let preferences = current_preferences(store, owner_id, now).await?;
    Ok(ProviderSettingsResponse::new(&preferences, last_sync(store, owner_id).await?))
}

/// Merge the request into the saved settings. Omitted credential and types
/// keep their saved values; the result must carry a credential.
pub async fn save_settings(
    store: &dyn RecordStore,
    owner_id: Uuid,
    request: SaveProviderSettingsRequest,
    now: DateTime<Utc>,
) -> Result<ProviderSettingsResponse, AppError> {
    let mut preferences = current_preferences(store, owner_id, now).await?;

    if let Some(credential) = request.credential {
        if credential.expose_secret().trim().is_empty() {
            return Err(AppError::validation("credential must not be blank"));
        }
        preferences.credential = Some(credential);
    }
    if !preferences.has_credential() {
        return Err(AppError::validation("credential is required"));
    }

    if let Some(names) = request.metric_types {
        if names.is_empty() {
            return Err(AppError::validation("metricTypes must not be empty"));
        }
        let mut metric_types = Vec::with_capacity(names.len());
        for name in &names {
            let metric_type = name.parse::<MetricType>().map_err(AppError::Validation)?;
            if !metric_types.contains(&metric_type) {
                metric_types.push(metric_type);
            }
        }
        preferences.metric_types = metric_types;
    }

    preferences.auto_sync = request.auto_sync;
    preferences.sync_frequency = request.sync_frequency;
    preferences.updated_at = now;

    let saved = store.save_provider_preferences(preferences).await?;
    Ok(ProviderSettingsResponse::new(&saved, last_sync(store, owner_id).await?))
}

#[tracing::instrument(name = "Get provider settings", skip(store, claims), fields(username = %claims.username))]
pub async fn get_provider_settings(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match load_settings(store.get_ref(), owner_id, Utc::now()).await {
        Ok(settings) => HttpResponse::Ok().json(ApiResponse::success("Provider settings retrieved", settings)),
        Err(e) => {
            tracing::error!("❌ Failed to load provider settings: {}", e);
            e.error_response()
        }
    }
}

#[tracing::instrument(
    name = "Save provider settings",
    skip(body, store, claims),
    fields(username = %claims.username, auto_sync = body.auto_sync)
)]
pub async fn save_provider_settings(
    body: web::Json<SaveProviderSettingsRequest>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match save_settings(store.get_ref(), owner_id, body.into_inner(), Utc::now()).await {
        Ok(settings) => {
            tracing::info!("✅ Provider settings saved");
            HttpResponse::Ok().json(ApiResponse::success("Provider settings saved", settings))
        }
        Err(e) => {
            tracing::warn!("Provider settings rejected: {}", e);
            e.error_response()
        }
    }
}
