use actix_web::{web, HttpResponse, ResponseError};
use uuid::Uuid;

use crate::db::record_store::RecordStore;
use crate::errors::AppError;
use crate::handlers::{owner_id, parse_metric_type};
use crate::middleware::auth::Claims;
use crate::models::common::ApiResponse;
use crate::models::health_record::{
    check_value, NewHealthRecord, RecordMetadata, RecordSource, UpsertRecordRequest, UpsertRecordResponse,
};

fn to_new_record(owner_id: Uuid, request: UpsertRecordRequest) -> Result<NewHealthRecord, AppError> {
    let metric_type = parse_metric_type(Some(&request.metric_type))?
        .ok_or_else(|| AppError::validation("metricType is required"))?;
    check_value(request.value).map_err(AppError::Validation)?;

    let source = request.source.unwrap_or_default();
    let metadata = match request.note {
        Some(note) => RecordMetadata::UserNote { note: Some(note) },
        None => RecordMetadata::empty_for(source),
    };

    Ok(NewHealthRecord {
        owner_id,
        source,
        metric_type,
        value: request.value,
        timestamp: request.timestamp,
        metadata,
    })
}

#[tracing::instrument(
    name = "Add or update health record",
    skip(body, store, claims),
    fields(
        username = %claims.username,
        metric_type = %body.metric_type
    )
)]
pub async fn upsert_record(
    body: web::Json<UpsertRecordRequest>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let record = match to_new_record(owner_id, body.into_inner()) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("Rejected health record: {}", e);
            return e.error_response();
        }
    };
    let source = record.source;

    match store.upsert(record).await {
        Ok(outcome) if outcome.is_inserted() => {
            tracing::info!("💾 Stored new {} record from {}", outcome.record().metric_type, source);
            HttpResponse::Created().json(ApiResponse::success(
                "Health record created",
                UpsertRecordResponse {
                    created: true,
                    record: outcome.into_record(),
                },
            ))
        }
        Ok(outcome) => {
            tracing::info!("♻️ Updated existing {} record from {}", outcome.record().metric_type, source);
            HttpResponse::Ok().json(ApiResponse::success(
                "Health record updated",
                UpsertRecordResponse {
                    created: false,
                    record: outcome.into_record(),
                },
            ))
        }
        Err(e) => {
            tracing::error!("❌ Failed to store health record: {}", e);
            AppError::from(e).error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::health_record::MetricType;

    fn request(metric_type: &str, value: f64) -> UpsertRecordRequest {
        UpsertRecordRequest {
            metric_type: metric_type.to_string(),
            value,
            timestamp: Utc::now(),
            source: None,
            note: None,
        }
    }

    #[test]
    fn manual_is_the_default_source() {
        let record = to_new_record(Uuid::new_v4(), request("weight", 72.4)).unwrap();
        assert_eq!(record.source, RecordSource::Manual);
        assert_eq!(record.metric_type, MetricType::Weight);
        assert_eq!(record.metadata, RecordMetadata::UserNote { note: None });
    }

    #[test]
    fn unknown_metric_types_are_rejected() {
        assert!(matches!(
            to_new_record(Uuid::new_v4(), request("mood", 3.0)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn oversized_values_are_rejected() {
        assert!(matches!(
            to_new_record(Uuid::new_v4(), request("steps", 1e308)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn notes_become_user_note_metadata() {
        let mut with_note = request("sleep", 7.0);
        with_note.note = Some("woke up twice".into());
        let record = to_new_record(Uuid::new_v4(), with_note).unwrap();
        assert_eq!(
            record.metadata,
            RecordMetadata::UserNote {
                note: Some("woke up twice".into())
            }
        );
    }
}
