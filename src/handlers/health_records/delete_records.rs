use actix_web::{web, HttpResponse, ResponseError};
use uuid::Uuid;

use crate::db::record_store::{DeleteScope, RecordStore};
use crate::errors::AppError;
use crate::handlers::{owner_id, parse_metric_type};
use crate::middleware::auth::Claims;
use crate::models::common::ApiResponse;
use crate::models::health_record::{DeleteRecordsRequest, DeleteRecordsResponse, RecordSource};

/// Turn a bulk delete body into a scope. Without `all`, at least one filter
/// is required so that an empty body never wipes the owner's history.
pub(crate) fn delete_scope(
    request: &DeleteRecordsRequest,
    scoped_source: Option<RecordSource>,
) -> Result<DeleteScope, AppError> {
    let source = scoped_source.or(request.source);
    if request.all {
        return Ok(DeleteScope::All { source });
    }

    let metric_type = parse_metric_type(request.metric_type.as_deref())?;
    if metric_type.is_none() && request.start_date.is_none() && request.end_date.is_none() && source.is_none() {
        return Err(AppError::validation(
            "Provide metricType, startDate, endDate or source, or set all to true",
        ));
    }
    if let (Some(start), Some(end)) = (request.start_date, request.end_date) {
        if end < start {
            return Err(AppError::validation("endDate must not be before startDate"));
        }
    }

    Ok(DeleteScope::Matching {
        metric_type,
        source,
        start: request.start_date,
        end: request.end_date,
    })
}

pub(crate) async fn delete_for_owner(
    store: &dyn RecordStore,
    owner_id: Uuid,
    request: &DeleteRecordsRequest,
    scoped_source: Option<RecordSource>,
) -> Result<u64, AppError> {
    let scope = delete_scope(request, scoped_source)?;
    Ok(store.delete_matching(owner_id, &scope).await?)
}

/// Delete one record after checking it belongs to the caller.
pub(crate) async fn delete_owned(store: &dyn RecordStore, owner_id: Uuid, record_id: Uuid) -> Result<(), AppError> {
    let record = store
        .find_by_id(record_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Health record not found".to_string()))?;
    if record.owner_id != owner_id {
        return Err(AppError::Forbidden);
    }
    if !store.delete_by_id(record_id).await? {
        // Removed concurrently between the lookup and the delete.
        return Err(AppError::NotFound("Health record not found".to_string()));
    }
    Ok(())
}

#[tracing::instrument(
    name = "Delete health record",
    skip(store, claims),
    fields(username = %claims.username)
)]
pub async fn delete_record(
    record_id: web::Path<Uuid>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let record_id = record_id.into_inner();

    match delete_owned(store.get_ref(), owner_id, record_id).await {
        Ok(()) => {
            tracing::info!("🗑️ Deleted health record {}", record_id);
            HttpResponse::Ok().json(ApiResponse::<()>::success_message("Health record deleted"))
        }
        Err(AppError::Forbidden) => {
            tracing::warn!("Owner {} tried to delete record {} of another owner", owner_id, record_id);
            AppError::Forbidden.error_response()
        }
        Err(e) => e.error_response(),
    }
}

#[tracing::instrument(
    name = "Bulk delete health records",
    skip(body, store, claims),
    fields(username = %claims.username, all = body.all)
)]
pub async fn delete_records(
    body: web::Json<DeleteRecordsRequest>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match delete_for_owner(store.get_ref(), owner_id, &body, None).await {
        Ok(deleted) => {
            tracing::info!("🗑️ Deleted {} health records", deleted);
            HttpResponse::Ok().json(ApiResponse::success(
                format!("Deleted {} health records", deleted),
                DeleteRecordsResponse { deleted },
            ))
        }
        Err(e) => {
            tracing::warn!("Bulk delete failed: {}", e);
            e.error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::memory::InMemoryRecordStore;
    use crate::models::health_record::{MetricType, NewHealthRecord, RecordMetadata};

    #[test]
    fn empty_body_without_all_is_rejected() {
        assert!(matches!(
            delete_scope(&DeleteRecordsRequest::default(), None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn all_ignores_the_other_filters() {
        let request = DeleteRecordsRequest {
            metric_type: Some("weight".into()),
            all: true,
            ..Default::default()
        };
        assert_eq!(delete_scope(&request, None).unwrap(), DeleteScope::All { source: None });
    }

    #[test]
    fn provider_scope_is_applied_even_to_all() {
        let request = DeleteRecordsRequest {
            all: true,
            ..Default::default()
        };
        assert_eq!(
            delete_scope(&request, Some(RecordSource::ExternalProvider)).unwrap(),
            DeleteScope::All {
                source: Some(RecordSource::ExternalProvider)
            }
        );
    }

    #[tokio::test]
    async fn not_found_and_not_owned_are_distinct() {
        let store = InMemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let record = store
            .upsert(NewHealthRecord {
                owner_id: owner,
                source: RecordSource::Manual,
                metric_type: MetricType::Weight,
                value: 80.0,
                timestamp: Utc::now(),
                metadata: RecordMetadata::UserNote { note: None },
            })
            .await
            .unwrap()
            .into_record();

        assert!(matches!(
            delete_owned(&store, Uuid::new_v4(), record.id).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            delete_owned(&store, owner, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(delete_owned(&store, owner, record.id).await.is_ok());
        assert_eq!(store.len().await, 0);
    }
}
