use actix_web::{web, HttpResponse, ResponseError};
use uuid::Uuid;

use crate::db::record_store::{RecordQuery, RecordStore, SortOrder};
use crate::errors::AppError;
use crate::handlers::{owner_id, parse_metric_type};
use crate::middleware::auth::Claims;
use crate::models::common::ApiResponse;
use crate::models::health_record::{HealthRecord, LatestRecordQuery, ListRecordsQuery, RecordSource};

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Validate list filters into a store query, newest first.
pub(crate) fn list_query(
    owner_id: Uuid,
    filters: &ListRecordsQuery,
    scoped_source: Option<RecordSource>,
) -> Result<RecordQuery, AppError> {
    let metric_type = parse_metric_type(filters.metric_type.as_deref())?;
    let limit = filters.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(AppError::validation(format!("limit must be between 1 and {}", MAX_LIST_LIMIT)));
    }
    if let (Some(start), Some(end)) = (filters.start_date, filters.end_date) {
        if end < start {
            return Err(AppError::validation("endDate must not be before startDate"));
        }
    }

    Ok(RecordQuery::for_owner(owner_id)
        .metric(metric_type)
        .source(scoped_source.or(filters.source))
        .between(filters.start_date, filters.end_date)
        .order(SortOrder::Descending)
        .limit(Some(limit)))
}

pub(crate) async fn list_for_owner(
    store: &dyn RecordStore,
    owner_id: Uuid,
    filters: &ListRecordsQuery,
    scoped_source: Option<RecordSource>,
) -> Result<Vec<HealthRecord>, AppError> {
    let query = list_query(owner_id, filters, scoped_source)?;
    Ok(store.query(&query).await?)
}

#[tracing::instrument(
    name = "List health records",
    skip(filters, store, claims),
    fields(username = %claims.username, metric_type = ?filters.metric_type)
)]
pub async fn list_records(
    filters: web::Query<ListRecordsQuery>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match list_for_owner(store.get_ref(), owner_id, &filters, None).await {
        Ok(records) => {
            tracing::info!("Returning {} health records", records.len());
            HttpResponse::Ok().json(ApiResponse::success("Health records retrieved", records))
        }
        Err(e) => {
            tracing::warn!("Failed to list health records: {}", e);
            e.error_response()
        }
    }
}

#[tracing::instrument(
    name = "Get latest health record",
    skip(params, store, claims),
    fields(username = %claims.username, metric_type = %params.metric_type)
)]
pub async fn latest_record(
    params: web::Query<LatestRecordQuery>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let metric_type = match parse_metric_type(Some(&params.metric_type)) {
        Ok(Some(metric_type)) => metric_type,
        Ok(None) => return AppError::validation("metricType is required").error_response(),
        Err(e) => return e.error_response(),
    };

    match store.latest(owner_id, metric_type).await {
        Ok(Some(record)) => HttpResponse::Ok().json(ApiResponse::success("Latest health record retrieved", record)),
        Ok(None) => AppError::NotFound(format!("No {} records found", metric_type)).error_response(),
        Err(e) => {
            tracing::error!("❌ Failed to load latest {} record: {}", metric_type, e);
            AppError::from(e).error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn default_limit_is_one_hundred() {
        let query = list_query(Uuid::new_v4(), &ListRecordsQuery::default(), None).unwrap();
        assert_eq!(query.limit, Some(DEFAULT_LIST_LIMIT));
        assert_eq!(query.order, SortOrder::Descending);
    }

    #[test]
    fn scoped_source_overrides_the_filter() {
        let filters = ListRecordsQuery {
            source: Some(RecordSource::Manual),
            ..Default::default()
        };
        let query = list_query(Uuid::new_v4(), &filters, Some(RecordSource::ExternalProvider)).unwrap();
        assert_eq!(query.source, Some(RecordSource::ExternalProvider));
    }

    #[test]
    fn inverted_ranges_and_bad_limits_are_rejected() {
        let now = Utc::now();
        let inverted = ListRecordsQuery {
            start_date: Some(now),
            end_date: Some(now - Duration::days(1)),
            ..Default::default()
        };
        assert!(list_query(Uuid::new_v4(), &inverted, None).is_err());

        let zero = ListRecordsQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert!(list_query(Uuid::new_v4(), &zero, None).is_err());
    }
}
