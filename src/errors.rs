use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::db::record_store::StoreError;
use crate::models::common::ApiResponse;

/// Failure classes surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Not allowed to access this record")]
    Forbidden,

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Health data provider unreachable after trying {}", attempts.join(", "))]
    ProviderUnreachable { attempts: Vec<String> },

    #[error("Storage error")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::InsufficientData(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::ProviderUnreachable { .. } => StatusCode::BAD_GATEWAY,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Store errors carry driver detail; the caller only sees the class.
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_and_absence_map_to_distinct_statuses() {
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("Health record not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn store_errors_hide_driver_detail() {
        let error = AppError::Store(StoreError::Backend("relation \"health_records\" does not exist".into()));
        assert_eq!(error.to_string(), "Storage error");
    }

    #[test]
    fn unreachable_lists_attempted_endpoints() {
        let error = AppError::ProviderUnreachable {
            attempts: vec!["https://a.example".into(), "https://b.example".into()],
        };
        assert!(error.to_string().contains("https://a.example, https://b.example"));
    }
}
