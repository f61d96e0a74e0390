use crate::store::{BoundsError, StoreError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the segment lookup endpoints.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid bounding box: {0}")]
    Bounds(#[from] BoundsError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("segment {0} not found")]
    SegmentNotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Bounds(_) | AppError::Store(StoreError::InvalidCoordinate { .. }) => {
                StatusCode::BAD_REQUEST
            }
            AppError::SegmentNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        let bounds = AppError::from(BoundsError::EastBeforeWest { west: 1.0, east: 0.0 });
        assert_eq!(bounds.into_response().status(), StatusCode::BAD_REQUEST);

        let missing = AppError::SegmentNotFound("SEG404".to_string());
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_outage_is_unavailable() {
        let err = AppError::from(StoreError::Unavailable("down".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
