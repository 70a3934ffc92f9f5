// HTTP response utilities for JSON bodies and error mapping
use crate::domain::error::CoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub fn status_for(error: &CoreError) -> StatusCode {
    match error {
        CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        CoreError::UnknownDevice(_) => StatusCode::NOT_FOUND,
        CoreError::AmbiguousChannel { .. } => StatusCode::CONFLICT,
        CoreError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Error body `{ "error": ... }`; source failures are logged, not echoed.
pub fn error_response(error: &CoreError) -> Response {
    let status = status_for(error);
    let message = match error {
        CoreError::SourceUnavailable(_) => {
            tracing::error!("Data source failure: {}", error);
            "Data source unavailable".to_string()
        }
        other => other.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&CoreError::invalid("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&CoreError::UnknownDevice("motor".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&CoreError::AmbiguousChannel {
                name: "temp".into(),
                devices: vec![]
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&CoreError::SourceUnavailable(anyhow::anyhow!("down"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
