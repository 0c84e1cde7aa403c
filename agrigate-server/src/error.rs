//! HTTP error surface.
//!
//! Domain error kinds map onto statuses here and nowhere else; handlers
//! return `ApiResult` and let `?` do the shaping.

use agrigate_core::{AgentError, AuthError, Error, SessionError, ToolError};
use agrigate_tools::weather::WeatherError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

/// Errors leaving the gateway as HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A domain-level error with a fixed status mapping
    #[error(transparent)]
    Domain(#[from] Error),

    /// Every tool, including generation, failed (502)
    #[error("bad gateway: {0}")]
    BadGateway(String),
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::Domain(Error::InvalidInput(message.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Domain(Error::Unauthorized(message.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Domain(Error::Forbidden(message.into()))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Domain(Error::not_found(what))
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Domain(Error::BackendUnavailable(message.into()))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Domain(err.into())
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        Self::Domain(err.into())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::Domain(err.into())
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::AllBackendsFailed(message) => Self::BadGateway(message),
            AgentError::Internal(message) | AgentError::Configuration(message) => {
                Self::Domain(Error::Internal(message))
            }
        }
    }
}

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::UnknownLocation { query, suggestions } => Self::Domain(
                Error::not_found_with_suggestions(format!("location {}", query), suggestions),
            ),
            WeatherError::Upstream(tool_error) => Self::Domain(tool_error.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, suggestions, trace_id) = match self {
            ApiError::Domain(err) => {
                let status = match &err {
                    Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                    Error::Forbidden(_) => StatusCode::FORBIDDEN,
                    Error::NotFound { .. } => StatusCode::NOT_FOUND,
                    Error::Conflict(_) => StatusCode::CONFLICT,
                    Error::DeadlineExceeded(_) => StatusCode::REQUEST_TIMEOUT,
                    Error::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let suggestions = match &err {
                    Error::NotFound { suggestions, .. } if !suggestions.is_empty() => {
                        Some(suggestions.clone())
                    }
                    _ => None,
                };
                let trace_id = matches!(err, Error::Internal(_)).then(|| {
                    let trace_id = Uuid::new_v4().to_string();
                    tracing::error!(trace_id, error = %err, "internal error");
                    trace_id
                });
                (status, err.to_string(), suggestions, trace_id)
            }
            ApiError::BadGateway(message) => (
                StatusCode::BAD_GATEWAY,
                format!("bad gateway: {}", message),
                None,
                None,
            ),
        };

        let mut body = serde_json::json!({
            "error": message,
            "code": status.as_u16(),
        });
        if let Some(suggestions) = suggestions {
            body["suggestions"] = serde_json::json!(suggestions);
        }
        if let Some(trace_id) = trace_id {
            body["trace_id"] = serde_json::json!(trace_id);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handler functions.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_domain_status_mapping() {
        assert_eq!(
            status_of(ApiError::invalid_input("bad days")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::unauthorized("no token")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::forbidden("admins only")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ApiError::not_found("session s1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Domain(Error::Conflict("duplicate".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Domain(Error::DeadlineExceeded("60s".into()))),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            status_of(ApiError::unavailable("upstream down")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ApiError::BadGateway("all tools failed".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_unknown_location_maps_to_404_with_suggestions() {
        let err: ApiError = WeatherError::UnknownLocation {
            query: "Atlantis".into(),
            suggestions: vec!["Assam".into(), "Patna".into(), "Punjab".into()],
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_agent_failure_mapping() {
        let err: ApiError = AgentError::AllBackendsFailed("everything down".into()).into();
        assert_eq!(status_of(err), StatusCode::BAD_GATEWAY);

        let err: ApiError = AgentError::Internal("tool bug".into()).into();
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
