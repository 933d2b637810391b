//! Error responses.
//!
//! Handlers return [`ApiResult`]; engine errors convert through `?` and are
//! rendered as an [`ErrorResponse`] with a status chosen by their kind.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ringrule_core::{ConfigError, RingruleError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// A failed request.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400: the request was understood but rejected, e.g. an invalid rule.
    BadRequest {
        /// Lowercase code such as `invalid_rule`.
        error_code: String,
        /// Text for the user.
        message: String,
        /// Field the rejection is about.
        field: Option<String>,
    },

    /// 404: unknown rule id, or nothing evaluated yet.
    NotFound {
        /// Lowercase code such as `rule_not_found`.
        error_code: String,
        /// Text for the user.
        message: String,
    },

    /// 422: configuration or input that parses but cannot be used.
    Unprocessable {
        /// Lowercase code such as `config_validation_error`.
        error_code: String,
        /// Text for the user.
        message: String,
    },

    /// 500: persistence or I/O failure on the server side.
    InternalError {
        /// Lowercase code such as `persistence_error`.
        error_code: String,
        /// Text for the user.
        message: String,
        /// Underlying cause, logged and echoed back.
        details: Option<String>,
    },
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "invalid_rule",
    "message": "Invalid radius_m: must be greater than 0",
    "details": {"field": "radius_m"}
}))]
pub struct ErrorResponse {
    /// Lowercase machine-readable code.
    #[schema(example = "rule_not_found")]
    pub error: String,

    /// Human-readable description.
    pub message: String,

    /// Extra structured context, e.g. `{"field": "radius_m"}`.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_body(self) -> ErrorResponse {
        match self {
            Self::BadRequest {
                error_code,
                message,
                field,
            } => ErrorResponse {
                error: error_code,
                message,
                details: field.map(|field| json!({ "field": field })),
            },
            Self::NotFound { error_code, message } | Self::Unprocessable { error_code, message } => {
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                }
            }
            Self::InternalError {
                error_code,
                message,
                details,
            } => ErrorResponse {
                error: error_code,
                message,
                details: details.map(serde_json::Value::String),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(self.into_body())).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest {
                error_code, message, ..
            }
            | Self::NotFound { error_code, message }
            | Self::Unprocessable { error_code, message } => write!(f, "{error_code}: {message}"),
            Self::InternalError {
                error_code,
                message,
                details: Some(details),
            } => write!(f, "{error_code}: {message} ({details})"),
            Self::InternalError {
                error_code,
                message,
                details: None,
            } => write!(f, "{error_code}: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<RingruleError> for ApiError {
    fn from(err: RingruleError) -> Self {
        let error_code = err.error_code().to_lowercase();
        let message = err.to_string();

        match err.http_status_code() {
            400 => {
                let field = match &err {
                    RingruleError::InvalidRule { field, .. } => Some((*field).to_string()),
                    _ => None,
                };
                Self::BadRequest {
                    error_code,
                    message,
                    field,
                }
            }
            404 => Self::NotFound { error_code, message },
            422 => Self::Unprocessable { error_code, message },
            _ => Self::InternalError {
                error_code,
                message,
                details: None,
            },
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::from(RingruleError::from(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            error_code: "invalid_request".to_string(),
            message: rejection.body_text(),
            field: None,
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::from(RingruleError::from(err))
    }
}
