pub mod auth_handlers;
pub mod category_handlers;
pub mod expense_handlers;
pub mod recurring_handlers;
pub mod user_handlers;

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::describe_errors;

/// Error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// How many rows still reference the resource, for blocked deletes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<i64>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            usage_count: None,
        }
    }

    pub fn with_usage_count(mut self, count: i64) -> Self {
        self.usage_count = Some(count);
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Generic 500; the detail only goes to the log
pub fn internal_error(detail: &str) -> Response {
    tracing::error!(error = %detail, "Storage operation failed");
    ErrorResponse::new("internal_error", "Internal server error")
        .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn bad_request(error: &str, message: impl Into<String>) -> Response {
    ErrorResponse::new(error, message).into_response_with(StatusCode::BAD_REQUEST)
}

/// Runs the `validator` rules of a request body, mapping failures to 400
pub fn validate_request<T: Validate>(request: &T) -> Result<(), Response> {
    request
        .validate()
        .map_err(|errors| bad_request("validation_error", describe_errors(&errors)))
}

/// JSON request body whose decoding failures answer 400 with an [`ErrorResponse`]
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(BodyRejection))]
pub struct JsonBody<T>(pub T);

/// Missing fields, wrong types, bad syntax or a non-JSON content type
#[derive(Debug)]
pub struct BodyRejection(JsonRejection);

impl From<JsonRejection> for BodyRejection {
    fn from(rejection: JsonRejection) -> Self {
        Self(rejection)
    }
}

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.0.status(), "Rejected request body");
        bad_request("validation_error", self.0.body_text())
    }
}
