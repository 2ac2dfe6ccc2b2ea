use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VisibilityError {
    #[error("Invalid visibility configuration: {0}")]
    #[diagnostic(
        code(umbra::visibility::invalid_config),
        help("Fix the level catalog / group assignments in the configuration store; changes take effect on the next session load")
    )]
    InvalidConfig(String),

    #[error("Invalid subject: {0}")]
    #[diagnostic(
        code(umbra::visibility::invalid_subject),
        help("A subject needs a registered-user id or a non-empty name")
    )]
    InvalidSubject(String),

    #[error("Configuration store error: {0}")]
    #[diagnostic(code(umbra::visibility::store))]
    Store(#[from] crate::errors::UmbraError),
}

impl IntoResponse for VisibilityError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            VisibilityError::InvalidSubject(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
