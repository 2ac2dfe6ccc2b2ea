use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UmbraError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(umbra::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(umbra::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(umbra::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(umbra::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Bad request: {0}")]
    #[diagnostic(code(umbra::bad_request))]
    BadRequest(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(umbra::not_found))]
    NotFound(String),

    #[error("{0}")]
    #[diagnostic(code(umbra::other))]
    Other(String),
}

impl IntoResponse for UmbraError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            UmbraError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            UmbraError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
