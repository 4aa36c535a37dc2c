use crate::registry::RegistryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use registry_core::ChainError;
use serde::Serialize;
use serde_json::json;
use tracing::error;

/// A missing request field, reported with 422.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub location: &'static str,
    pub param: &'static str,
    pub msg: &'static str,
}

impl FieldError {
    pub fn missing(param: &'static str) -> Self {
        Self {
            location: "body",
            param,
            msg: "Invalid value",
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Unauthorized,
    Validation(Vec<FieldError>),
    /// Details stay in the server log.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Star not found." })),
            )
                .into_response(),
            ApiError::Unauthorized => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Wallet address is not valid." })),
            )
                .into_response(),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error." })),
            )
                .into_response(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unauthorized => ApiError::Unauthorized,
            RegistryError::Chain(ChainError::NotFound(_)) => ApiError::NotFound,
            other => {
                error!(error = %other, "request failed");
                ApiError::Internal
            }
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        RegistryError::from(err).into()
    }
}
