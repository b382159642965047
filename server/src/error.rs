use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use content::ContentError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Content(#[from] ContentError),
}

impl From<store::StoreError> for ApiError {
    fn from(e: store::StoreError) -> Self {
        ApiError::Content(ContentError::Store(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Content(content) => match content {
                ContentError::FeaturedCapReached | ContentError::AlreadySubscribed => {
                    StatusCode::CONFLICT
                }
                ContentError::InvalidEmail(_) | ContentError::InvalidImage(_) => {
                    StatusCode::BAD_REQUEST
                }
                ContentError::NotFound(_) => StatusCode::NOT_FOUND,
                ContentError::Store(_) | ContentError::Serde(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
