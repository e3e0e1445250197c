use crate::services::media::StoreError;
use crate::services::upload::UploadError;
use crate::services::validation::ValidationErrors;
use crate::web::problem::ProblemDocument;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use thiserror::Error;

pub const VALIDATION_PROBLEM_TYPE: &str = "https://tools.ietf.org/html/rfc9110#section-15.5.1";

/// Every failure a handler can report. Component errors are folded into
/// exactly one of these at the HTTP boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(ValidationErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{detail}")]
    PayloadTooLarge { title: &'static str, detail: String },

    #[error("{detail}")]
    UnsupportedMediaType { title: &'static str, detail: String },

    #[error("{detail}")]
    BadRequest { title: &'static str, detail: String },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    FileProcessing(UploadError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found() -> Self {
        Self::NotFound("Media item not found".to_string())
    }

    fn problem(&self) -> ProblemDocument {
        match self {
            Self::Validation(errors) => {
                let mut extras = Map::new();
                extras.insert(
                    "errors".to_string(),
                    serde_json::to_value(errors.violations()).unwrap_or(Value::Array(Vec::new())),
                );
                ProblemDocument::build(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Validation Error",
                    "Request validation failed",
                    Some(VALIDATION_PROBLEM_TYPE),
                    Some(extras),
                )
            }
            Self::NotFound(detail) => {
                ProblemDocument::build(StatusCode::NOT_FOUND, "Not Found", detail, None, None)
            }
            Self::MethodNotAllowed(detail) => ProblemDocument::build(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed",
                detail,
                None,
                None,
            ),
            Self::PayloadTooLarge { title, detail } => {
                ProblemDocument::build(StatusCode::PAYLOAD_TOO_LARGE, title, detail, None, None)
            }
            Self::UnsupportedMediaType { title, detail } => ProblemDocument::build(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                title,
                detail,
                None,
                None,
            ),
            Self::BadRequest { title, detail } => {
                ProblemDocument::build(StatusCode::BAD_REQUEST, title, detail, None, None)
            }
            Self::Store(_) => ProblemDocument::build(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database Error",
                "The database operation failed and was rolled back",
                None,
                None,
            ),
            Self::FileProcessing(_) => ProblemDocument::build(
                StatusCode::INTERNAL_SERVER_ERROR,
                "File Processing Error",
                "Failed to process the uploaded file",
                None,
                None,
            ),
            Self::Internal(err) => ProblemDocument::internal(&format!("{:?}", err)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let document = self.problem();
        if !matches!(self, Self::Internal(_)) {
            tracing::error!(
                correlation_id = %document.correlation_id,
                cause = ?self,
                "Request failed"
            );
        }
        document.into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::not_found(),
            StoreError::Validation(errors) => Self::Validation(errors),
            other => Self::Store(other),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Oversized { .. } => Self::PayloadTooLarge {
                title: "File Too Large",
                detail: err.to_string(),
            },
            UploadError::UnknownContentType | UploadError::UnsupportedMediaType(_) => {
                Self::UnsupportedMediaType {
                    title: "Unsupported File Type",
                    detail: err.to_string(),
                }
            }
            UploadError::ExtensionMismatch { .. } => Self::BadRequest {
                title: "Invalid File Extension",
                detail: err.to_string(),
            },
            UploadError::InvalidPath(_) => Self::BadRequest {
                title: "Invalid File Path",
                detail: err.to_string(),
            },
            UploadError::MediaNotFound => Self::not_found(),
            UploadError::Store(store) => Self::from(store),
            UploadError::UnmappedType(_) | UploadError::Io(_) => Self::FileProcessing(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge {
                title: "Payload Too Large",
                detail: rejection.body_text(),
            },
            StatusCode::UNSUPPORTED_MEDIA_TYPE => Self::UnsupportedMediaType {
                title: "Unsupported Media Type",
                detail: rejection.body_text(),
            },
            _ => Self::Validation(ValidationErrors::single("body", rejection.body_text())),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(_) => {
                Self::Validation(ValidationErrors::single("id", "Input should be a valid UUID"))
            }
            other => Self::Internal(anyhow::anyhow!(other.body_text())),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge {
                title: "File Too Large",
                detail: err.body_text(),
            }
        } else {
            Self::BadRequest {
                title: "Invalid Upload",
                detail: err.body_text(),
            }
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest {
            title: "Invalid Upload",
            detail: rejection.body_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_upload_errors_map_to_statuses() {
        let cases = [
            (UploadError::Oversized { size: 10, limit: 5 }, StatusCode::PAYLOAD_TOO_LARGE),
            (UploadError::UnknownContentType, StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (
                UploadError::UnsupportedMediaType("text/plain".to_string()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                UploadError::ExtensionMismatch {
                    extension: "pdf".to_string(),
                    mime_type: "image/png".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (UploadError::InvalidPath("Path traversal attempt detected"), StatusCode::BAD_REQUEST),
            (UploadError::MediaNotFound, StatusCode::NOT_FOUND),
            (
                UploadError::UnmappedType("image/x-unknown".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                UploadError::Io(io::Error::new(io::ErrorKind::Other, "disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(status_of(ApiError::from(err)), expected);
        }
    }

    #[test]
    fn test_store_errors_map_to_statuses() {
        assert_eq!(status_of(StoreError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(StoreError::Validation(ValidationErrors::single("name", "Field required")).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(StoreError::Database(rusqlite::Error::InvalidQuery).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_problem_carries_errors() {
        let err = ApiError::from(ValidationErrors::single("year", "Year cannot be in the future"));
        let doc = err.problem();
        assert_eq!(doc.type_uri, VALIDATION_PROBLEM_TYPE);
        assert_eq!(doc.extras["errors"][0]["field"], "year");
        assert_eq!(doc.extras["errors"][0]["message"], "Year cannot be in the future");
    }

    #[test]
    fn test_internal_error_body_is_generic() {
        let doc = ApiError::from(anyhow::anyhow!("token_abcdefghijklmnop leaked")).problem();
        assert_eq!(doc.status, 500);
        assert_eq!(doc.title, "Internal Server Error");
        assert_eq!(doc.detail, "An unexpected error occurred");
    }
}
