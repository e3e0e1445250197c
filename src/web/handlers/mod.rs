pub mod health;
pub mod media;

use crate::web::error::{ApiError, AppResult};

/// Runs database and filesystem work off the async executor. A panic inside
/// `f` is re-raised on the request task so the panic layer can answer it.
pub(crate) async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(ApiError::Internal(e.into())),
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("The requested resource was not found".to_string())
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method not allowed for this resource".to_string())
}
