use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::database::AppState;
use crate::error::AppError;

/// Middleware to check the Authorization header on management routes
///
/// When `AUTHORIZATION` is configured the request must carry an
/// `Authorization` header with exactly that value. Without it the check is
/// skipped.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(secret) = state.config.authorization.as_deref() {
        let provided = headers
            .get("Authorization")
            .and_then(|value| value.to_str().ok());

        if provided != Some(secret) {
            return Err(AppError::Unauthorized);
        }
    }

    Ok(next.run(request).await)
}
