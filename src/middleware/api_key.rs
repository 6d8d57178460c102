use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{AppState, error::AppError};

/// Shared-secret gate for service-to-service calls. The key arrives in the
/// `X-Api-Key` header and is compared in constant time.
pub async fn api_key_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|header| header.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let matches: bool = provided
        .as_bytes()
        .ct_eq(state.config.api_key.as_bytes())
        .into();
    if !matches {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
