use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    error::AppError,
    routes::user::model::role_names,
    utils::{Claims, decode_access_token},
};

/// Bearer-JWT gate for protected routes. On success the decoded claims are
/// attached as a request extension for handlers to pick up.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = decode_access_token(token, &state.config).map_err(|err| {
        tracing::debug!("rejected access token: {}", err);
        AppError::Unauthorized
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Requires an Admin role claim. Must be layered inside `auth_middleware`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or(AppError::Unauthorized)?;

    if !claims.roles.iter().any(|role| role == role_names::ADMIN) {
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
