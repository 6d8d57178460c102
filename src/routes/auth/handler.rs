use axum::extract::{Extension, Json, State};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, is_unique_violation},
    notify,
    result::ApiResponse,
    routes::user::model::{NewUser, User, role_names},
    utils::{
        Claims, generate_opaque_token, generate_reset_token, hash_password, issue_access_token,
        validate_access_token, verify_password,
    },
};

use super::model::{
    AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LogoutRequest,
    RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, UserDto, ValidateTokenRequest,
    validate_password_pair,
};
use super::store::{PasswordResetToken, RefreshToken};

const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";

/// Issues the access/refresh pair for a user and persists the refresh token.
/// The refresh value is passed in so rotation can link old row to new, and
/// the executor so rotation can run the insert in its transaction.
async fn finish_auth(
    state: &AppState,
    user: &User,
    refresh_value: String,
    executor: impl sqlx::PgExecutor<'_>,
) -> Result<AuthResponse, AppError> {
    let roles = User::roles(&state.pool, user.id).await?;
    let (access_token, expires_at) = issue_access_token(user, &roles, &state.config)?;

    let refresh_expires = Utc::now() + state.config.refresh_token_ttl();
    RefreshToken::create(executor, &refresh_value, user.id, refresh_expires).await?;

    Ok(AuthResponse {
        access_token,
        refresh_token: refresh_value,
        expires_at,
        user: UserDto::from_user(user, roles),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let errors = req.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if User::find_by_email(&state.pool, &req.email).await?.is_some() {
        return Err(AppError::Conflict("User with this email already exists".into()));
    }

    let (password_hash, password_salt) =
        hash_password(&req.password, state.config.pbkdf2_iterations);

    // The user row and its default role commit together.
    let mut tx = state.pool.begin().await?;
    let user = User::create(
        &mut *tx,
        NewUser {
            email: req.email,
            password_hash,
            password_salt,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            is_active: true,
            email_confirmed: false,
        },
    )
    .await
    .map_err(|err| {
        // Lost the race against a concurrent registration for the same email.
        if is_unique_violation(&err) {
            AppError::Conflict("User with this email already exists".into())
        } else {
            err.into()
        }
    })?;
    User::add_role(&mut *tx, user.id, role_names::USER).await?;
    tx.commit().await?;

    notify::send_best_effort(
        state.mailer.as_ref(),
        &user.email,
        "Welcome",
        &format!("Welcome aboard, {}!", user.first_name),
    )
    .await;

    let response = finish_auth(&state, &user, generate_opaque_token(), &state.pool).await?;
    Ok(Json(ApiResponse::success_with_message(
        response,
        "Registration successful",
    )))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    // Absent user, deactivated account and wrong password all answer the
    // same way; nothing here may leak which one it was.
    let user = User::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !user.is_active {
        return Err(AppError::InvalidCredentials);
    }

    if !verify_password(
        &req.password,
        &user.password_hash,
        &user.password_salt,
        state.config.pbkdf2_iterations,
    ) {
        return Err(AppError::InvalidCredentials);
    }

    User::touch_last_login(&state.pool, user.id).await?;

    let response = finish_auth(&state, &user, generate_opaque_token(), &state.pool).await?;
    Ok(Json(ApiResponse::success_with_message(
        response,
        "Authentication successful",
    )))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let stored = RefreshToken::find_by_token(&state.pool, &req.refresh_token)
        .await?
        .ok_or_else(|| AppError::InvalidToken(INVALID_REFRESH_TOKEN.into()))?;

    if !stored.is_valid(Utc::now()) {
        return Err(AppError::InvalidToken(INVALID_REFRESH_TOKEN.into()));
    }

    let user = User::find_by_id(&state.pool, stored.user_id).await?;
    let user = match user {
        Some(user) if user.is_active => user,
        _ => return Err(AppError::InvalidToken("User not found or inactive".into())),
    };

    // Rotation: the presented token is one-time-use. The conditional revoke
    // decides the winner if the same token is redeemed concurrently, and the
    // transaction ties it to the replacement insert, so a failure past the
    // claim rolls the claim back instead of stranding the session.
    let replacement = generate_opaque_token();
    let mut tx = state.pool.begin().await?;
    let claimed =
        RefreshToken::claim_for_rotation(&mut *tx, &req.refresh_token, &replacement).await?;
    if !claimed {
        return Err(AppError::InvalidToken(INVALID_REFRESH_TOKEN.into()));
    }

    let response = finish_auth(&state, &user, replacement, &mut *tx).await?;
    tx.commit().await?;
    Ok(Json(ApiResponse::success_with_message(
        response,
        "Token refreshed",
    )))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if let Some(user) = User::find_by_email(&state.pool, &req.email).await? {
        if user.is_active {
            let token = generate_reset_token();
            let expires_at = Utc::now() + state.config.reset_token_ttl();
            PasswordResetToken::create(&state.pool, user.id, &token, expires_at).await?;

            notify::send_best_effort(
                state.mailer.as_ref(),
                &user.email,
                "Password reset",
                &format!("Your password reset token: {token}"),
            )
            .await;
        }
    }

    // Identical answer whether or not the address is registered.
    Ok(Json(ApiResponse::ok(
        "If the email exists, a password reset link has been sent",
    )))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let mut errors = Vec::new();
    validate_password_pair(&req.new_password, &req.confirm_password, &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let user = User::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or_else(|| AppError::InvalidToken("Invalid reset token or email".into()))?;

    if !PasswordResetToken::consume(&state.pool, user.id, &req.token).await? {
        return Err(AppError::InvalidToken("Invalid reset token or email".into()));
    }

    let (password_hash, password_salt) =
        hash_password(&req.new_password, state.config.pbkdf2_iterations);
    User::set_password(&state.pool, user.id, &password_hash, &password_salt).await?;

    // Force re-login everywhere.
    let revoked = RefreshToken::revoke_all_for_user(&state.pool, user.id).await?;
    tracing::info!(user_id = %user.id, revoked, "password reset, sessions revoked");

    Ok(Json(ApiResponse::ok("Password reset successfully")))
}

pub async fn change_password(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let user_id: Uuid = claims.sub.parse().map_err(|_| AppError::Unauthorized)?;

    let mut errors = Vec::new();
    validate_password_pair(&req.new_password, &req.confirm_password, &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let user = User::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if !verify_password(
        &req.current_password,
        &user.password_hash,
        &user.password_salt,
        state.config.pbkdf2_iterations,
    ) {
        return Err(AppError::validation("Current password is incorrect"));
    }

    let (password_hash, password_salt) =
        hash_password(&req.new_password, state.config.pbkdf2_iterations);
    User::set_password(&state.pool, user.id, &password_hash, &password_salt).await?;

    // Same policy as reset: a password change invalidates every session.
    let revoked = RefreshToken::revoke_all_for_user(&state.pool, user.id).await?;
    tracing::info!(user_id = %user.id, revoked, "password changed, sessions revoked");

    Ok(Json(ApiResponse::ok("Password changed successfully")))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    // Idempotent: an already-revoked or unknown token still logs out fine.
    RefreshToken::revoke(&state.pool, &req.refresh_token).await?;
    Ok(Json(ApiResponse::ok("Logged out successfully")))
}

pub async fn validate_token(
    State(state): State<AppState>,
    Json(req): Json<ValidateTokenRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if validate_access_token(&req.token, &state.config) {
        Ok(Json(ApiResponse::ok("Token is valid")))
    } else {
        Err(AppError::Unauthorized)
    }
}
