//! End-to-end session lifecycle tests against a real Postgres database.
//!
//! These run the actual handlers, so they need `DATABASE_URL` pointing at a
//! disposable database and are ignored by default:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/ics_test cargo test -- --ignored
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Extension, Json, State};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use ics_backend::{
    AppState, bootstrap,
    config::Config,
    error::AppError,
    notify::{LogMailer, Mailer},
    routes::auth::handler::{
        change_password, forgot_password, login, logout, refresh_token, register, reset_password,
    },
    routes::auth::model::{
        AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LogoutRequest,
        RefreshTokenRequest, RegisterRequest, ResetPasswordRequest,
    },
    routes::auth::store::{PasswordResetToken, RefreshToken},
    routes::user::model::User,
    utils::decode_access_token,
};

struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("smtp unreachable"))
    }
}

fn test_config() -> Config {
    Config {
        database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
        jwt_secret: "integration-test-secret".into(),
        jwt_issuer: "ics-api".into(),
        jwt_audience: "ics-clients".into(),
        access_token_expiry_mins: 60,
        refresh_token_expiry_days: 7,
        reset_token_expiry_mins: 60,
        pbkdf2_iterations: 1_000,
        api_key: "integration-test-key".into(),
        admin_email: None,
        admin_password: None,
        server_host: "127.0.0.1".into(),
        server_port: 0,
    }
}

async fn test_state(mailer: Arc<dyn Mailer>) -> AppState {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to Postgres");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let state = AppState {
        pool,
        config,
        mailer,
    };
    bootstrap::run(&state).await.expect("failed to seed roles");
    state
}

fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.into(),
        password: "hunter22".into(),
        confirm_password: "hunter22".into(),
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        phone: None,
    }
}

fn unique_email() -> String {
    format!("jane+{}@example.com", Uuid::new_v4().simple())
}

async fn do_register(state: &AppState, email: &str) -> AuthResponse {
    let response = register(State(state.clone()), Json(register_request(email)))
        .await
        .expect("registration failed");
    response.0.data.expect("registration returned no payload")
}

async fn do_refresh(
    state: &AppState,
    token: &str,
) -> Result<AuthResponse, AppError> {
    refresh_token(
        State(state.clone()),
        Json(RefreshTokenRequest {
            refresh_token: token.into(),
        }),
    )
    .await
    .map(|json| json.0.data.expect("refresh returned no payload"))
}

#[tokio::test]
#[ignore = "requires Postgres; set DATABASE_URL"]
async fn full_session_lifecycle() {
    let state = test_state(Arc::new(LogMailer)).await;
    let email = unique_email();

    // register -> a valid token pair
    let registered = do_register(&state, &email).await;
    assert_eq!(registered.user.roles, vec!["User"]);

    // login -> a fresh pair, last login stamped
    let logged_in = login(
        State(state.clone()),
        Json(LoginRequest {
            email: email.clone(),
            password: "hunter22".into(),
        }),
    )
    .await
    .expect("login failed")
    .0
    .data
    .unwrap();
    assert_ne!(logged_in.refresh_token, registered.refresh_token);

    let user = User::find_by_email(&state.pool, &email).await.unwrap().unwrap();
    assert!(user.last_login_at.is_some());

    // refresh rotates: the old token dies, the new one lives
    let refreshed = do_refresh(&state, &logged_in.refresh_token).await.unwrap();
    assert_ne!(refreshed.refresh_token, logged_in.refresh_token);

    let old = RefreshToken::find_by_token(&state.pool, &logged_in.refresh_token)
        .await
        .unwrap()
        .unwrap();
    assert!(!old.is_valid(Utc::now()));
    assert_eq!(old.replaced_by_token.as_deref(), Some(refreshed.refresh_token.as_str()));

    let replay = do_refresh(&state, &logged_in.refresh_token).await;
    assert!(matches!(replay, Err(AppError::InvalidToken(_))));

    // logout, then the new token no longer refreshes either
    logout(
        State(state.clone()),
        Json(LogoutRequest {
            refresh_token: refreshed.refresh_token.clone(),
        }),
    )
    .await
    .expect("logout failed");

    let after_logout = do_refresh(&state, &refreshed.refresh_token).await;
    assert!(matches!(after_logout, Err(AppError::InvalidToken(_))));
}

#[tokio::test]
#[ignore = "requires Postgres; set DATABASE_URL"]
async fn duplicate_registration_conflicts() {
    let state = test_state(Arc::new(LogMailer)).await;
    let email = unique_email();

    do_register(&state, &email).await;
    let second = register(State(state.clone()), Json(register_request(&email))).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
#[ignore = "requires Postgres; set DATABASE_URL"]
async fn login_failures_are_indistinguishable() {
    let state = test_state(Arc::new(LogMailer)).await;
    let email = unique_email();
    do_register(&state, &email).await;

    let wrong_password = login(
        State(state.clone()),
        Json(LoginRequest {
            email,
            password: "not-the-password".into(),
        }),
    )
    .await;
    let unknown_email = login(
        State(state.clone()),
        Json(LoginRequest {
            email: unique_email(),
            password: "hunter22".into(),
        }),
    )
    .await;

    // Same category, and the envelope renders the same message for both.
    assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));
    assert!(matches!(unknown_email, Err(AppError::InvalidCredentials)));
}

#[tokio::test]
#[ignore = "requires Postgres; set DATABASE_URL"]
async fn reset_password_revokes_every_session() {
    let state = test_state(Arc::new(LogMailer)).await;
    let email = unique_email();

    let first = do_register(&state, &email).await;
    let second = login(
        State(state.clone()),
        Json(LoginRequest {
            email: email.clone(),
            password: "hunter22".into(),
        }),
    )
    .await
    .unwrap()
    .0
    .data
    .unwrap();

    // Mint a reset token through the store, as forgot-password would.
    let user = User::find_by_email(&state.pool, &email).await.unwrap().unwrap();
    let token = "test-reset-token";
    PasswordResetToken::create(
        &state.pool,
        user.id,
        token,
        Utc::now() + chrono::Duration::hours(1),
    )
    .await
    .unwrap();

    reset_password(
        State(state.clone()),
        Json(ResetPasswordRequest {
            email: email.clone(),
            token: token.into(),
            new_password: "betterpassword".into(),
            confirm_password: "betterpassword".into(),
        }),
    )
    .await
    .expect("reset failed");

    for refresh in [&first.refresh_token, &second.refresh_token] {
        let outcome = do_refresh(&state, refresh).await;
        assert!(matches!(outcome, Err(AppError::InvalidToken(_))));
    }

    // The reset token is single use.
    assert!(!PasswordResetToken::consume(&state.pool, user.id, token).await.unwrap());

    // And the new password is live.
    login(
        State(state.clone()),
        Json(LoginRequest {
            email,
            password: "betterpassword".into(),
        }),
    )
    .await
    .expect("login with new password failed");
}

#[tokio::test]
#[ignore = "requires Postgres; set DATABASE_URL"]
async fn change_password_revokes_every_session() {
    let state = test_state(Arc::new(LogMailer)).await;
    let email = unique_email();

    let first = do_register(&state, &email).await;
    let second = login(
        State(state.clone()),
        Json(LoginRequest {
            email: email.clone(),
            password: "hunter22".into(),
        }),
    )
    .await
    .unwrap()
    .0
    .data
    .unwrap();

    let claims = decode_access_token(&second.access_token, &state.config)
        .expect("issued token should decode");
    change_password(
        Extension(claims),
        State(state.clone()),
        Json(ChangePasswordRequest {
            current_password: "hunter22".into(),
            new_password: "betterpassword".into(),
            confirm_password: "betterpassword".into(),
        }),
    )
    .await
    .expect("change failed");

    // Same policy as reset: every prior session dies.
    for refresh in [&first.refresh_token, &second.refresh_token] {
        let outcome = do_refresh(&state, refresh).await;
        assert!(matches!(outcome, Err(AppError::InvalidToken(_))));
    }

    login(
        State(state.clone()),
        Json(LoginRequest {
            email,
            password: "betterpassword".into(),
        }),
    )
    .await
    .expect("login with new password failed");
}

#[tokio::test]
#[ignore = "requires Postgres; set DATABASE_URL"]
async fn forgot_password_answers_identically_for_unknown_addresses() {
    let state = test_state(Arc::new(LogMailer)).await;
    let email = unique_email();
    do_register(&state, &email).await;

    let known = forgot_password(State(state.clone()), Json(ForgotPasswordRequest { email }))
        .await
        .expect("forgot-password failed for a known address")
        .0;
    let unknown = forgot_password(
        State(state.clone()),
        Json(ForgotPasswordRequest {
            email: unique_email(),
        }),
    )
    .await
    .expect("forgot-password failed for an unknown address")
    .0;

    // Byte-for-byte the same envelope; nothing leaks which addresses exist.
    assert_eq!(
        serde_json::to_value(&known).unwrap(),
        serde_json::to_value(&unknown).unwrap()
    );
}

#[tokio::test]
#[ignore = "requires Postgres; set DATABASE_URL"]
async fn unfinished_rotation_leaves_the_presented_token_usable() {
    let state = test_state(Arc::new(LogMailer)).await;
    let registered = do_register(&state, &unique_email()).await;

    // A claim whose transaction never commits must not burn the token, so a
    // storage failure after the claim cannot strand the session.
    let mut tx = state.pool.begin().await.unwrap();
    let claimed =
        RefreshToken::claim_for_rotation(&mut *tx, &registered.refresh_token, "never-persisted")
            .await
            .unwrap();
    assert!(claimed);
    tx.rollback().await.unwrap();

    let refreshed = do_refresh(&state, &registered.refresh_token).await;
    assert!(refreshed.is_ok());
}

#[tokio::test]
#[ignore = "requires Postgres; set DATABASE_URL"]
async fn revoking_twice_is_idempotent() {
    let state = test_state(Arc::new(LogMailer)).await;
    let registered = do_register(&state, &unique_email()).await;

    RefreshToken::revoke(&state.pool, &registered.refresh_token).await.unwrap();
    RefreshToken::revoke(&state.pool, &registered.refresh_token).await.unwrap();

    let stored = RefreshToken::find_by_token(&state.pool, &registered.refresh_token)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_revoked);
    assert!(!stored.is_valid(Utc::now()));
}

#[tokio::test]
#[ignore = "requires Postgres; set DATABASE_URL"]
async fn registration_survives_a_failing_notifier() {
    let state = test_state(Arc::new(FailingMailer)).await;
    let email = unique_email();

    let registered = do_register(&state, &email).await;
    assert_eq!(registered.user.email, email);
}
