use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use ics_backend::{
    AppState,
    bootstrap,
    config::Config,
    middleware::{api_key_middleware, auth_middleware, log_errors, require_admin},
    notify::LogMailer,
    result::ApiResponse,
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with restrictive CORS");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'ics_backend';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let state = AppState {
        pool,
        config: config.clone(),
        mailer: Arc::new(LogMailer),
    };

    bootstrap::run(&state)
        .await
        .expect("Failed to seed roles and admin user");

    use routes::auth::handler as auth;
    use routes::catalog::handler as catalog;
    use routes::user::handler as users;

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh-token", post(auth::refresh_token))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password));

    // Service-to-service token check, guarded by the shared API key.
    let service_routes = Router::new()
        .route("/auth/validate", post(auth::validate_token))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    let protected_routes = Router::new()
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/logout", post(auth::logout))
        // Catalog routes are open to any authenticated user.
        .route("/units", get(catalog::list_units).post(catalog::create_unit))
        .route(
            "/units/{id}",
            get(catalog::get_unit)
                .put(catalog::update_unit)
                .delete(catalog::delete_unit),
        )
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route(
            "/categories/{id}",
            get(catalog::get_category)
                .put(catalog::update_category)
                .delete(catalog::delete_category),
        )
        .route("/items", get(catalog::list_items).post(catalog::create_item))
        .route(
            "/items/{id}",
            get(catalog::get_item)
                .put(catalog::update_item)
                .delete(catalog::delete_item),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // User management requires the Admin role on top of a valid token.
    let admin_routes = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/users/{id}/roles",
            get(users::get_user_roles).post(users::assign_role),
        )
        .route("/users/{id}/roles/{role}", delete(users::remove_role))
        .layer(axum::middleware::from_fn(require_admin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let router = Router::new().route("/", get(root_handler)).nest(
        "/api",
        Router::new()
            .merge(public_routes)
            .merge(service_routes)
            .merge(protected_routes)
            .merge(admin_routes),
    );

    let router = router.layer(axum::middleware::from_fn(log_errors));

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // No allowed origins: browsers get no CORS headers at all in release.
    #[cfg(not(debug_assertions))]
    let router = router.layer(tower_http::cors::CorsLayer::new().allow_methods([
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::PUT,
        axum::http::Method::DELETE,
    ]));

    let app = router.with_state(state.clone());

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service(),
    )
    .await
    .expect("Failed to start server");
}

async fn root_handler() -> axum::Json<ApiResponse<serde_json::Value>> {
    axum::Json(ApiResponse::success_with_message(
        serde_json::json!({
            "service": "ICS backend",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now(),
        }),
        "Running",
    ))
}
